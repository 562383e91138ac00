//! Error types for `muster-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown field: {0:?}")]
  UnknownField(String),

  #[error("field {field} expects {expected}")]
  FieldType {
    field:    &'static str,
    expected: &'static str,
  },

  #[error("invalid date {0:?}, expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("unknown metadata kind: {0:?}")]
  UnknownMetadataKind(String),

  #[error("unknown completion scope: {0:?}")]
  UnknownScope(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
