//! Metadata lookup tables: small `name` + `description` rows referenced by
//! foreign key from servicepeople and appraisals.
//!
//! Every kind lives in its own table but shares one row shape, so the store and
//! the API treat them uniformly through [`MetadataKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

use crate::{Error, Result, policy::ResourceKind};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The lookup tables managed as metadata.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetadataKind {
  InterviewReason,
  OfficerAppraisalGrade,
  EnlistmentType,
  Gender,
}

impl MetadataKind {
  /// The SQL table holding rows of this kind.
  pub fn table(self) -> &'static str {
    match self {
      Self::InterviewReason => "interview_reasons",
      Self::OfficerAppraisalGrade => "officer_appraisal_grades",
      Self::EnlistmentType => "enlistment_types",
      Self::Gender => "genders",
    }
  }

  /// The URL segment used by the API, e.g. `interview-reasons`.
  pub fn path_segment(self) -> &'static str {
    match self {
      Self::InterviewReason => "interview-reasons",
      Self::OfficerAppraisalGrade => "officer-appraisal-grades",
      Self::EnlistmentType => "enlistment-types",
      Self::Gender => "genders",
    }
  }

  pub fn from_path_segment(segment: &str) -> Result<Self> {
    match segment {
      "interview-reasons" => Ok(Self::InterviewReason),
      "officer-appraisal-grades" => Ok(Self::OfficerAppraisalGrade),
      "enlistment-types" => Ok(Self::EnlistmentType),
      "genders" => Ok(Self::Gender),
      other => Err(Error::UnknownMetadataKind(other.to_owned())),
    }
  }

  /// Human name of one row, e.g. `interview reason`.
  pub fn label(self) -> &'static str {
    match self {
      Self::InterviewReason => "interview reason",
      Self::OfficerAppraisalGrade => "officer appraisal grade",
      Self::EnlistmentType => "enlistment type",
      Self::Gender => "gender",
    }
  }

  /// The policy resource guarding this kind.
  pub fn resource(self) -> ResourceKind {
    match self {
      Self::InterviewReason => ResourceKind::InterviewReason,
      Self::OfficerAppraisalGrade => ResourceKind::OfficerAppraisalGrade,
      Self::EnlistmentType => ResourceKind::EnlistmentType,
      Self::Gender => ResourceKind::Gender,
    }
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A persisted lookup row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
  pub id:          i64,
  pub name:        String,
  /// Derived from `name`; unique within a kind.
  pub slug:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input for creating or replacing a lookup row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMetadataEntry {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

impl NewMetadataEntry {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), description: None }
  }

  pub fn slug(&self) -> String { slugify(&self.name) }
}

/// Outcome of deleting lookup rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataDelete {
  /// Number of rows removed.
  Deleted(usize),
  /// These ids are still referenced by servicepeople or appraisals (trashed
  /// ones included); nothing was removed.
  InUse(Vec<i64>),
}

/// Well-known officer appraisal grade ids, matching the seeded table.
pub mod grade {
  pub const EXCELLENT: i64 = 1;
  pub const VERY_GOOD: i64 = 2;
  pub const GOOD: i64 = 3;
  pub const ADEQUATE: i64 = 4;
  pub const WEAK: i64 = 5;
  pub const NOT_GRADED: i64 = 6;
}

/// Lowercase `name`, replacing every run of non-alphanumeric characters with
/// a single `-` and trimming dashes from both ends.
pub fn slugify(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  let mut pending_dash = false;
  for ch in name.chars() {
    if ch.is_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.extend(ch.to_lowercase());
    } else {
      pending_dash = true;
    }
  }
  slug
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn slugify_collapses_separators() {
    assert_eq!(slugify("Very Good"), "very-good");
    assert_eq!(slugify("  not   graded "), "not-graded");
    assert_eq!(slugify("Medical / Dental"), "medical-dental");
    assert_eq!(slugify("---"), "");
  }

  #[test]
  fn path_segments_round_trip() {
    for kind in MetadataKind::iter() {
      assert_eq!(MetadataKind::from_path_segment(kind.path_segment()).unwrap(), kind);
    }
    assert!(MetadataKind::from_path_segment("ranks").is_err());
  }
}
