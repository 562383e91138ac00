//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use muster_core::validation::ValidationErrors;
use serde_json::json;
use thiserror::Error;

const SERVER_ERROR: &str = "Server Error.";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthenticated")]
  Unauthorized,

  #[error("this action is unauthorized")]
  Forbidden,

  #[error("the given data was invalid")]
  Validation(#[from] ValidationErrors),

  #[error("password hashing failed: {0}")]
  Hash(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<muster_core::Error> for ApiError {
  fn from(e: muster_core::Error) -> Self { Self::BadRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthenticated." }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"muster\""),
        );
        return res;
      }
      ApiError::Forbidden => (StatusCode::FORBIDDEN, "This action is unauthorized.".to_owned()),
      ApiError::Validation(errors) => {
        let message = errors.first().unwrap_or("The given data was invalid.").to_owned();
        return (
          StatusCode::UNPROCESSABLE_ENTITY,
          Json(json!({ "message": message, "errors": errors })),
        )
          .into_response();
      }
      // Internal detail goes to the log only.
      ApiError::Hash(m) => {
        tracing::error!(error = %m, "password hashing failure");
        (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_owned())
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn server_errors_hide_their_detail() {
    let err = ApiError::store(std::io::Error::other("FOREIGN KEY constraint failed"));
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "error": "Server Error." }));
  }
}
