//! HTTP Basic-auth extractor and the policy gate.
//!
//! Every route authenticates against the `users` table; handlers then call
//! [`CurrentUser::authorize`] before touching a resource.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use muster_core::{
  policy::{self, Ability, ResourceKind},
  store::RecordStore,
  user::User,
};
use rand_core::OsRng;

use crate::error::ApiError;

/// The authenticated user making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
  /// Fail with 403 unless the user may perform `ability` on `resource`.
  pub fn authorize(&self, ability: Ability, resource: ResourceKind) -> Result<(), ApiError> {
    if policy::allows(&self.0, ability, resource) {
      Ok(())
    } else {
      tracing::debug!(
        username = %self.0.username,
        permission = %policy::permission_name(ability, resource),
        "policy denied"
      );
      Err(ApiError::Forbidden)
    }
  }
}

/// Split a `Basic` authorization header into username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let encoded = value.strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (username, password) = creds.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Check `password` against an argon2 PHC string.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  PasswordHash::new(password_hash)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Hash(e.to_string()))
}

impl<S> FromRequestParts<Arc<S>> for CurrentUser
where
  S: RecordStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, store: &Arc<S>) -> Result<Self, Self::Rejection> {
    let (username, password) = basic_credentials(&parts.headers).ok_or(ApiError::Unauthorized)?;

    let user = store
      .get_user_by_username(username)
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&password, &user.password_hash) {
      tracing::warn!(username = %user.username, "rejected credentials");
      return Err(ApiError::Unauthorized);
    }
    Ok(CurrentUser(user))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  #[test]
  fn decodes_basic_credentials() {
    let encoded = B64.encode("admin:pa:ss");
    let creds = basic_credentials(&headers(&format!("Basic {encoded}")));
    assert_eq!(creds, Some(("admin".to_owned(), "pa:ss".to_owned())));
  }

  #[test]
  fn rejects_malformed_headers() {
    assert_eq!(basic_credentials(&HeaderMap::new()), None);
    assert_eq!(basic_credentials(&headers("Bearer abc")), None);
    assert_eq!(basic_credentials(&headers("Basic !!!not-base64!!!")), None);
    assert_eq!(basic_credentials(&headers(&format!("Basic {}", B64.encode("nocolon")))), None);
  }

  #[test]
  fn hashed_password_verifies() {
    let hash = hash_password("secret").unwrap();
    assert!(verify_password("secret", &hash));
    assert!(!verify_password("wrong", &hash));
    assert!(!verify_password("secret", "not-a-phc-string"));
  }
}
