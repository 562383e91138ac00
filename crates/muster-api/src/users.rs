//! Handlers for `/users` and `/me`.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  policy::{Ability, ResourceKind},
  store::RecordStore,
  user::{NewUser, NewUserForm, ProfileForm, User},
  validation::{validate_profile, validate_user},
};

use crate::{
  auth::{CurrentUser, hash_password, verify_password},
  error::ApiError,
};

/// `GET /users`
pub async fn list<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
) -> Result<Json<Vec<User>>, ApiError> {
  user.authorize(Ability::ViewAny, ResourceKind::User)?;
  Ok(Json(store.list_users().await.map_err(ApiError::store)?))
}

/// `POST /users`. Body: [`NewUserForm`] with a plaintext password.
pub async fn create<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Json(form): Json<NewUserForm>,
) -> Result<impl IntoResponse, ApiError> {
  user.authorize(Ability::Create, ResourceKind::User)?;

  let username = form.username.trim().to_owned();
  let taken = store
    .get_user_by_username(username.clone())
    .await
    .map_err(ApiError::store)?
    .is_some();
  validate_user(&form, taken)?;

  let created = store
    .create_user(NewUser {
      username,
      name: form.name.trim().to_owned(),
      password_hash: hash_password(&form.password)?,
      is_super_admin: form.is_super_admin,
      permissions: form.permissions,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    id = created.id,
    username = %created.username,
    created_by = %user.0.username,
    "user created"
  );
  Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /me`
pub async fn me(user: CurrentUser) -> Json<User> { Json(user.0) }

/// `PUT /me`. Body: [`ProfileForm`].
///
/// Any signed-in user may rename themselves. A password change needs the
/// current password.
pub async fn update_me<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Json(form): Json<ProfileForm>,
) -> Result<Json<User>, ApiError> {
  let current_ok = form
    .current_password
    .as_deref()
    .is_some_and(|password| verify_password(password, &user.password_hash));
  validate_profile(&form, current_ok)?;

  let password_hash = form.new_password().map(hash_password).transpose()?;
  let changed_password = password_hash.is_some();
  let updated = store
    .update_user(user.id, form.name.trim().to_owned(), password_hash)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user.id)))?;

  tracing::info!(id = updated.id, changed_password, "profile updated");
  Ok(Json(updated))
}
