//! Read-only handlers for the organisation tables: `/ranks`, `/battalions`
//! and `/formations`. Any authenticated user may read them.

use std::sync::Arc;

use axum::{Json, extract::State};
use muster_core::{
  organisation::{Battalion, Formation, Rank},
  store::RecordStore,
};

use crate::{auth::CurrentUser, error::ApiError};

/// `GET /ranks`
pub async fn ranks<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  _user: CurrentUser,
) -> Result<Json<Vec<Rank>>, ApiError> {
  Ok(Json(store.list_ranks().await.map_err(ApiError::store)?))
}

/// `GET /battalions`
pub async fn battalions<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  _user: CurrentUser,
) -> Result<Json<Vec<Battalion>>, ApiError> {
  Ok(Json(store.list_battalions().await.map_err(ApiError::store)?))
}

/// `GET /formations`
pub async fn formations<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  _user: CurrentUser,
) -> Result<Json<Vec<Formation>>, ApiError> {
  Ok(Json(store.list_formations().await.map_err(ApiError::store)?))
}
