//! Handlers for `/metadata/{kind}` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/metadata/{kind}` | All rows of the lookup |
//! | `POST`   | `/metadata/{kind}` | Body: `{"name":"...","description":"..."}` |
//! | `GET`    | `/metadata/{kind}/{id}` | 404 if not found |
//! | `PUT`    | `/metadata/{kind}/{id}` | Replaces name and description |
//! | `DELETE` | `/metadata/{kind}/{id}` | Hard delete; 422 while referenced |
//! | `POST`   | `/metadata/{kind}/bulk-delete` | Body: `{"ids":[1,2]}`; all or nothing |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  metadata::{MetadataDelete, MetadataEntry, MetadataKind, NewMetadataEntry},
  policy::Ability,
  store::RecordStore,
  validation::{metadata_in_use_error, validate_metadata},
};
use serde::{Deserialize, Serialize};

use crate::{auth::CurrentUser, error::ApiError};

fn kind_from(segment: &str) -> Result<MetadataKind, ApiError> {
  MetadataKind::from_path_segment(segment).map_err(|e| ApiError::NotFound(e.to_string()))
}

/// Rows still referenced are refused under `field`.
fn deleted(kind: MetadataKind, field: &str, outcome: MetadataDelete) -> Result<usize, ApiError> {
  match outcome {
    MetadataDelete::Deleted(n) => Ok(n),
    MetadataDelete::InUse(ids) => {
      Err(ApiError::Validation(metadata_in_use_error(kind, field, &ids)))
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
  pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleted {
  pub deleted: usize,
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /metadata/{kind}`
pub async fn list<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(kind): Path<String>,
) -> Result<Json<Vec<MetadataEntry>>, ApiError> {
  let kind = kind_from(&kind)?;
  user.authorize(Ability::ViewAny, kind.resource())?;

  let entries = store.list_metadata(kind).await.map_err(ApiError::store)?;
  Ok(Json(entries))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /metadata/{kind}`
pub async fn create<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(kind): Path<String>,
  Json(body): Json<NewMetadataEntry>,
) -> Result<impl IntoResponse, ApiError> {
  let kind = kind_from(&kind)?;
  user.authorize(Ability::Create, kind.resource())?;

  let slug_taken = store
    .find_metadata_by_slug(kind, body.slug())
    .await
    .map_err(ApiError::store)?
    .is_some();
  let entry = validate_metadata(body, slug_taken)?;

  let created = store.create_metadata(kind, entry).await.map_err(ApiError::store)?;
  tracing::info!(kind = kind.path_segment(), id = created.id, slug = %created.slug, "metadata created");
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /metadata/{kind}/{id}`
pub async fn get_one<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<MetadataEntry>, ApiError> {
  let kind = kind_from(&kind)?;
  user.authorize(Ability::View, kind.resource())?;

  let entry = store
    .get_metadata(kind, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{} {id} not found", kind.path_segment())))?;
  Ok(Json(entry))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /metadata/{kind}/{id}`
pub async fn update<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path((kind, id)): Path<(String, i64)>,
  Json(body): Json<NewMetadataEntry>,
) -> Result<Json<MetadataEntry>, ApiError> {
  let kind = kind_from(&kind)?;
  user.authorize(Ability::Update, kind.resource())?;

  let slug_taken = store
    .find_metadata_by_slug(kind, body.slug())
    .await
    .map_err(ApiError::store)?
    .is_some_and(|other| other.id != id);
  let entry = validate_metadata(body, slug_taken)?;

  let updated = store
    .update_metadata(kind, id, entry)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{} {id} not found", kind.path_segment())))?;
  Ok(Json(updated))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /metadata/{kind}/{id}`
pub async fn delete_one<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path((kind, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
  let kind = kind_from(&kind)?;
  user.authorize(Ability::Delete, kind.resource())?;

  let outcome = store.delete_metadata(kind, vec![id]).await.map_err(ApiError::store)?;
  match deleted(kind, "id", outcome)? {
    0 => Err(ApiError::NotFound(format!("{} {id} not found", kind.path_segment()))),
    _ => Ok(StatusCode::NO_CONTENT),
  }
}

/// `POST /metadata/{kind}/bulk-delete`
pub async fn bulk_delete<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(kind): Path<String>,
  Json(body): Json<BulkDeleteBody>,
) -> Result<Json<BulkDeleted>, ApiError> {
  let kind = kind_from(&kind)?;
  user.authorize(Ability::DeleteAny, kind.resource())?;

  let outcome = store.delete_metadata(kind, body.ids).await.map_err(ApiError::store)?;
  Ok(Json(BulkDeleted { deleted: deleted(kind, "ids", outcome)? }))
}
