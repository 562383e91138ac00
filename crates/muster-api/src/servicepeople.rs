//! Handlers for `/servicepeople` and `/officers`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/servicepeople` | `?search`, `?trashed=without\|with\|only`, `?limit`, `?offset` |
//! | `POST`   | `/servicepeople` | Body: [`NewServiceperson`] |
//! | `GET`    | `/officers` | Same params, restricted to officer ranks |
//! | `GET`    | `/servicepeople/{number}` | Includes trashed rows |
//! | `PUT`    | `/servicepeople/{number}` | The number in the path wins |
//! | `DELETE` | `/servicepeople/{number}` | Soft delete |
//! | `POST`   | `/servicepeople/{number}/restore` | |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  metadata::MetadataKind,
  policy::{Ability, ResourceKind},
  scope::{ServicepersonQuery, Trashed},
  serviceperson::{NewServiceperson, ServicepersonRow},
  store::RecordStore,
  validation::{ServicepersonContext, validate_serviceperson},
};
use serde::Deserialize;

use crate::{auth::CurrentUser, error::ApiError};

const RESOURCE: ResourceKind = ResourceKind::Serviceperson;

fn not_found(number: i64) -> ApiError { ApiError::NotFound(format!("serviceperson {number} not found")) }

/// Look up every reference `input` makes.
async fn context_for<S: RecordStore>(
  store: &S,
  input: &NewServiceperson,
  number_taken: bool,
) -> Result<ServicepersonContext, ApiError> {
  let rank_exists = store.get_rank(input.rank_id).await.map_err(ApiError::store)?.is_some();
  let battalion_exists = match input.battalion_id {
    Some(id) => store.get_battalion(id).await.map_err(ApiError::store)?.is_some(),
    None => true,
  };
  let enlistment_type_exists = match input.enlistment_type_id {
    Some(id) => store
      .get_metadata(MetadataKind::EnlistmentType, id)
      .await
      .map_err(ApiError::store)?
      .is_some(),
    None => true,
  };
  let gender_exists = match input.gender_id {
    Some(id) => store
      .get_metadata(MetadataKind::Gender, id)
      .await
      .map_err(ApiError::store)?
      .is_some(),
    None => true,
  };
  Ok(ServicepersonContext {
    number_taken,
    rank_exists,
    battalion_exists,
    enlistment_type_exists,
    gender_exists,
  })
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub search:  Option<String>,
  pub trashed: Option<Trashed>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

impl ListParams {
  fn into_query(self, officers_only: bool) -> ServicepersonQuery {
    ServicepersonQuery {
      search: self.search,
      officers_only,
      trashed: self.trashed.unwrap_or_default(),
      limit: self.limit,
      offset: self.offset,
    }
  }
}

/// `GET /servicepeople`
pub async fn list<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ServicepersonRow>>, ApiError> {
  user.authorize(Ability::ViewAny, RESOURCE)?;
  let rows = store.list_servicepeople(params.into_query(false)).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// `GET /officers`
pub async fn officers<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ServicepersonRow>>, ApiError> {
  user.authorize(Ability::ViewAny, RESOURCE)?;
  let rows = store.list_servicepeople(params.into_query(true)).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /servicepeople`
pub async fn create<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Json(body): Json<NewServiceperson>,
) -> Result<impl IntoResponse, ApiError> {
  user.authorize(Ability::Create, RESOURCE)?;

  let number_taken = store.get_serviceperson(body.number).await.map_err(ApiError::store)?.is_some();
  let ctx = context_for(store.as_ref(), &body, number_taken).await?;
  let input = validate_serviceperson(body, &ctx)?;

  let created = store.create_serviceperson(input).await.map_err(ApiError::store)?;
  tracing::info!(number = created.number, "serviceperson created");
  let row = store
    .get_serviceperson(created.number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(created.number))?;
  Ok((StatusCode::CREATED, Json(row)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /servicepeople/{number}`
pub async fn get_one<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(number): Path<i64>,
) -> Result<Json<ServicepersonRow>, ApiError> {
  user.authorize(Ability::View, RESOURCE)?;
  let row = store
    .get_serviceperson(number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(number))?;
  Ok(Json(row))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /servicepeople/{number}`
pub async fn update<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(number): Path<i64>,
  Json(body): Json<NewServiceperson>,
) -> Result<Json<ServicepersonRow>, ApiError> {
  user.authorize(Ability::Update, RESOURCE)?;

  let body = NewServiceperson { number, ..body };
  let ctx = context_for(store.as_ref(), &body, false).await?;
  let input = validate_serviceperson(body, &ctx)?;

  store
    .update_serviceperson(number, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(number))?;
  let row = store
    .get_serviceperson(number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(number))?;
  Ok(Json(row))
}

// ─── Delete / restore ─────────────────────────────────────────────────────────

/// `DELETE /servicepeople/{number}`
pub async fn delete_one<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(number): Path<i64>,
) -> Result<StatusCode, ApiError> {
  user.authorize(Ability::Delete, RESOURCE)?;
  if store.trash_serviceperson(number).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(not_found(number))
  }
}

/// `POST /servicepeople/{number}/restore`
pub async fn restore<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(number): Path<i64>,
) -> Result<Json<ServicepersonRow>, ApiError> {
  user.authorize(Ability::Restore, RESOURCE)?;
  if !store.restore_serviceperson(number).await.map_err(ApiError::store)? {
    return Err(not_found(number));
  }
  let row = store
    .get_serviceperson(number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(number))?;
  Ok(Json(row))
}
