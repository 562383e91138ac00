//! Handler for `GET /search`.
//!
//! Global search over appraisals: the text matches serviceperson numbers and
//! names, and a four-digit year matches the year the appraisal period ended.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use muster_core::{
  appraisal::SearchResult,
  policy::{Ability, ResourceKind},
  scope::AppraisalQuery,
  store::RecordStore,
};
use serde::Deserialize;

use crate::{auth::CurrentUser, error::ApiError};

const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  #[serde(default)]
  pub q: String,
}

/// `GET /search?q=<text>`
pub async fn handler<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
  user.authorize(Ability::ViewAny, ResourceKind::AppraisalChecklist)?;

  let text = params.q.trim();
  if text.is_empty() {
    return Ok(Json(Vec::new()));
  }

  let query = AppraisalQuery {
    search: Some(text.to_owned()),
    limit: Some(SEARCH_LIMIT),
    ..AppraisalQuery::default()
  };
  let rows = store.list_appraisals(query).await.map_err(ApiError::store)?;
  Ok(Json(rows.iter().map(SearchResult::from).collect()))
}
