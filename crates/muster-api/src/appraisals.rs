//! Handlers for `/appraisals` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/appraisals` | Table filters, see [`ListParams`] |
//! | `POST`   | `/appraisals` | Body: [`AppraisalForm`]; 422 on validation failure |
//! | `POST`   | `/appraisals/form-state` | Apply one change, return form + evaluation |
//! | `POST`   | `/appraisals/bulk-delete` | Body: `{"ids":[1,2]}`; soft delete |
//! | `POST`   | `/appraisals/export` | Body: `{"ids":[1,2]}`; table columns as CSV |
//! | `GET`    | `/appraisals/{id}` | Includes trashed rows |
//! | `PUT`    | `/appraisals/{id}` | Body: [`AppraisalForm`]; 404 when trashed |
//! | `DELETE` | `/appraisals/{id}` | Soft delete |
//! | `POST`   | `/appraisals/{id}/restore` | 422 if the period is now taken |
//! | `DELETE` | `/appraisals/{id}/force` | Permanent delete |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use muster_core::{
  appraisal::{AppraisalForm, AppraisalRow, Field, FieldValue, PeriodWrite},
  metadata::MetadataKind,
  policy::{Ability, ResourceKind},
  rules::{self, Evaluation},
  scope::{AppraisalQuery, AppraisalSort, CompletionScope, Trashed},
  store::RecordStore,
  validation::{AppraisalContext, overlap_error, validate_appraisal},
};
use serde::{Deserialize, Serialize};

use crate::{
  auth::CurrentUser,
  error::ApiError,
  metadata::{BulkDeleteBody, BulkDeleted},
};

const RESOURCE: ResourceKind = ResourceKind::AppraisalChecklist;

fn not_found(id: i64) -> ApiError { ApiError::NotFound(format!("appraisal {id} not found")) }

/// Unwrap a guarded store write. The store re-checks the overlap rule inside
/// its write transaction, so a period taken since validation still lands
/// here as a 422.
fn written<T>(id: i64, outcome: PeriodWrite<T>) -> Result<T, ApiError> {
  match outcome {
    PeriodWrite::Written(value) => Ok(value),
    PeriodWrite::Missing => Err(not_found(id)),
    PeriodWrite::Overlaps(period) => {
      tracing::debug!(id, conflicting = period.id, "appraisal period already taken");
      Err(ApiError::Validation(overlap_error()))
    }
  }
}

/// Gather what the validator needs to know about the rows `form` refers to.
async fn context_for<S: RecordStore>(
  store: &S,
  form: &AppraisalForm,
  editing: Option<i64>,
) -> Result<AppraisalContext, ApiError> {
  let mut ctx = AppraisalContext::new(Utc::now().date_naive());
  ctx.editing = editing;

  ctx.serviceperson_rank_id = match form.serviceperson_number {
    Some(number) => store
      .get_serviceperson(number)
      .await
      .map_err(ApiError::store)?
      .filter(|row| !row.serviceperson.is_trashed())
      .map(|row| row.serviceperson.rank_id),
    None => None,
  };
  if let Some(id) = form.officer_appraisal_grade_id {
    ctx.grade_exists = store
      .get_metadata(MetadataKind::OfficerAppraisalGrade, id)
      .await
      .map_err(ApiError::store)?
      .is_some();
  }
  if let Some(id) = form.battalion_id {
    ctx.battalion_exists = store.get_battalion(id).await.map_err(ApiError::store)?.is_some();
  }
  if let Some(id) = form.rank_id {
    ctx.rank_exists = store.get_rank(id).await.map_err(ApiError::store)?.is_some();
  }
  if let (Some(number), Some(start), Some(end)) =
    (form.serviceperson_number, form.appraisal_start_at, form.appraisal_end_at)
  {
    ctx.existing_periods =
      store.overlapping_periods(number, start, end).await.map_err(ApiError::store)?;
  }
  Ok(ctx)
}

async fn fetch_row<S: RecordStore>(store: &S, id: i64) -> Result<AppraisalRow, ApiError> {
  store.get_appraisal(id).await.map_err(ApiError::store)?.ok_or_else(|| not_found(id))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Serviceperson number or name; a four-digit year matches the end date.
  pub search:             Option<String>,
  pub start_on_or_before: Option<NaiveDate>,
  pub end_on_or_before:   Option<NaiveDate>,
  pub grade_id:           Option<i64>,
  pub serviceperson:      Option<i64>,
  /// Comma-separated completion scopes, e.g. `completed,has_disciplinary_action`.
  pub scopes:             Option<String>,
  pub trashed:            Option<Trashed>,
  pub sort:               Option<AppraisalSort>,
  #[serde(default)]
  pub descending:         bool,
  pub limit:              Option<usize>,
  pub offset:             Option<usize>,
}

impl ListParams {
  fn into_query(self) -> Result<AppraisalQuery, ApiError> {
    let scopes = self
      .scopes
      .as_deref()
      .map(|s| {
        s.split(',')
          .filter(|t| !t.trim().is_empty())
          .map(CompletionScope::parse)
          .collect::<Result<Vec<_>, _>>()
      })
      .transpose()?
      .unwrap_or_default();

    Ok(AppraisalQuery {
      search: self.search,
      start_on_or_before: self.start_on_or_before,
      end_on_or_before: self.end_on_or_before,
      grade_id: self.grade_id,
      serviceperson: self.serviceperson,
      scopes,
      trashed: self.trashed.unwrap_or_default(),
      sort: self.sort.unwrap_or_default(),
      descending: self.descending,
      limit: self.limit,
      offset: self.offset,
    })
  }
}

/// `GET /appraisals[?search=...][&scopes=...][&trashed=...][&sort=...]`
pub async fn list<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AppraisalRow>>, ApiError> {
  user.authorize(Ability::ViewAny, RESOURCE)?;
  let rows = store.list_appraisals(params.into_query()?).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

// ─── Form state ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FieldChange {
  pub field: String,
  pub value: FieldValue,
}

#[derive(Debug, Deserialize)]
pub struct FormStateBody {
  #[serde(default)]
  pub form:   AppraisalForm,
  pub change: Option<FieldChange>,
}

#[derive(Debug, Serialize)]
pub struct FormState {
  pub form:       AppraisalForm,
  /// Dependents forced back to their empty value by this request.
  pub reset:      Vec<Field>,
  pub evaluation: Evaluation,
}

/// `POST /appraisals/form-state`
///
/// Applies `change` (if any) to `form`, cascades resets through the rule
/// table, and returns the resulting form with its visibility and
/// requiredness. Nothing is persisted.
pub async fn form_state<S: RecordStore + 'static>(
  State(_store): State<Arc<S>>,
  user: CurrentUser,
  Json(body): Json<FormStateBody>,
) -> Result<Json<FormState>, ApiError> {
  user.authorize(Ability::Create, RESOURCE)?;

  let mut form = body.form;
  let reset = match body.change {
    Some(change) => {
      let field = Field::parse(&change.field)?;
      rules::apply_change(&mut form, field, change.value)?
    }
    None => rules::normalize(&mut form),
  };
  let evaluation = rules::evaluate(&form);
  Ok(Json(FormState { form, reset, evaluation }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /appraisals`
pub async fn create<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Json(form): Json<AppraisalForm>,
) -> Result<impl IntoResponse, ApiError> {
  user.authorize(Ability::Create, RESOURCE)?;

  let ctx = context_for(store.as_ref(), &form, None).await?;
  let details = validate_appraisal(form, &ctx)?;

  let number = details.serviceperson_number;
  let outcome = store.create_appraisal(details).await.map_err(ApiError::store)?;
  let created = written(number, outcome)?;
  tracing::info!(
    id = created.id,
    number = created.details.serviceperson_number,
    "appraisal created"
  );
  let row = fetch_row(store.as_ref(), created.id).await?;
  Ok((StatusCode::CREATED, Json(row)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /appraisals/{id}`
pub async fn get_one<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(id): Path<i64>,
) -> Result<Json<AppraisalRow>, ApiError> {
  user.authorize(Ability::View, RESOURCE)?;
  Ok(Json(fetch_row(store.as_ref(), id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /appraisals/{id}`
pub async fn update<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(id): Path<i64>,
  Json(form): Json<AppraisalForm>,
) -> Result<Json<AppraisalRow>, ApiError> {
  user.authorize(Ability::Update, RESOURCE)?;
  // Trashed rows must be restored before they can be edited.
  if fetch_row(store.as_ref(), id).await?.checklist.deleted_at.is_some() {
    return Err(not_found(id));
  }

  let ctx = context_for(store.as_ref(), &form, Some(id)).await?;
  let details = validate_appraisal(form, &ctx)?;

  let outcome = store.update_appraisal(id, details).await.map_err(ApiError::store)?;
  written(id, outcome)?;
  Ok(Json(fetch_row(store.as_ref(), id).await?))
}

// ─── Delete / restore ─────────────────────────────────────────────────────────

/// `DELETE /appraisals/{id}`
pub async fn delete_one<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
  user.authorize(Ability::Delete, RESOURCE)?;
  match store.trash_appraisals(vec![id]).await.map_err(ApiError::store)? {
    0 => Err(not_found(id)),
    _ => Ok(StatusCode::NO_CONTENT),
  }
}

/// `POST /appraisals/bulk-delete`
pub async fn bulk_delete<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Json(body): Json<BulkDeleteBody>,
) -> Result<Json<BulkDeleted>, ApiError> {
  user.authorize(Ability::DeleteAny, RESOURCE)?;
  let deleted = store.trash_appraisals(body.ids).await.map_err(ApiError::store)?;
  Ok(Json(BulkDeleted { deleted }))
}

// ─── Export ───────────────────────────────────────────────────────────────────

const EXPORT_HEADER: [&str; 8] = [
  "Number",
  "Military name",
  "Unit",
  "Appraisal start",
  "Appraisal end",
  "Grade",
  "Substantive rank",
  "Status",
];

/// Render `rows` as CSV with the table's columns.
pub fn export_csv(rows: &[AppraisalRow]) -> Result<Vec<u8>, ApiError> {
  let mut out = csv::Writer::from_writer(Vec::new());
  out.write_record(EXPORT_HEADER).map_err(ApiError::store)?;
  for row in rows {
    let details = &row.checklist.details;
    let number = details.serviceperson_number.to_string();
    let start_at = details.appraisal_start_at.to_string();
    let end_at = details.appraisal_end_at.to_string();
    out
      .write_record([
        number.as_str(),
        row.military_name.as_str(),
        row.battalion_short_name.as_deref().unwrap_or_default(),
        start_at.as_str(),
        end_at.as_str(),
        row.grade_name.as_deref().unwrap_or_default(),
        row.rank_abbreviation.as_deref().unwrap_or_default(),
        row.status.as_str(),
      ])
      .map_err(ApiError::store)?;
  }
  out.into_inner().map_err(|e| ApiError::store(e.into_error()))
}

/// `POST /appraisals/export`
///
/// Unknown ids are skipped; rows come back in the order requested.
pub async fn export<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Json(body): Json<BulkDeleteBody>,
) -> Result<impl IntoResponse, ApiError> {
  user.authorize(Ability::ViewAny, RESOURCE)?;

  let mut rows = Vec::with_capacity(body.ids.len());
  for id in body.ids {
    if let Some(row) = store.get_appraisal(id).await.map_err(ApiError::store)? {
      rows.push(row);
    }
  }
  let csv = export_csv(&rows)?;
  tracing::info!(rows = rows.len(), "appraisals exported");

  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
      (header::CONTENT_DISPOSITION, "attachment; filename=\"appraisals.csv\""),
    ],
    csv,
  ))
}

// ─── Restore / force delete ───────────────────────────────────────────────────

/// `POST /appraisals/{id}/restore`
pub async fn restore<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(id): Path<i64>,
) -> Result<Json<AppraisalRow>, ApiError> {
  user.authorize(Ability::Restore, RESOURCE)?;
  let outcome = store.restore_appraisal(id).await.map_err(ApiError::store)?;
  written(id, outcome)?;
  tracing::info!(id, "appraisal restored");
  Ok(Json(fetch_row(store.as_ref(), id).await?))
}

/// `DELETE /appraisals/{id}/force`
pub async fn force_delete<S: RecordStore + 'static>(
  State(store): State<Arc<S>>,
  user: CurrentUser,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
  user.authorize(Ability::ForceDelete, RESOURCE)?;
  if store.force_delete_appraisal(id).await.map_err(ApiError::store)? {
    tracing::info!(id, "appraisal permanently deleted");
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(not_found(id))
  }
}
