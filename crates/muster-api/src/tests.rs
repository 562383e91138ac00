//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use muster_core::{
  metadata::grade,
  seed::{self, AdminSeed, SeedOptions},
  store::RecordStore,
  user::NewUser,
};
use muster_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

/// Cheap argon2 parameters; verification reads them back from the hash.
fn quick_hash(password: &str) -> String {
  let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
  let salt = SaltString::generate(&mut OsRng);
  Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string()
}

async fn make_store() -> Arc<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let options = SeedOptions {
    admin:         Some(AdminSeed {
      username:      "admin".into(),
      name:          "Administrator".into(),
      password_hash: quick_hash("secret"),
    }),
    servicepeople: Vec::new(),
  };
  seed::run(&store, &options).await.unwrap();

  store
    .create_user(NewUser {
      username:       "clerk".into(),
      name:           "Records Clerk".into(),
      password_hash:  quick_hash("clerkpass"),
      is_super_admin: false,
      permissions:    ["view_any_serviceperson".to_owned()].into(),
    })
    .await
    .unwrap();

  Arc::new(store)
}

fn basic(user: &str, pass: &str) -> String { format!("Basic {}", B64.encode(format!("{user}:{pass}"))) }

async fn send(
  store: &Arc<SqliteStore>,
  method: &str,
  uri: &str,
  auth: Option<(&str, &str)>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some((user, pass)) = auth {
    builder = builder.header(header::AUTHORIZATION, basic(user, pass));
  }
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = api_router(store.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, json)
}

const ADMIN: Option<(&str, &str)> = Some(("admin", "secret"));

async fn add_officer(store: &Arc<SqliteStore>, number: i64, rank_id: i64) {
  let (status, _) = send(
    store,
    "POST",
    "/servicepeople",
    ADMIN,
    Some(json!({
      "number": number,
      "first_name": "Ann",
      "last_name": "Baptiste",
      "rank_id": rank_id,
      "battalion_id": 1,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
}

fn appraisal(number: i64, start: &str, end: &str) -> Value {
  json!({
    "serviceperson_number": number,
    "appraisal_start_at": start,
    "appraisal_end_at": end,
    "officer_appraisal_grade_id": grade::GOOD,
    "battalion_id": 1,
    "rank_id": 10,
  })
}

// ─── Authentication and policy ───────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_are_challenged() {
  let store = make_store().await;
  let req = Request::builder().uri("/me").body(Body::empty()).unwrap();
  let resp = api_router(store).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
  let store = make_store().await;
  let (status, _) = send(&store, "GET", "/me", Some(("admin", "nope")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  let (status, _) = send(&store, "GET", "/me", Some(("ghost", "secret")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_profile_without_hash() {
  let store = make_store().await;
  let (status, body) = send(&store, "GET", "/me", ADMIN, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["username"], "admin");
  assert_eq!(body["is_super_admin"], true);
  assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn user_without_permission_cannot_list_interview_reasons() {
  let store = make_store().await;
  let clerk = Some(("clerk", "clerkpass"));

  let (status, _) = send(&store, "GET", "/metadata/interview-reasons", clerk, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&store, "GET", "/servicepeople", clerk, None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) = send(&store, "GET", "/metadata/interview-reasons", ADMIN, None).await;
  assert_eq!(status, StatusCode::OK);
}

// ─── Metadata ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn metadata_create_update_delete() {
  let store = make_store().await;
  let uri = "/metadata/interview-reasons";

  let (status, created) =
    send(&store, "POST", uri, ADMIN, Some(json!({ "name": "Career Guidance" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["slug"], "career-guidance");
  let id = created["id"].as_i64().unwrap();

  let (status, body) =
    send(&store, "POST", uri, ADMIN, Some(json!({ "name": "career guidance" }))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["errors"]["name"][0], "The name has already been taken.");

  let (status, updated) =
    send(&store, "PUT", &format!("{uri}/{id}"), ADMIN, Some(json!({ "name": "Welfare" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["slug"], "welfare");

  let (status, _) = send(&store, "DELETE", &format!("{uri}/{id}"), ADMIN, None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&store, "GET", &format!("{uri}/{id}"), ADMIN, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_metadata_kind_is_not_found() {
  let store = make_store().await;
  let (status, _) = send(&store, "GET", "/metadata/blood-types", ADMIN, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn referenced_metadata_cannot_be_deleted() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let (status, _) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-01-01", "2022-12-31")))
      .await;
  assert_eq!(status, StatusCode::CREATED);

  let uri = format!("/metadata/officer-appraisal-grades/{}", grade::GOOD);
  let (status, body) = send(&store, "DELETE", &uri, ADMIN, None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["errors"]["id"][0], "The officer appraisal grade 3 is still in use.");
  assert!(!body.to_string().contains("FOREIGN KEY"));
  let (status, _) = send(&store, "GET", &uri, ADMIN, None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = send(
    &store,
    "POST",
    "/metadata/officer-appraisal-grades/bulk-delete",
    ADMIN,
    Some(json!({ "ids": [grade::EXCELLENT, grade::GOOD] })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["errors"]["ids"].is_array());
  let (status, _) = send(
    &store,
    "GET",
    &format!("/metadata/officer-appraisal-grades/{}", grade::EXCELLENT),
    ADMIN,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn seeded_grades_are_listed() {
  let store = make_store().await;
  let (status, body) = send(&store, "GET", "/metadata/officer-appraisal-grades", ADMIN, None).await;
  assert_eq!(status, StatusCode::OK);
  let names: Vec<_> = body.as_array().unwrap().iter().map(|g| g["name"].clone()).collect();
  assert_eq!(names.len(), 6);
  assert_eq!(body[5]["id"], grade::NOT_GRADED);
  assert_eq!(body[5]["name"], "not graded");
}

// ─── Servicepeople ───────────────────────────────────────────────────────────

#[tokio::test]
async fn officers_endpoint_excludes_enlisted_ranks() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  add_officer(&store, 4002, 3).await;

  let (_, officers) = send(&store, "GET", "/officers", ADMIN, None).await;
  let officers = officers.as_array().unwrap();
  assert_eq!(officers.len(), 1);
  assert_eq!(officers[0]["military_name"], "Capt Ann Baptiste");

  let (_, everyone) = send(&store, "GET", "/servicepeople", ADMIN, None).await;
  assert_eq!(everyone.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_serviceperson_number_is_rejected() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let (status, body) = send(
    &store,
    "POST",
    "/servicepeople",
    ADMIN,
    Some(json!({ "number": 4001, "first_name": "X", "last_name": "Y", "rank_id": 99 })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["errors"]["number"].is_array());
  assert!(body["errors"]["rank_id"].is_array());
}

// ─── Appraisals ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn not_graded_requires_a_reason() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;

  let mut body = appraisal(4001, "2022-01-01", "2022-12-31");
  body["officer_appraisal_grade_id"] = json!(grade::NOT_GRADED);
  let (status, errors) = send(&store, "POST", "/appraisals", ADMIN, Some(body.clone())).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(errors["errors"]["non_grading_reason"].is_array());

  body["non_grading_reason"] = json!("on course");
  let (status, created) = send(&store, "POST", "/appraisals", ADMIN, Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["non_grading_reason"], "on course");
  assert_eq!(created["grade_name"], "not graded");
}

#[tokio::test]
async fn company_commander_implies_unit_commander() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;

  let mut body = appraisal(4001, "2022-01-01", "2022-12-31");
  body["has_company_commander"] = json!(true);
  let (status, errors) = send(&store, "POST", "/appraisals", ADMIN, Some(body)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(errors["errors"]["has_unit_commander"].is_array());
}

#[tokio::test]
async fn overlapping_periods_are_rejected() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;

  let (status, first) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-01-01", "2022-12-31")))
      .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(first["status"], "incomplete");

  let (status, errors) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-12-31", "2023-06-30")))
      .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(errors["errors"]["appraisal_start_at"].is_array());

  // Editing the record itself does not collide with its own period.
  let id = first["id"].as_i64().unwrap();
  let (status, _) = send(
    &store,
    "PUT",
    &format!("/appraisals/{id}"),
    ADMIN,
    Some(appraisal(4001, "2022-02-01", "2022-12-31")),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn enlisted_serviceperson_cannot_be_appraised() {
  let store = make_store().await;
  add_officer(&store, 4002, 3).await;
  let (status, errors) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4002, "2022-01-01", "2022-12-31")))
      .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(errors["errors"]["serviceperson_number"].is_array());
}

#[tokio::test]
async fn hidden_dependents_are_cleared_on_save() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;

  let mut body = appraisal(4001, "2022-01-01", "2022-12-31");
  body["has_company_commander_comments"] = json!(true);
  body["has_company_commander_signature"] = json!(true);
  body["disciplinary_action_particulars"] = json!("stale text");
  let (status, created) = send(&store, "POST", "/appraisals", ADMIN, Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["has_company_commander_comments"], false);
  assert_eq!(created["has_company_commander_signature"], false);
  assert_eq!(created["disciplinary_action_particulars"], Value::Null);
}

#[tokio::test]
async fn form_state_cascades_resets() {
  let store = make_store().await;
  let body = json!({
    "form": {
      "has_company_commander": true,
      "has_company_commander_comments": true,
      "has_company_commander_signature": true,
      "has_unit_commander": true,
    },
    "change": { "field": "has_company_commander", "value": false },
  });

  let (status, state) = send(&store, "POST", "/appraisals/form-state", ADMIN, Some(body)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(state["form"]["has_company_commander_comments"], false);
  assert_eq!(state["form"]["has_company_commander_signature"], false);
  assert_eq!(state["form"]["has_unit_commander"], true);
  let reset = state["reset"].as_array().unwrap();
  assert!(reset.contains(&json!("has_company_commander_comments")));
  assert!(reset.contains(&json!("has_company_commander_signature")));
  let visible = state["evaluation"]["visible"].as_array().unwrap();
  assert!(visible.contains(&json!("has_unit_commander_comments")));
  assert!(!visible.contains(&json!("has_company_commander_comments")));
}

#[tokio::test]
async fn form_state_rejects_unknown_fields() {
  let store = make_store().await;
  let body = json!({ "change": { "field": "shoe_size", "value": 9 } });
  let (status, _) = send(&store, "POST", "/appraisals/form-state", ADMIN, Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trash_restore_and_force_delete() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let (_, created) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-01-01", "2022-12-31")))
      .await;
  let id = created["id"].as_i64().unwrap();

  let (status, _) = send(&store, "DELETE", &format!("/appraisals/{id}"), ADMIN, None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (_, live) = send(&store, "GET", "/appraisals", ADMIN, None).await;
  assert!(live.as_array().unwrap().is_empty());
  let (_, only) = send(&store, "GET", "/appraisals?trashed=only", ADMIN, None).await;
  assert_eq!(only.as_array().unwrap().len(), 1);

  let (status, restored) =
    send(&store, "POST", &format!("/appraisals/{id}/restore"), ADMIN, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(restored["deleted_at"], Value::Null);

  let (status, _) = send(&store, "DELETE", &format!("/appraisals/{id}/force"), ADMIN, None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&store, "GET", &format!("/appraisals/{id}"), ADMIN, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restore_into_a_taken_period_is_rejected() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let (_, first) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-01-01", "2022-12-31")))
      .await;
  let id = first["id"].as_i64().unwrap();
  send(&store, "DELETE", &format!("/appraisals/{id}"), ADMIN, None).await;

  // The trashed record no longer blocks the period.
  let (status, _) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-06-01", "2022-08-31")))
      .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) =
    send(&store, "POST", &format!("/appraisals/{id}/restore"), ADMIN, None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["errors"]["appraisal_start_at"].is_array());
  let (_, row) = send(&store, "GET", &format!("/appraisals/{id}"), ADMIN, None).await;
  assert_ne!(row["deleted_at"], Value::Null);
}

#[tokio::test]
async fn trashed_appraisal_cannot_be_edited() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let (_, created) =
    send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-01-01", "2022-12-31")))
      .await;
  let id = created["id"].as_i64().unwrap();
  send(&store, "DELETE", &format!("/appraisals/{id}"), ADMIN, None).await;

  let (status, _) = send(
    &store,
    "PUT",
    &format!("/appraisals/{id}"),
    ADMIN,
    Some(appraisal(4001, "2022-02-01", "2022-12-31")),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, row) = send(&store, "GET", &format!("/appraisals/{id}"), ADMIN, None).await;
  assert_eq!(row["appraisal_start_at"], "2022-01-01");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_store_one_appraisal() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;

  let tasks: Vec<_> = (0..8)
    .map(|_| {
      let store = store.clone();
      tokio::spawn(async move {
        let body = appraisal(4001, "2022-01-01", "2022-12-31");
        send(&store, "POST", "/appraisals", ADMIN, Some(body)).await.0
      })
    })
    .collect();

  let mut statuses = Vec::new();
  for task in tasks {
    statuses.push(task.await.unwrap());
  }
  assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
  assert!(
    statuses
      .iter()
      .all(|s| *s == StatusCode::CREATED || *s == StatusCode::UNPROCESSABLE_ENTITY)
  );
  let (_, rows) = send(&store, "GET", "/appraisals", ADMIN, None).await;
  assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn export_writes_selected_rows_as_csv() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let mut ids = Vec::new();
  for (start, end) in [("2021-01-01", "2021-12-31"), ("2022-01-01", "2022-12-31")] {
    let (_, created) =
      send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, start, end))).await;
    ids.push(created["id"].as_i64().unwrap());
  }

  let export = |auth: &str, ids: Value| {
    Request::builder()
      .method("POST")
      .uri("/appraisals/export")
      .header(header::AUTHORIZATION, auth)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json!({ "ids": ids }).to_string()))
      .unwrap()
  };

  let req = export(&basic("admin", "secret"), json!([ids[1], 999]));
  let resp = api_router(store.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let text = String::from_utf8(bytes.to_vec()).unwrap();
  let lines: Vec<_> = text.lines().collect();
  assert_eq!(lines.len(), 2);
  assert!(lines[0].starts_with("Number,Military name,Unit"));
  assert!(lines[1].starts_with("4001,"));
  assert!(lines[1].contains("2022-01-01,2022-12-31,good,Capt,incomplete"));

  let req = export(&basic("clerk", "clerkpass"), json!(ids));
  let resp = api_router(store).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_filters_by_scope() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  let mut done = appraisal(4001, "2021-01-01", "2021-12-31");
  for flag in [
    "is_appointment_correct",
    "is_assessment_rubric_complete",
    "has_formation_commander_comments",
    "has_formation_commander_signature",
    "has_serviceperson_signature",
  ] {
    done[flag] = json!(true);
  }
  send(&store, "POST", "/appraisals", ADMIN, Some(done)).await;
  send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-01-01", "2022-12-31")))
    .await;

  let (_, completed) = send(&store, "GET", "/appraisals?scopes=completed", ADMIN, None).await;
  let completed = completed.as_array().unwrap();
  assert_eq!(completed.len(), 1);
  assert_eq!(completed[0]["status"], "complete");

  let (status, _) = send(&store, "GET", "/appraisals?scopes=finished", ADMIN, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_by_year_returns_title_and_details() {
  let store = make_store().await;
  add_officer(&store, 4001, 10).await;
  send(&store, "POST", "/appraisals", ADMIN, Some(appraisal(4001, "2022-10-01", "2023-09-30")))
    .await;

  let (status, hits) = send(&store, "GET", "/search?q=2023", ADMIN, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(hits[0]["title"], "Capt Ann Baptiste");
  assert_eq!(hits[0]["details"]["Year"], 2023);
  assert_eq!(hits[0]["details"]["Status"], "incomplete");

  let (_, none) = send(&store, "GET", "/search?q=2019", ADMIN, None).await;
  assert!(none.as_array().unwrap().is_empty());
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_creates_user_who_can_log_in() {
  let store = make_store().await;
  let (status, created) = send(
    &store,
    "POST",
    "/users",
    ADMIN,
    Some(json!({
      "username": "registrar",
      "name": "Registrar",
      "password": "longenough",
      "permissions": ["view_any_metadata::interview::reason"],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert!(created.get("password_hash").is_none());

  let registrar = Some(("registrar", "longenough"));
  let (status, _) = send(&store, "GET", "/metadata/interview-reasons", registrar, None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = send(&store, "GET", "/users", registrar, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn short_passwords_are_rejected() {
  let store = make_store().await;
  let (status, body) = send(
    &store,
    "POST",
    "/users",
    ADMIN,
    Some(json!({ "username": "x", "name": "X", "password": "short" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn profile_name_change_keeps_password() {
  let store = make_store().await;
  let clerk = Some(("clerk", "clerkpass"));
  let (status, body) =
    send(&store, "PUT", "/me", clerk, Some(json!({ "name": "Chief Clerk" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["name"], "Chief Clerk");
  assert!(body.get("password_hash").is_none());

  let (status, body) = send(&store, "GET", "/me", clerk, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["name"], "Chief Clerk");
}

#[tokio::test]
async fn profile_password_change_needs_current_password() {
  let store = make_store().await;
  let clerk = Some(("clerk", "clerkpass"));

  let (status, body) = send(
    &store,
    "PUT",
    "/me",
    clerk,
    Some(json!({
      "name": "Records Clerk",
      "current_password": "wrong",
      "password": "a-new-secret",
      "password_confirmation": "a-new-secret",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["errors"]["current_password"][0], "The password is incorrect.");

  let (status, body) = send(
    &store,
    "PUT",
    "/me",
    clerk,
    Some(json!({
      "name": "Records Clerk",
      "current_password": "clerkpass",
      "password": "short",
      "password_confirmation": "short",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["errors"]["password"].is_array());

  let (status, _) = send(
    &store,
    "PUT",
    "/me",
    clerk,
    Some(json!({
      "name": "Records Clerk",
      "current_password": "clerkpass",
      "password": "a-new-secret",
      "password_confirmation": "a-new-secret",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) = send(&store, "GET", "/me", clerk, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  let (status, _) = send(&store, "GET", "/me", Some(("clerk", "a-new-secret")), None).await;
  assert_eq!(status, StatusCode::OK);
}
