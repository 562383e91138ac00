//! Record validation.
//!
//! Validators are pure: everything they need from the database is looked up
//! beforehand and passed in as a context value. A record either validates in
//! full or is rejected with every failing field reported at once.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::{
  appraisal::{AppraisalDetails, AppraisalForm, AppraisalPeriod, Field, FieldValue},
  metadata::{MetadataKind, NewMetadataEntry},
  organisation::Rank,
  policy,
  rules::{self, IMPLIED_FLAGS},
  serviceperson::NewServiceperson,
  user::{NewUserForm, ProfileForm},
};

const MAX_STRING: usize = 255;
const MAX_TEXT: usize = 65_535;
pub const MIN_PASSWORD: usize = 8;

const OVERLAP_MESSAGE: &str =
  "An appraisal for this serviceperson already covers part of this period.";

// ─── Error bag ───────────────────────────────────────────────────────────────

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.entry(field.into()).or_default().push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn has(&self, field: &str) -> bool { self.0.contains_key(field) }

  pub fn messages(&self, field: &str) -> &[String] {
    self.0.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  /// The first message overall, used as the summary line of a 422 response.
  pub fn first(&self) -> Option<&str> {
    self.0.values().flatten().next().map(String::as_str)
  }

  pub fn into_result<T>(self, value: T) -> Result<T, Self> {
    if self.is_empty() { Ok(value) } else { Err(self) }
  }
}

fn required_message(label: &str) -> String { format!("The {label} field is required.") }

fn invalid_message(label: &str) -> String { format!("The selected {label} is invalid.") }

fn max_message(label: &str, max: usize) -> String {
  format!("The {label} field must not be greater than {max} characters.")
}

fn blank(s: &str) -> bool { s.trim().is_empty() }

fn trimmed(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

// ─── Appraisals ──────────────────────────────────────────────────────────────

/// Facts about the database needed to validate an appraisal.
#[derive(Debug, Clone)]
pub struct AppraisalContext {
  pub today:                  NaiveDate,
  /// The record being edited, excluded from the overlap rule.
  pub editing:                Option<i64>,
  /// Rank of the live serviceperson the form names; `None` if there is none.
  pub serviceperson_rank_id:  Option<i64>,
  pub grade_exists:           bool,
  pub battalion_exists:       bool,
  pub rank_exists:            bool,
  /// Live appraisals of the same serviceperson that may overlap the period.
  pub existing_periods:       Vec<AppraisalPeriod>,
}

impl AppraisalContext {
  /// A context in which every referenced row exists and nothing overlaps.
  pub fn new(today: NaiveDate) -> Self {
    Self {
      today,
      editing: None,
      serviceperson_rank_id: Some(Rank::O1),
      grade_exists: true,
      battalion_exists: true,
      rank_exists: true,
      existing_periods: Vec::new(),
    }
  }
}

/// Validate an appraisal form and produce the record to persist.
///
/// The form is normalized first, so hidden dependents never reach storage.
pub fn validate_appraisal(
  mut form: AppraisalForm,
  ctx: &AppraisalContext,
) -> Result<AppraisalDetails, ValidationErrors> {
  rules::normalize(&mut form);
  let mut errors = ValidationErrors::new();

  // required / required_if
  for field in rules::evaluate(&form).required {
    if !form.is_filled(field) {
      let message = rules::required_if_message(field)
        .unwrap_or_else(|| required_message(&field.label()));
      errors.add(field.name(), message);
    }
  }

  for text in [Field::NonGradingReason, Field::DisciplinaryActionParticulars] {
    if let FieldValue::Text(s) = form.get(text)
      && s.chars().count() > MAX_TEXT
    {
      errors.add(text.name(), max_message(&text.label(), MAX_TEXT));
    }
  }

  // before / after / before_or_equal:today
  if let (Some(start), Some(end)) = (form.appraisal_start_at, form.appraisal_end_at)
    && start >= end
  {
    errors.add(
      Field::AppraisalStartAt.name(),
      "The appraisal start at field must be a date before appraisal end at.",
    );
    errors.add(
      Field::AppraisalEndAt.name(),
      "The appraisal end at field must be a date after appraisal start at.",
    );
  }
  if let Some(end) = form.appraisal_end_at
    && end > ctx.today
  {
    errors.add(
      Field::AppraisalEndAt.name(),
      "The appraisal end at field must be a date before or equal to today.",
    );
  }

  for implied in IMPLIED_FLAGS {
    if form.flag(implied.when) == Some(true) && form.flag(implied.field) != Some(true) {
      errors.add(
        implied.field.name(),
        format!(
          "The {} must be selected when the officer has a {}.",
          implied.field.label(),
          implied.description
        ),
      );
    }
  }

  // references
  if form.serviceperson_number.is_some()
    && !ctx.serviceperson_rank_id.is_some_and(Rank::is_officer_rank)
  {
    errors.add(
      Field::ServicepersonNumber.name(),
      invalid_message(&Field::ServicepersonNumber.label()),
    );
  }
  if form.officer_appraisal_grade_id.is_some() && !ctx.grade_exists {
    errors.add(
      Field::OfficerAppraisalGradeId.name(),
      invalid_message(&Field::OfficerAppraisalGradeId.label()),
    );
  }
  if form.battalion_id.is_some() && !ctx.battalion_exists {
    errors.add(Field::BattalionId.name(), invalid_message(&Field::BattalionId.label()));
  }
  if form.rank_id.is_some() && !ctx.rank_exists {
    errors.add(Field::RankId.name(), invalid_message(&Field::RankId.label()));
  }

  // unique appraisal period
  if let (Some(start), Some(end)) = (form.appraisal_start_at, form.appraisal_end_at)
    && ctx
      .existing_periods
      .iter()
      .filter(|p| Some(p.id) != ctx.editing)
      .any(|p| p.overlaps(start, end))
  {
    errors.add(Field::AppraisalStartAt.name(), OVERLAP_MESSAGE);
  }

  match (
    form.serviceperson_number,
    form.appraisal_start_at,
    form.appraisal_end_at,
    form.officer_appraisal_grade_id,
  ) {
    (Some(number), Some(start), Some(end), Some(grade)) if errors.is_empty() => {
      Ok(AppraisalDetails {
        serviceperson_number:              number,
        appraisal_start_at:                start,
        appraisal_end_at:                  end,
        battalion_id:                      form.battalion_id,
        rank_id:                           form.rank_id,
        is_appointment_correct:            form.is_appointment_correct,
        is_assessment_rubric_complete:     form.is_assessment_rubric_complete,
        has_company_commander:             form.has_company_commander,
        has_company_commander_comments:    form.has_company_commander_comments,
        has_company_commander_signature:   form.has_company_commander_signature,
        officer_appraisal_grade_id:        grade,
        non_grading_reason:                trimmed(form.non_grading_reason),
        has_disciplinary_action:           form.has_disciplinary_action,
        disciplinary_action_particulars:   trimmed(form.disciplinary_action_particulars),
        has_unit_commander:                form.has_unit_commander,
        has_unit_commander_comments:       form.has_unit_commander_comments,
        has_unit_commander_signature:      form.has_unit_commander_signature,
        has_formation_commander_comments:  form.has_formation_commander_comments,
        has_formation_commander_signature: form.has_formation_commander_signature,
        has_serviceperson_signature:       form.has_serviceperson_signature,
      })
    }
    _ => Err(errors),
  }
}

/// The error reported when the store refuses a write because another live
/// appraisal covers part of the period.
pub fn overlap_error() -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  errors.add(Field::AppraisalStartAt.name(), OVERLAP_MESSAGE);
  errors
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// `name` is required and short; `description` is bounded; the slug derived
/// from `name` must be free within the kind.
pub fn validate_metadata(
  entry: NewMetadataEntry,
  slug_taken: bool,
) -> Result<NewMetadataEntry, ValidationErrors> {
  let mut errors = ValidationErrors::new();
  let name = entry.name.trim().to_owned();

  if blank(&name) {
    errors.add("name", required_message("name"));
  } else if name.chars().count() > MAX_STRING {
    errors.add("name", max_message("name", MAX_STRING));
  } else if slug_taken {
    errors.add("name", "The name has already been taken.");
  }

  let description = trimmed(entry.description);
  if description.as_ref().is_some_and(|d| d.chars().count() > MAX_TEXT) {
    errors.add("description", max_message("description", MAX_TEXT));
  }

  errors.into_result(NewMetadataEntry { name, description })
}

/// The error reported when lookup rows cannot be deleted because records
/// still point at them.
pub fn metadata_in_use_error(kind: MetadataKind, field: &str, ids: &[i64]) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  for id in ids {
    errors.add(field, format!("The {} {id} is still in use.", kind.label()));
  }
  errors
}

// ─── Servicepeople ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ServicepersonContext {
  /// Another live or trashed record already uses the number.
  pub number_taken:           bool,
  pub rank_exists:            bool,
  pub battalion_exists:       bool,
  pub enlistment_type_exists: bool,
  pub gender_exists:          bool,
}

impl Default for ServicepersonContext {
  fn default() -> Self {
    Self {
      number_taken:           false,
      rank_exists:            true,
      battalion_exists:       true,
      enlistment_type_exists: true,
      gender_exists:          true,
    }
  }
}

pub fn validate_serviceperson(
  input: NewServiceperson,
  ctx: &ServicepersonContext,
) -> Result<NewServiceperson, ValidationErrors> {
  let mut errors = ValidationErrors::new();

  if input.number <= 0 {
    errors.add("number", "The number field must be a positive integer.");
  } else if ctx.number_taken {
    errors.add("number", "The number has already been taken.");
  }

  for (field, value) in [("first_name", &input.first_name), ("last_name", &input.last_name)] {
    let label = field.replace('_', " ");
    if blank(value) {
      errors.add(field, required_message(&label));
    } else if value.chars().count() > MAX_STRING {
      errors.add(field, max_message(&label, MAX_STRING));
    }
  }
  if input.middle_name.as_ref().is_some_and(|m| m.chars().count() > MAX_STRING) {
    errors.add("middle_name", max_message("middle name", MAX_STRING));
  }

  if !ctx.rank_exists {
    errors.add("rank_id", invalid_message("rank"));
  }
  if input.battalion_id.is_some() && !ctx.battalion_exists {
    errors.add("battalion_id", invalid_message("battalion"));
  }
  if input.enlistment_type_id.is_some() && !ctx.enlistment_type_exists {
    errors.add("enlistment_type_id", invalid_message("enlistment type"));
  }
  if input.gender_id.is_some() && !ctx.gender_exists {
    errors.add("gender_id", invalid_message("gender"));
  }

  errors.into_result(NewServiceperson {
    first_name: input.first_name.trim().to_owned(),
    middle_name: trimmed(input.middle_name),
    last_name: input.last_name.trim().to_owned(),
    ..input
  })
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub fn validate_user(form: &NewUserForm, username_taken: bool) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();

  if blank(&form.username) {
    errors.add("username", required_message("username"));
  } else if form.username.chars().count() > MAX_STRING {
    errors.add("username", max_message("username", MAX_STRING));
  } else if username_taken {
    errors.add("username", "The username has already been taken.");
  }

  if blank(&form.name) {
    errors.add("name", required_message("name"));
  }

  if form.password.chars().count() < MIN_PASSWORD {
    errors.add(
      "password",
      format!("The password field must be at least {MIN_PASSWORD} characters."),
    );
  }

  let known = policy::all_permissions();
  for permission in &form.permissions {
    if !known.contains(permission) {
      errors.add("permissions", format!("Unknown permission {permission:?}."));
    }
  }

  errors.into_result(())
}

/// `current_password_ok` is whether `form.current_password` verified against
/// the stored hash.
pub fn validate_profile(
  form: &ProfileForm,
  current_password_ok: bool,
) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();

  if blank(&form.name) {
    errors.add("name", required_message("name"));
  } else if form.name.chars().count() > MAX_STRING {
    errors.add("name", max_message("name", MAX_STRING));
  }

  if let Some(password) = form.new_password() {
    if form.current_password.as_deref().is_none_or(blank) {
      errors.add("current_password", required_message("current password"));
    } else if !current_password_ok {
      errors.add("current_password", "The password is incorrect.");
    }
    if password.chars().count() < MIN_PASSWORD {
      errors.add(
        "password",
        format!("The password field must be at least {MIN_PASSWORD} characters."),
      );
    }
    if form.password_confirmation.as_deref() != Some(password) {
      errors.add("password", "The password field confirmation does not match.");
    }
  }

  errors.into_result(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::metadata::grade;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  fn today() -> NaiveDate { date(2024, 3, 1) }

  fn valid_form() -> AppraisalForm {
    AppraisalForm {
      serviceperson_number: Some(4021),
      appraisal_start_at: Some(date(2023, 1, 1)),
      appraisal_end_at: Some(date(2023, 12, 31)),
      officer_appraisal_grade_id: Some(grade::GOOD),
      is_appointment_correct: true,
      is_assessment_rubric_complete: true,
      ..Default::default()
    }
  }

  #[test]
  fn valid_form_produces_details() {
    let details = validate_appraisal(valid_form(), &AppraisalContext::new(today())).unwrap();
    assert_eq!(details.serviceperson_number, 4021);
    assert_eq!(details.officer_appraisal_grade_id, grade::GOOD);
  }

  #[test]
  fn empty_form_reports_all_required_fields() {
    let errors =
      validate_appraisal(AppraisalForm::default(), &AppraisalContext::new(today())).unwrap_err();
    for field in rules::ALWAYS_REQUIRED {
      assert!(errors.has(field.name()), "missing error for {field:?}");
    }
    assert_eq!(
      errors.messages("appraisal_start_at"),
      ["The appraisal start at field is required."]
    );
  }

  #[test]
  fn start_must_precede_end() {
    let mut form = valid_form();
    form.appraisal_end_at = form.appraisal_start_at;
    let errors = validate_appraisal(form, &AppraisalContext::new(today())).unwrap_err();
    assert!(errors.has("appraisal_start_at"));
    assert!(errors.has("appraisal_end_at"));
  }

  #[test]
  fn end_may_not_be_in_the_future() {
    let mut form = valid_form();
    form.appraisal_end_at = Some(date(2024, 3, 2));
    let errors = validate_appraisal(form, &AppraisalContext::new(today())).unwrap_err();
    assert_eq!(
      errors.messages("appraisal_end_at"),
      ["The appraisal end at field must be a date before or equal to today."]
    );

    let mut form = valid_form();
    form.appraisal_end_at = Some(today());
    assert!(validate_appraisal(form, &AppraisalContext::new(today())).is_ok());
  }

  #[test]
  fn not_graded_requires_reason() {
    let mut form = valid_form();
    form.officer_appraisal_grade_id = Some(grade::NOT_GRADED);
    form.non_grading_reason = Some("  ".into());
    let errors = validate_appraisal(form.clone(), &AppraisalContext::new(today())).unwrap_err();
    assert!(errors.has("non_grading_reason"));

    form.non_grading_reason = Some(" seconded abroad ".into());
    let details = validate_appraisal(form, &AppraisalContext::new(today())).unwrap();
    assert_eq!(details.non_grading_reason.as_deref(), Some("seconded abroad"));
  }

  #[test]
  fn disciplinary_action_requires_particulars() {
    let mut form = valid_form();
    form.has_disciplinary_action = true;
    let errors = validate_appraisal(form, &AppraisalContext::new(today())).unwrap_err();
    assert_eq!(
      errors.messages("disciplinary_action_particulars"),
      [
        "The particulars of disciplinary action field is required when disciplinary action is true."
      ]
    );
  }

  #[test]
  fn company_commander_implies_unit_commander() {
    let mut form = valid_form();
    form.has_company_commander = true;
    let errors = validate_appraisal(form.clone(), &AppraisalContext::new(today())).unwrap_err();
    assert_eq!(
      errors.messages("has_unit_commander"),
      ["The unit commander or SSO must be selected when the officer has a company commander."]
    );

    form.has_unit_commander = true;
    assert!(validate_appraisal(form, &AppraisalContext::new(today())).is_ok());
  }

  #[test]
  fn hidden_dependents_are_cleared_before_save() {
    let mut form = valid_form();
    form.has_company_commander_comments = true;
    form.has_company_commander_signature = true;
    form.disciplinary_action_particulars = Some("stale".into());

    let details = validate_appraisal(form, &AppraisalContext::new(today())).unwrap();
    assert!(!details.has_company_commander_comments);
    assert!(!details.has_company_commander_signature);
    assert_eq!(details.disciplinary_action_particulars, None);
  }

  #[test]
  fn overlapping_period_is_rejected() {
    let mut ctx = AppraisalContext::new(today());
    ctx.existing_periods =
      vec![AppraisalPeriod { id: 7, start_at: date(2023, 6, 1), end_at: date(2024, 1, 31) }];

    let errors = validate_appraisal(valid_form(), &ctx).unwrap_err();
    assert!(errors.has("appraisal_start_at"));

    // Editing record 7 itself is not a conflict.
    ctx.editing = Some(7);
    assert!(validate_appraisal(valid_form(), &ctx).is_ok());
  }

  #[test]
  fn serviceperson_must_be_an_officer() {
    let mut ctx = AppraisalContext::new(today());
    ctx.serviceperson_rank_id = Some(Rank::O1 - 1);
    assert!(validate_appraisal(valid_form(), &ctx).unwrap_err().has("serviceperson_number"));

    ctx.serviceperson_rank_id = None;
    assert!(validate_appraisal(valid_form(), &ctx).unwrap_err().has("serviceperson_number"));
  }

  #[test]
  fn unknown_grade_is_rejected() {
    let mut ctx = AppraisalContext::new(today());
    ctx.grade_exists = false;
    let errors = validate_appraisal(valid_form(), &ctx).unwrap_err();
    assert_eq!(
      errors.messages("officer_appraisal_grade_id"),
      ["The selected substantive rank grading is invalid."]
    );
  }

  #[test]
  fn metadata_name_rules() {
    let ok = validate_metadata(NewMetadataEntry::named("  Welfare "), false).unwrap();
    assert_eq!(ok.name, "Welfare");

    let errors = validate_metadata(NewMetadataEntry::named(""), false).unwrap_err();
    assert_eq!(errors.messages("name"), ["The name field is required."]);

    let errors = validate_metadata(NewMetadataEntry::named("x".repeat(256)), false).unwrap_err();
    assert!(errors.has("name"));

    let errors = validate_metadata(NewMetadataEntry::named("Welfare"), true).unwrap_err();
    assert_eq!(errors.messages("name"), ["The name has already been taken."]);
  }

  #[test]
  fn serviceperson_rules() {
    let input = NewServiceperson {
      number:             0,
      first_name:         " ".into(),
      middle_name:        None,
      last_name:          "Baptiste".into(),
      rank_id:            99,
      battalion_id:       None,
      enlistment_type_id: None,
      gender_id:          None,
    };
    let ctx = ServicepersonContext { rank_exists: false, ..Default::default() };
    let errors = validate_serviceperson(input, &ctx).unwrap_err();
    assert!(errors.has("number"));
    assert!(errors.has("first_name"));
    assert!(errors.has("rank_id"));
    assert!(!errors.has("last_name"));
  }

  #[test]
  fn user_rules() {
    let form = NewUserForm {
      username:       "clerk".into(),
      name:           "Orderly Room Clerk".into(),
      password:       "short".into(),
      is_super_admin: false,
      permissions:    ["view_any_serviceperson".to_owned(), "fly_plane".to_owned()].into(),
    };
    let errors = validate_user(&form, true).unwrap_err();
    assert!(errors.has("username"));
    assert!(errors.has("password"));
    assert_eq!(errors.messages("permissions"), ["Unknown permission \"fly_plane\"."]);
  }

  #[test]
  fn profile_name_change_needs_no_password() {
    let form = ProfileForm { name: "Adjutant".into(), ..Default::default() };
    assert!(validate_profile(&form, false).is_ok());

    let form = ProfileForm { name: " ".into(), password: Some(String::new()), ..Default::default() };
    assert_eq!(validate_profile(&form, false).unwrap_err().messages("name"), [
      "The name field is required."
    ]);
  }

  #[test]
  fn profile_password_change_rules() {
    let mut form = ProfileForm {
      name:                  "Adjutant".into(),
      current_password:      None,
      password:              Some("short".into()),
      password_confirmation: Some("shorter".into()),
    };
    let errors = validate_profile(&form, false).unwrap_err();
    assert_eq!(errors.messages("current_password"), ["The current password field is required."]);
    assert_eq!(errors.messages("password").len(), 2);

    form.current_password = Some("guess".into());
    form.password = Some("longenough".into());
    form.password_confirmation = Some("longenough".into());
    let errors = validate_profile(&form, false).unwrap_err();
    assert_eq!(errors.messages("current_password"), ["The password is incorrect."]);
    assert!(!errors.has("password"));

    assert!(validate_profile(&form, true).is_ok());
  }

  #[test]
  fn in_use_error_names_each_id() {
    let errors = metadata_in_use_error(MetadataKind::OfficerAppraisalGrade, "ids", &[3, 5]);
    assert_eq!(errors.messages("ids"), [
      "The officer appraisal grade 3 is still in use.",
      "The officer appraisal grade 5 is still in use.",
    ]);
    assert_eq!(overlap_error().first(), Some(OVERLAP_MESSAGE));
  }
}
