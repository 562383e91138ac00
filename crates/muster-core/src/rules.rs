//! Conditional visibility and requirement rules for the appraisal form.
//!
//! The dependency chain is a static table: each dependent field names the
//! gate that reveals it. A dependent is visible only while its gate holds and
//! the gate field is itself visible. When a gate stops holding, every field
//! below it is forced back to its empty value.
//!
//! [`RULES`] is ordered parents-before-children so a single forward pass
//! resolves the whole cascade.

use std::collections::BTreeSet;

use serde::Serialize;
use strum::IntoEnumIterator as _;

use crate::{
  Result,
  appraisal::{AppraisalForm, Field, FieldValue},
  metadata::grade,
};

// ─── Rule table ──────────────────────────────────────────────────────────────

/// The condition under which a dependent field is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
  /// The named flag is `true`.
  Flag(Field),
  /// The selected officer appraisal grade has this id.
  Grade(i64),
}

impl Gate {
  pub fn holds(self, form: &AppraisalForm) -> bool {
    match self {
      Self::Flag(field) => form.flag(field) == Some(true),
      Self::Grade(id) => form.officer_appraisal_grade_id == Some(id),
    }
  }

  /// The field this gate reads.
  pub fn source(self) -> Field {
    match self {
      Self::Flag(field) => field,
      Self::Grade(_) => Field::OfficerAppraisalGradeId,
    }
  }

  /// How the gate reads in a `required_if` message.
  fn describe(self) -> String {
    match self {
      Self::Flag(field) => format!("{} is true", field.label()),
      Self::Grade(_) => format!("{} is not graded", Field::OfficerAppraisalGradeId.label()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
  pub field:                 Field,
  pub gate:                  Gate,
  /// The field must be filled whenever it is visible.
  pub required_when_visible: bool,
}

const fn shown_when(field: Field, gate: Gate) -> FieldRule {
  FieldRule { field, gate, required_when_visible: false }
}

const fn required_when(field: Field, gate: Gate) -> FieldRule {
  FieldRule { field, gate, required_when_visible: true }
}

/// Every dependent field of the form, parents before children.
pub const RULES: &[FieldRule] = &[
  shown_when(Field::HasCompanyCommanderComments, Gate::Flag(Field::HasCompanyCommander)),
  shown_when(
    Field::HasCompanyCommanderSignature,
    Gate::Flag(Field::HasCompanyCommanderComments),
  ),
  shown_when(Field::HasUnitCommanderComments, Gate::Flag(Field::HasUnitCommander)),
  shown_when(Field::HasUnitCommanderSignature, Gate::Flag(Field::HasUnitCommanderComments)),
  shown_when(
    Field::HasFormationCommanderSignature,
    Gate::Flag(Field::HasFormationCommanderComments),
  ),
  required_when(Field::NonGradingReason, Gate::Grade(grade::NOT_GRADED)),
  required_when(
    Field::DisciplinaryActionParticulars,
    Gate::Flag(Field::HasDisciplinaryAction),
  ),
];

/// Fields required regardless of form state.
pub const ALWAYS_REQUIRED: &[Field] = &[
  Field::ServicepersonNumber,
  Field::AppraisalStartAt,
  Field::AppraisalEndAt,
  Field::OfficerAppraisalGradeId,
];

/// `field` must be `true` whenever `when` is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpliedFlag {
  pub field:       Field,
  pub when:        Field,
  /// What `when` means, for the error message.
  pub description: &'static str,
}

pub const IMPLIED_FLAGS: &[ImpliedFlag] = &[ImpliedFlag {
  field:       Field::HasUnitCommander,
  when:        Field::HasCompanyCommander,
  description: "company commander",
}];

pub fn rule_for(field: Field) -> Option<&'static FieldRule> {
  RULES.iter().find(|r| r.field == field)
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Whether `field` is currently shown.
pub fn is_visible(form: &AppraisalForm, field: Field) -> bool {
  match rule_for(field) {
    None => true,
    Some(rule) => rule.gate.holds(form) && is_visible(form, rule.gate.source()),
  }
}

/// Whether `field` must be filled for the form to save.
pub fn is_required(form: &AppraisalForm, field: Field) -> bool {
  if ALWAYS_REQUIRED.contains(&field) {
    return true;
  }
  rule_for(field).is_some_and(|r| r.required_when_visible) && is_visible(form, field)
}

/// The `required_if` message for a conditionally required field.
pub fn required_if_message(field: Field) -> Option<String> {
  let rule = rule_for(field)?;
  Some(format!(
    "The {} field is required when {}.",
    field.label(),
    rule.gate.describe()
  ))
}

/// A snapshot of which dependent fields are shown, which fields are required,
/// and which hidden fields still hold a value that saving would clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evaluation {
  pub visible:  BTreeSet<Field>,
  pub hidden:   BTreeSet<Field>,
  pub required: BTreeSet<Field>,
  pub reset:    BTreeSet<Field>,
}

pub fn evaluate(form: &AppraisalForm) -> Evaluation {
  let mut eval = Evaluation::default();

  for rule in RULES {
    if is_visible(form, rule.field) {
      eval.visible.insert(rule.field);
    } else {
      eval.hidden.insert(rule.field);
      if form.is_filled(rule.field) {
        eval.reset.insert(rule.field);
      }
    }
  }

  eval.required = Field::iter().filter(|f| is_required(form, *f)).collect();
  eval
}

// ─── Mutation ────────────────────────────────────────────────────────────────

/// Clear every hidden dependent, cascading down the chain. Returns the fields
/// that changed.
pub fn normalize(form: &mut AppraisalForm) -> Vec<Field> {
  let mut reset = Vec::new();
  for rule in RULES {
    if !is_visible(form, rule.field) && form.clear(rule.field) {
      reset.push(rule.field);
    }
  }
  reset
}

/// Set one field and cascade the consequences. Returns the fields that were
/// forced back to their empty value.
pub fn apply_change(
  form: &mut AppraisalForm,
  field: Field,
  value: FieldValue,
) -> Result<Vec<Field>> {
  form.set(field, value)?;
  let reset = normalize(form);
  if !reset.is_empty() {
    tracing::debug!(field = field.name(), ?reset, "cascaded form reset");
  }
  Ok(reset)
}
