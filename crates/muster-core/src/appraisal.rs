//! Officer performance appraisal checklists.
//!
//! An [`AppraisalForm`] is the unvalidated, partially-filled state a client
//! edits field by field. Validation turns it into [`AppraisalDetails`], the
//! payload the store persists as an [`AppraisalChecklist`].

use std::str::FromStr as _;

use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, scope::CompletionScope};

// ─── Fields ──────────────────────────────────────────────────────────────────

/// Every named field of the appraisal form.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
  ServicepersonNumber,
  AppraisalStartAt,
  AppraisalEndAt,
  BattalionId,
  RankId,
  IsAppointmentCorrect,
  IsAssessmentRubricComplete,
  HasCompanyCommander,
  HasCompanyCommanderComments,
  HasCompanyCommanderSignature,
  OfficerAppraisalGradeId,
  NonGradingReason,
  HasDisciplinaryAction,
  DisciplinaryActionParticulars,
  HasUnitCommander,
  HasUnitCommanderComments,
  HasUnitCommanderSignature,
  HasFormationCommanderComments,
  HasFormationCommanderSignature,
  HasServicepersonSignature,
}

/// The value type a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Flag,
  Id,
  Date,
  Text,
}

impl Field {
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownField(name.to_owned()))
  }

  pub fn name(self) -> &'static str { self.into() }

  pub fn kind(self) -> FieldKind {
    match self {
      Self::ServicepersonNumber
      | Self::BattalionId
      | Self::RankId
      | Self::OfficerAppraisalGradeId => FieldKind::Id,
      Self::AppraisalStartAt | Self::AppraisalEndAt => FieldKind::Date,
      Self::NonGradingReason | Self::DisciplinaryActionParticulars => FieldKind::Text,
      _ => FieldKind::Flag,
    }
  }

  /// Human-readable attribute name used in validation messages.
  pub fn label(self) -> String {
    let label = match self {
      Self::BattalionId => "unit location at appraisal period",
      Self::RankId => "substantive rank at appraisal period",
      Self::OfficerAppraisalGradeId => "substantive rank grading",
      Self::NonGradingReason => "reason for not grading",
      Self::HasDisciplinaryAction => "disciplinary action",
      Self::DisciplinaryActionParticulars => "particulars of disciplinary action",
      Self::HasUnitCommander => "unit commander or SSO",
      other => return other.name().replace('_', " "),
    };
    label.to_owned()
  }
}

/// A loosely-typed field value as posted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Null,
  Bool(bool),
  Integer(i64),
  Text(String),
}

// ─── Form state ──────────────────────────────────────────────────────────────

/// The editable state of an appraisal form. Missing keys deserialise to their
/// empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppraisalForm {
  pub serviceperson_number:              Option<i64>,
  pub appraisal_start_at:                Option<NaiveDate>,
  pub appraisal_end_at:                  Option<NaiveDate>,
  pub battalion_id:                      Option<i64>,
  pub rank_id:                           Option<i64>,
  pub is_appointment_correct:            bool,
  pub is_assessment_rubric_complete:     bool,
  pub has_company_commander:             bool,
  pub has_company_commander_comments:    bool,
  pub has_company_commander_signature:   bool,
  pub officer_appraisal_grade_id:        Option<i64>,
  pub non_grading_reason:                Option<String>,
  pub has_disciplinary_action:           bool,
  pub disciplinary_action_particulars:   Option<String>,
  pub has_unit_commander:                bool,
  pub has_unit_commander_comments:       bool,
  pub has_unit_commander_signature:      bool,
  pub has_formation_commander_comments:  bool,
  pub has_formation_commander_signature: bool,
  pub has_serviceperson_signature:       bool,
}

impl AppraisalForm {
  /// Current value of a flag field; `None` for non-flag fields.
  pub fn flag(&self, field: Field) -> Option<bool> {
    Some(match field {
      Field::IsAppointmentCorrect => self.is_appointment_correct,
      Field::IsAssessmentRubricComplete => self.is_assessment_rubric_complete,
      Field::HasCompanyCommander => self.has_company_commander,
      Field::HasCompanyCommanderComments => self.has_company_commander_comments,
      Field::HasCompanyCommanderSignature => self.has_company_commander_signature,
      Field::HasDisciplinaryAction => self.has_disciplinary_action,
      Field::HasUnitCommander => self.has_unit_commander,
      Field::HasUnitCommanderComments => self.has_unit_commander_comments,
      Field::HasUnitCommanderSignature => self.has_unit_commander_signature,
      Field::HasFormationCommanderComments => self.has_formation_commander_comments,
      Field::HasFormationCommanderSignature => self.has_formation_commander_signature,
      Field::HasServicepersonSignature => self.has_serviceperson_signature,
      _ => return None,
    })
  }

  fn flag_mut(&mut self, field: Field) -> Option<&mut bool> {
    Some(match field {
      Field::IsAppointmentCorrect => &mut self.is_appointment_correct,
      Field::IsAssessmentRubricComplete => &mut self.is_assessment_rubric_complete,
      Field::HasCompanyCommander => &mut self.has_company_commander,
      Field::HasCompanyCommanderComments => &mut self.has_company_commander_comments,
      Field::HasCompanyCommanderSignature => &mut self.has_company_commander_signature,
      Field::HasDisciplinaryAction => &mut self.has_disciplinary_action,
      Field::HasUnitCommander => &mut self.has_unit_commander,
      Field::HasUnitCommanderComments => &mut self.has_unit_commander_comments,
      Field::HasUnitCommanderSignature => &mut self.has_unit_commander_signature,
      Field::HasFormationCommanderComments => &mut self.has_formation_commander_comments,
      Field::HasFormationCommanderSignature => &mut self.has_formation_commander_signature,
      Field::HasServicepersonSignature => &mut self.has_serviceperson_signature,
      _ => return None,
    })
  }

  fn id_mut(&mut self, field: Field) -> Option<&mut Option<i64>> {
    Some(match field {
      Field::ServicepersonNumber => &mut self.serviceperson_number,
      Field::BattalionId => &mut self.battalion_id,
      Field::RankId => &mut self.rank_id,
      Field::OfficerAppraisalGradeId => &mut self.officer_appraisal_grade_id,
      _ => return None,
    })
  }

  fn date_mut(&mut self, field: Field) -> Option<&mut Option<NaiveDate>> {
    Some(match field {
      Field::AppraisalStartAt => &mut self.appraisal_start_at,
      Field::AppraisalEndAt => &mut self.appraisal_end_at,
      _ => return None,
    })
  }

  fn text_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
    Some(match field {
      Field::NonGradingReason => &mut self.non_grading_reason,
      Field::DisciplinaryActionParticulars => &mut self.disciplinary_action_particulars,
      _ => return None,
    })
  }

  /// Read any field as a [`FieldValue`].
  pub fn get(&self, field: Field) -> FieldValue {
    let id = |v: Option<i64>| v.map_or(FieldValue::Null, FieldValue::Integer);
    let date = |v: Option<NaiveDate>| {
      v.map_or(FieldValue::Null, |d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
    };
    let text = |v: &Option<String>| v.clone().map_or(FieldValue::Null, FieldValue::Text);

    match field {
      Field::ServicepersonNumber => id(self.serviceperson_number),
      Field::BattalionId => id(self.battalion_id),
      Field::RankId => id(self.rank_id),
      Field::OfficerAppraisalGradeId => id(self.officer_appraisal_grade_id),
      Field::AppraisalStartAt => date(self.appraisal_start_at),
      Field::AppraisalEndAt => date(self.appraisal_end_at),
      Field::NonGradingReason => text(&self.non_grading_reason),
      Field::DisciplinaryActionParticulars => text(&self.disciplinary_action_particulars),
      flag => self.flag(flag).map_or(FieldValue::Null, FieldValue::Bool),
    }
  }

  /// Write one field, coercing the loosely-typed value to the field's kind.
  ///
  /// `null` clears a field (flags clear to `false`). Id fields also accept
  /// numeric strings, as select inputs commonly post them.
  pub fn set(&mut self, field: Field, value: FieldValue) -> Result<()> {
    let type_error = |expected| Error::FieldType { field: field.name(), expected };

    match field.kind() {
      FieldKind::Flag => {
        let slot = self.flag_mut(field).ok_or_else(|| type_error("a boolean"))?;
        *slot = match value {
          FieldValue::Null => false,
          FieldValue::Bool(b) => b,
          _ => return Err(type_error("a boolean")),
        };
      }
      FieldKind::Id => {
        let slot = self.id_mut(field).ok_or_else(|| type_error("an integer id"))?;
        *slot = match value {
          FieldValue::Null => None,
          FieldValue::Integer(i) => Some(i),
          FieldValue::Text(s) if s.trim().is_empty() => None,
          FieldValue::Text(s) => Some(s.trim().parse().map_err(|_| type_error("an integer id"))?),
          FieldValue::Bool(_) => return Err(type_error("an integer id")),
        };
      }
      FieldKind::Date => {
        let slot = self.date_mut(field).ok_or_else(|| type_error("a date"))?;
        *slot = match value {
          FieldValue::Null => None,
          FieldValue::Text(s) if s.trim().is_empty() => None,
          FieldValue::Text(s) => Some(
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDate(s))?,
          ),
          _ => return Err(type_error("a date")),
        };
      }
      FieldKind::Text => {
        let slot = self.text_mut(field).ok_or_else(|| type_error("text"))?;
        *slot = match value {
          FieldValue::Null => None,
          FieldValue::Text(s) => Some(s),
          _ => return Err(type_error("text")),
        };
      }
    }
    Ok(())
  }

  /// Whether a field holds a usable value: text must be non-blank, flags
  /// count as filled when true.
  pub fn is_filled(&self, field: Field) -> bool {
    match self.get(field) {
      FieldValue::Null => false,
      FieldValue::Bool(b) => b,
      FieldValue::Integer(_) => true,
      FieldValue::Text(s) => !s.trim().is_empty(),
    }
  }

  /// Reset a field to its empty value. Returns `true` if anything changed.
  pub fn clear(&mut self, field: Field) -> bool {
    let before = self.get(field);
    let after = match field.kind() {
      FieldKind::Flag => FieldValue::Bool(false),
      _ => FieldValue::Null,
    };
    if before == after {
      return false;
    }
    // Clearing never fails: the value always matches the field kind.
    self.set(field, after).is_ok()
  }
}

impl From<AppraisalDetails> for AppraisalForm {
  fn from(d: AppraisalDetails) -> Self {
    Self {
      serviceperson_number:              Some(d.serviceperson_number),
      appraisal_start_at:                Some(d.appraisal_start_at),
      appraisal_end_at:                  Some(d.appraisal_end_at),
      battalion_id:                      d.battalion_id,
      rank_id:                           d.rank_id,
      is_appointment_correct:            d.is_appointment_correct,
      is_assessment_rubric_complete:     d.is_assessment_rubric_complete,
      has_company_commander:             d.has_company_commander,
      has_company_commander_comments:    d.has_company_commander_comments,
      has_company_commander_signature:   d.has_company_commander_signature,
      officer_appraisal_grade_id:        Some(d.officer_appraisal_grade_id),
      non_grading_reason:                d.non_grading_reason,
      has_disciplinary_action:           d.has_disciplinary_action,
      disciplinary_action_particulars:   d.disciplinary_action_particulars,
      has_unit_commander:                d.has_unit_commander,
      has_unit_commander_comments:       d.has_unit_commander_comments,
      has_unit_commander_signature:      d.has_unit_commander_signature,
      has_formation_commander_comments:  d.has_formation_commander_comments,
      has_formation_commander_signature: d.has_formation_commander_signature,
      has_serviceperson_signature:       d.has_serviceperson_signature,
    }
  }
}

// ─── Persisted record ────────────────────────────────────────────────────────

/// A validated appraisal, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalDetails {
  pub serviceperson_number:              i64,
  pub appraisal_start_at:                NaiveDate,
  pub appraisal_end_at:                  NaiveDate,
  pub battalion_id:                      Option<i64>,
  pub rank_id:                           Option<i64>,
  pub is_appointment_correct:            bool,
  pub is_assessment_rubric_complete:     bool,
  pub has_company_commander:             bool,
  pub has_company_commander_comments:    bool,
  pub has_company_commander_signature:   bool,
  pub officer_appraisal_grade_id:        i64,
  pub non_grading_reason:                Option<String>,
  pub has_disciplinary_action:           bool,
  pub disciplinary_action_particulars:   Option<String>,
  pub has_unit_commander:                bool,
  pub has_unit_commander_comments:       bool,
  pub has_unit_commander_signature:      bool,
  pub has_formation_commander_comments:  bool,
  pub has_formation_commander_signature: bool,
  pub has_serviceperson_signature:       bool,
}

impl AppraisalDetails {
  pub fn period(&self) -> (NaiveDate, NaiveDate) {
    (self.appraisal_start_at, self.appraisal_end_at)
  }

  pub fn status(&self) -> AppraisalStatus {
    if CompletionScope::Completed.matches(self) {
      AppraisalStatus::Complete
    } else {
      AppraisalStatus::Incomplete
    }
  }
}

/// A stored appraisal checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalChecklist {
  pub id:         i64,
  #[serde(flatten)]
  pub details:    AppraisalDetails,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub deleted_at: Option<DateTime<Utc>>,
}

/// Whether every required step of the checklist has been completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppraisalStatus {
  Complete,
  Incomplete,
}

impl AppraisalStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Complete => "complete",
      Self::Incomplete => "incomplete",
    }
  }
}

/// The date range of an existing appraisal, used by the overlap rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalPeriod {
  pub id:       i64,
  pub start_at: NaiveDate,
  pub end_at:   NaiveDate,
}

impl AppraisalPeriod {
  /// Inclusive overlap: periods sharing a single day overlap.
  pub fn overlaps(&self, start_at: NaiveDate, end_at: NaiveDate) -> bool {
    self.start_at <= end_at && start_at <= self.end_at
  }
}

/// Outcome of a store write that must keep at most one live appraisal per
/// serviceperson and period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodWrite<T> {
  Written(T),
  /// No row in the state the write applies to (missing, or trashed for an
  /// update, or live for a restore).
  Missing,
  /// A live appraisal of the same serviceperson already covers part of the
  /// period; nothing was written.
  Overlaps(AppraisalPeriod),
}

impl<T> PeriodWrite<T> {
  pub fn written(self) -> Option<T> {
    match self {
      Self::Written(value) => Some(value),
      _ => None,
    }
  }
}

/// An appraisal joined with its table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalRow {
  #[serde(flatten)]
  pub checklist:            AppraisalChecklist,
  pub military_name:        String,
  pub battalion_short_name: Option<String>,
  pub grade_name:           Option<String>,
  /// Abbreviation of the substantive rank recorded at grading.
  pub rank_abbreviation:    Option<String>,
  pub status:               AppraisalStatus,
}

/// A global search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
  pub id:      i64,
  pub title:   String,
  pub details: SearchDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDetails {
  #[serde(rename = "Year")]
  pub year:   i32,
  #[serde(rename = "Status")]
  pub status: AppraisalStatus,
}

impl From<&AppraisalRow> for SearchResult {
  fn from(row: &AppraisalRow) -> Self {
    Self {
      id:      row.checklist.id,
      title:   row.military_name.clone(),
      details: SearchDetails {
        year:   row.checklist.details.appraisal_end_at.year(),
        status: row.status,
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn every_field_is_addressable_by_name() {
    for field in Field::iter() {
      assert_eq!(Field::parse(field.name()).unwrap(), field);
    }
    assert!(matches!(Field::parse("rank"), Err(Error::UnknownField(_))));
  }

  #[test]
  fn set_coerces_values() {
    let mut form = AppraisalForm::default();
    form.set(Field::OfficerAppraisalGradeId, FieldValue::Text("6".into())).unwrap();
    assert_eq!(form.officer_appraisal_grade_id, Some(6));

    form.set(Field::AppraisalStartAt, FieldValue::Text("2023-01-01".into())).unwrap();
    assert_eq!(form.appraisal_start_at, NaiveDate::from_ymd_opt(2023, 1, 1));

    form.set(Field::HasCompanyCommander, FieldValue::Bool(true)).unwrap();
    assert!(form.has_company_commander);
    form.set(Field::HasCompanyCommander, FieldValue::Null).unwrap();
    assert!(!form.has_company_commander);
  }

  #[test]
  fn set_rejects_mismatched_kinds() {
    let mut form = AppraisalForm::default();
    assert!(matches!(
      form.set(Field::HasUnitCommander, FieldValue::Text("yes".into())),
      Err(Error::FieldType { .. })
    ));
    assert!(matches!(
      form.set(Field::AppraisalEndAt, FieldValue::Text("01/02/2023".into())),
      Err(Error::InvalidDate(_))
    ));
    assert!(form.set(Field::RankId, FieldValue::Bool(true)).is_err());
  }

  #[test]
  fn blank_text_is_not_filled() {
    let mut form = AppraisalForm::default();
    form.non_grading_reason = Some("   ".into());
    assert!(!form.is_filled(Field::NonGradingReason));
    form.non_grading_reason = Some("on course".into());
    assert!(form.is_filled(Field::NonGradingReason));
  }

  #[test]
  fn periods_overlap_inclusively() {
    let d = |m, day| NaiveDate::from_ymd_opt(2023, m, day).unwrap();
    let period = AppraisalPeriod { id: 1, start_at: d(1, 1), end_at: d(6, 30) };
    assert!(period.overlaps(d(6, 30), d(12, 31)));
    assert!(period.overlaps(d(2, 1), d(3, 1)));
    assert!(!period.overlaps(d(7, 1), d(12, 31)));
  }
}
