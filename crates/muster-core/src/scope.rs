//! Query scopes and table filters.
//!
//! Each completion scope is defined once here, with both its SQL predicate
//! (over the `a` alias of the appraisals table) and the equivalent in-memory
//! predicate, so the table filters and the derived status cannot drift apart.

use std::str::FromStr as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, appraisal::AppraisalDetails, organisation::Rank};

// ─── Completion scopes ───────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompletionScope {
  CompletedByCompanyCommander,
  CompletedByUnitCommander,
  CompletedByFormationCommander,
  HasDisciplinaryAction,
  Completed,
}

impl CompletionScope {
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name.trim()).map_err(|_| Error::UnknownScope(name.to_owned()))
  }

  /// SQL predicate over the appraisals table aliased as `a`.
  pub fn sql(self) -> &'static str {
    match self {
      Self::CompletedByCompanyCommander => {
        "(a.has_company_commander_comments = 1 AND a.has_company_commander_signature = 1)"
      }
      Self::CompletedByUnitCommander => {
        "(a.has_unit_commander_comments = 1 AND a.has_unit_commander_signature = 1)"
      }
      Self::CompletedByFormationCommander => {
        "(a.has_formation_commander_comments = 1 AND a.has_formation_commander_signature = 1)"
      }
      Self::HasDisciplinaryAction => "(a.has_disciplinary_action = 1)",
      Self::Completed => {
        "(a.is_appointment_correct = 1 \
          AND a.is_assessment_rubric_complete = 1 \
          AND (a.has_company_commander = 0 \
               OR (a.has_company_commander_comments = 1 AND a.has_company_commander_signature = 1)) \
          AND (a.has_unit_commander = 0 \
               OR (a.has_unit_commander_comments = 1 AND a.has_unit_commander_signature = 1)) \
          AND a.has_formation_commander_comments = 1 \
          AND a.has_formation_commander_signature = 1 \
          AND a.has_serviceperson_signature = 1)"
      }
    }
  }

  pub fn matches(self, d: &AppraisalDetails) -> bool {
    let company = d.has_company_commander_comments && d.has_company_commander_signature;
    let unit = d.has_unit_commander_comments && d.has_unit_commander_signature;
    let formation = d.has_formation_commander_comments && d.has_formation_commander_signature;

    match self {
      Self::CompletedByCompanyCommander => company,
      Self::CompletedByUnitCommander => unit,
      Self::CompletedByFormationCommander => formation,
      Self::HasDisciplinaryAction => d.has_disciplinary_action,
      Self::Completed => {
        d.is_appointment_correct
          && d.is_assessment_rubric_complete
          && (!d.has_company_commander || company)
          && (!d.has_unit_commander || unit)
          && formation
          && d.has_serviceperson_signature
      }
    }
  }
}

// ─── Soft deletes ────────────────────────────────────────────────────────────

/// Which rows to return with respect to soft deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trashed {
  /// Live rows only.
  #[default]
  Without,
  With,
  Only,
}

impl Trashed {
  /// SQL predicate on `<alias>.deleted_at`, or `None` when unrestricted.
  pub fn sql(self, alias: &str) -> Option<String> {
    match self {
      Self::Without => Some(format!("{alias}.deleted_at IS NULL")),
      Self::With => None,
      Self::Only => Some(format!("{alias}.deleted_at IS NOT NULL")),
    }
  }
}

// ─── Appraisal table query ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppraisalSort {
  #[default]
  Id,
  Number,
  StartAt,
  EndAt,
}

impl AppraisalSort {
  pub fn column(self) -> &'static str {
    match self {
      Self::Id => "a.id",
      Self::Number => "a.serviceperson_number",
      Self::StartAt => "a.appraisal_start_at",
      Self::EndAt => "a.appraisal_end_at",
    }
  }
}

/// Parameters for [`RecordStore::list_appraisals`](crate::store::RecordStore::list_appraisals).
#[derive(Debug, Clone, Default)]
pub struct AppraisalQuery {
  /// Matches serviceperson number or names; a four-digit year also matches
  /// the year of `appraisal_end_at`.
  pub search:             Option<String>,
  pub start_on_or_before: Option<NaiveDate>,
  pub end_on_or_before:   Option<NaiveDate>,
  pub grade_id:           Option<i64>,
  pub serviceperson:      Option<i64>,
  /// All listed scopes must match.
  pub scopes:             Vec<CompletionScope>,
  pub trashed:            Trashed,
  pub sort:               AppraisalSort,
  pub descending:         bool,
  pub limit:              Option<usize>,
  pub offset:             Option<usize>,
}

impl AppraisalQuery {
  /// The year the search text names, if it is a plain four-digit year.
  pub fn search_year(&self) -> Option<i32> {
    let text = self.search.as_deref()?.trim();
    if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
      text.parse().ok()
    } else {
      None
    }
  }
}

// ─── Serviceperson query ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ServicepersonQuery {
  /// Matches number, first name or last name.
  pub search:        Option<String>,
  /// Restrict to officers (`rank_id >= O1`).
  pub officers_only: bool,
  pub trashed:       Trashed,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

impl ServicepersonQuery {
  pub fn officers() -> Self { Self { officers_only: true, ..Self::default() } }
}

/// SQL predicate for the officer scope over the servicepeople alias `alias`.
pub fn officer_scope_sql(alias: &str) -> String {
  format!("{alias}.rank_id >= {}", Rank::O1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn search_year_requires_four_digits() {
    let q = |s: &str| AppraisalQuery { search: Some(s.into()), ..Default::default() };
    assert_eq!(q("2023").search_year(), Some(2023));
    assert_eq!(q(" 2021 ").search_year(), Some(2021));
    assert_eq!(q("123").search_year(), None);
    assert_eq!(q("Baptiste").search_year(), None);
    assert_eq!(AppraisalQuery::default().search_year(), None);
  }

  #[test]
  fn parse_scope_names() {
    assert_eq!(
      CompletionScope::parse("completed_by_unit_commander").unwrap(),
      CompletionScope::CompletedByUnitCommander
    );
    assert!(CompletionScope::parse("finished").is_err());
  }

  #[test]
  fn trashed_predicates() {
    assert_eq!(Trashed::Without.sql("a").as_deref(), Some("a.deleted_at IS NULL"));
    assert_eq!(Trashed::With.sql("a"), None);
    assert_eq!(Trashed::Only.sql("s").as_deref(), Some("s.deleted_at IS NOT NULL"));
  }
}
