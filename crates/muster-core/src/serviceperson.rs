//! Servicepeople, the tracked military individuals that appraisals refer to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted serviceperson. The service `number` is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serviceperson {
  pub number:             i64,
  pub first_name:         String,
  pub middle_name:        Option<String>,
  pub last_name:          String,
  pub rank_id:            i64,
  pub battalion_id:       Option<i64>,
  pub enlistment_type_id: Option<i64>,
  pub gender_id:          Option<i64>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  pub deleted_at:         Option<DateTime<Utc>>,
}

impl Serviceperson {
  /// Display name used in selects, tables and search results:
  /// `"<rank abbreviation> <first name> <last name>"`.
  pub fn military_name(&self, rank_abbreviation: Option<&str>) -> String {
    military_name(rank_abbreviation, &self.first_name, &self.last_name)
  }

  pub fn is_trashed(&self) -> bool { self.deleted_at.is_some() }
}

pub fn military_name(
  rank_abbreviation: Option<&str>,
  first_name: &str,
  last_name: &str,
) -> String {
  match rank_abbreviation {
    Some(abbr) if !abbr.is_empty() => format!("{abbr} {first_name} {last_name}"),
    _ => format!("{first_name} {last_name}"),
  }
}

/// Input for creating or replacing a serviceperson. Also the row shape of the
/// JSON import file used by the seeder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServiceperson {
  pub number:             i64,
  pub first_name:         String,
  #[serde(default)]
  pub middle_name:        Option<String>,
  pub last_name:          String,
  pub rank_id:            i64,
  #[serde(default)]
  pub battalion_id:       Option<i64>,
  #[serde(default)]
  pub enlistment_type_id: Option<i64>,
  #[serde(default)]
  pub gender_id:          Option<i64>,
}

/// A serviceperson joined with the display columns the table shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicepersonRow {
  #[serde(flatten)]
  pub serviceperson:        Serviceperson,
  pub rank_abbreviation:    Option<String>,
  pub battalion_short_name: Option<String>,
  pub military_name:        String,
}

impl ServicepersonRow {
  pub fn new(
    serviceperson: Serviceperson,
    rank_abbreviation: Option<String>,
    battalion_short_name: Option<String>,
  ) -> Self {
    let military_name = serviceperson.military_name(rank_abbreviation.as_deref());
    Self { serviceperson, rank_abbreviation, battalion_short_name, military_name }
  }
}
