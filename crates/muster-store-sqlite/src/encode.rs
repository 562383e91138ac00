//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`,
//! and permission sets as compact JSON arrays. Raw row structs are read inside
//! the connection closure and converted to domain types outside it.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use muster_core::{
  appraisal::{AppraisalChecklist, AppraisalDetails, AppraisalRow},
  metadata::MetadataEntry,
  serviceperson::{Serviceperson, ServicepersonRow, military_name},
  user::User,
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Permissions ─────────────────────────────────────────────────────────────

pub fn encode_permissions(p: &BTreeSet<String>) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_permissions(s: &str) -> Result<BTreeSet<String>> { Ok(serde_json::from_str(s)?) }

// ─── Metadata ────────────────────────────────────────────────────────────────

pub const METADATA_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

pub struct RawMetadata {
  pub id:          i64,
  pub name:        String,
  pub slug:        String,
  pub description: Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawMetadata {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      slug:        row.get(2)?,
      description: row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<MetadataEntry> {
    Ok(MetadataEntry {
      id:          self.id,
      name:        self.name,
      slug:        self.slug,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Servicepeople ───────────────────────────────────────────────────────────

pub const SERVICEPERSON_SELECT: &str = "
  SELECT s.number, s.first_name, s.middle_name, s.last_name, s.rank_id,
         s.battalion_id, s.enlistment_type_id, s.gender_id,
         s.created_at, s.updated_at, s.deleted_at,
         r.regiment_abbreviation, b.short_name
  FROM servicepeople s
  LEFT JOIN ranks      r ON r.id = s.rank_id
  LEFT JOIN battalions b ON b.id = s.battalion_id";

pub struct RawServiceperson {
  pub number:               i64,
  pub first_name:           String,
  pub middle_name:          Option<String>,
  pub last_name:            String,
  pub rank_id:              i64,
  pub battalion_id:         Option<i64>,
  pub enlistment_type_id:   Option<i64>,
  pub gender_id:            Option<i64>,
  pub created_at:           String,
  pub updated_at:           String,
  pub deleted_at:           Option<String>,
  pub rank_abbreviation:    Option<String>,
  pub battalion_short_name: Option<String>,
}

impl RawServiceperson {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      number:               row.get(0)?,
      first_name:           row.get(1)?,
      middle_name:          row.get(2)?,
      last_name:            row.get(3)?,
      rank_id:              row.get(4)?,
      battalion_id:         row.get(5)?,
      enlistment_type_id:   row.get(6)?,
      gender_id:            row.get(7)?,
      created_at:           row.get(8)?,
      updated_at:           row.get(9)?,
      deleted_at:           row.get(10)?,
      rank_abbreviation:    row.get(11)?,
      battalion_short_name: row.get(12)?,
    })
  }

  pub fn into_row(self) -> Result<ServicepersonRow> {
    let serviceperson = Serviceperson {
      number:             self.number,
      first_name:         self.first_name,
      middle_name:        self.middle_name,
      last_name:          self.last_name,
      rank_id:            self.rank_id,
      battalion_id:       self.battalion_id,
      enlistment_type_id: self.enlistment_type_id,
      gender_id:          self.gender_id,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
      deleted_at:         decode_opt_dt(self.deleted_at)?,
    };
    Ok(ServicepersonRow::new(serviceperson, self.rank_abbreviation, self.battalion_short_name))
  }
}

// ─── Appraisals ──────────────────────────────────────────────────────────────

pub const APPRAISAL_SELECT: &str = "
  SELECT a.id, a.serviceperson_number, a.appraisal_start_at, a.appraisal_end_at,
         a.battalion_id, a.rank_id,
         a.is_appointment_correct, a.is_assessment_rubric_complete,
         a.has_company_commander, a.has_company_commander_comments,
         a.has_company_commander_signature,
         a.officer_appraisal_grade_id, a.non_grading_reason,
         a.has_disciplinary_action, a.disciplinary_action_particulars,
         a.has_unit_commander, a.has_unit_commander_comments,
         a.has_unit_commander_signature,
         a.has_formation_commander_comments, a.has_formation_commander_signature,
         a.has_serviceperson_signature,
         a.created_at, a.updated_at, a.deleted_at,
         s.first_name, s.last_name, sr.regiment_abbreviation,
         b.short_name, g.name, r.regiment_abbreviation
  FROM officer_performance_appraisal_checklists a
  JOIN      servicepeople            s  ON s.number = a.serviceperson_number
  LEFT JOIN ranks                    sr ON sr.id    = s.rank_id
  LEFT JOIN battalions               b  ON b.id     = a.battalion_id
  LEFT JOIN officer_appraisal_grades g  ON g.id     = a.officer_appraisal_grade_id
  LEFT JOIN ranks                    r  ON r.id     = a.rank_id";

pub struct RawAppraisal {
  pub id:                     i64,
  pub details:                RawAppraisalDetails,
  pub created_at:             String,
  pub updated_at:             String,
  pub deleted_at:             Option<String>,
  pub first_name:             String,
  pub last_name:              String,
  pub serviceperson_rank:     Option<String>,
  pub battalion_short_name:   Option<String>,
  pub grade_name:             Option<String>,
  pub rank_abbreviation:      Option<String>,
}

/// The detail columns with dates still encoded.
pub struct RawAppraisalDetails {
  pub serviceperson_number:              i64,
  pub appraisal_start_at:                String,
  pub appraisal_end_at:                  String,
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

impl RawAppraisal {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      details:              RawAppraisalDetails {
        serviceperson_number:              row.get(1)?,
        appraisal_start_at:                row.get(2)?,
        appraisal_end_at:                  row.get(3)?,
        battalion_id:                      row.get(4)?,
        rank_id:                           row.get(5)?,
        is_appointment_correct:            row.get(6)?,
        is_assessment_rubric_complete:     row.get(7)?,
        has_company_commander:             row.get(8)?,
        has_company_commander_comments:    row.get(9)?,
        has_company_commander_signature:   row.get(10)?,
        officer_appraisal_grade_id:        row.get(11)?,
        non_grading_reason:                row.get(12)?,
        has_disciplinary_action:           row.get(13)?,
        disciplinary_action_particulars:   row.get(14)?,
        has_unit_commander:                row.get(15)?,
        has_unit_commander_comments:       row.get(16)?,
        has_unit_commander_signature:      row.get(17)?,
        has_formation_commander_comments:  row.get(18)?,
        has_formation_commander_signature: row.get(19)?,
        has_serviceperson_signature:       row.get(20)?,
      },
      created_at:           row.get(21)?,
      updated_at:           row.get(22)?,
      deleted_at:           row.get(23)?,
      first_name:           row.get(24)?,
      last_name:            row.get(25)?,
      serviceperson_rank:   row.get(26)?,
      battalion_short_name: row.get(27)?,
      grade_name:           row.get(28)?,
      rank_abbreviation:    row.get(29)?,
    })
  }

  pub fn into_row(self) -> Result<AppraisalRow> {
    let military_name =
      military_name(self.serviceperson_rank.as_deref(), &self.first_name, &self.last_name);
    let checklist = AppraisalChecklist {
      id:         self.id,
      details:    self.details.decode()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: decode_opt_dt(self.deleted_at)?,
    };
    let status = checklist.details.status();
    Ok(AppraisalRow {
      checklist,
      military_name,
      battalion_short_name: self.battalion_short_name,
      grade_name: self.grade_name,
      rank_abbreviation: self.rank_abbreviation,
      status,
    })
  }
}

impl RawAppraisalDetails {
  pub fn decode(self) -> Result<AppraisalDetails> {
    Ok(AppraisalDetails {
      serviceperson_number:              self.serviceperson_number,
      appraisal_start_at:                decode_date(&self.appraisal_start_at)?,
      appraisal_end_at:                  decode_date(&self.appraisal_end_at)?,
      battalion_id:                      self.battalion_id,
      rank_id:                           self.rank_id,
      is_appointment_correct:            self.is_appointment_correct,
      is_assessment_rubric_complete:     self.is_assessment_rubric_complete,
      has_company_commander:             self.has_company_commander,
      has_company_commander_comments:    self.has_company_commander_comments,
      has_company_commander_signature:   self.has_company_commander_signature,
      officer_appraisal_grade_id:        self.officer_appraisal_grade_id,
      non_grading_reason:                self.non_grading_reason,
      has_disciplinary_action:           self.has_disciplinary_action,
      disciplinary_action_particulars:   self.disciplinary_action_particulars,
      has_unit_commander:                self.has_unit_commander,
      has_unit_commander_comments:       self.has_unit_commander_comments,
      has_unit_commander_signature:      self.has_unit_commander_signature,
      has_formation_commander_comments:  self.has_formation_commander_comments,
      has_formation_commander_signature: self.has_formation_commander_signature,
      has_serviceperson_signature:       self.has_serviceperson_signature,
    })
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "id, username, name, password_hash, is_super_admin, permissions, created_at";

pub struct RawUser {
  pub id:             i64,
  pub username:       String,
  pub name:           String,
  pub password_hash:  String,
  pub is_super_admin: bool,
  pub permissions:    String,
  pub created_at:     String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      username:       row.get(1)?,
      name:           row.get(2)?,
      password_hash:  row.get(3)?,
      is_super_admin: row.get(4)?,
      permissions:    row.get(5)?,
      created_at:     row.get(6)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:             self.id,
      username:       self.username,
      name:           self.name,
      password_hash:  self.password_hash,
      is_super_admin: self.is_super_admin,
      permissions:    decode_permissions(&self.permissions)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
