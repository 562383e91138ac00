//! Organisation lookups: ranks, formations and battalions (units).
//!
//! These tables are fixed at seed time; the API only reads them.

use serde::{Deserialize, Serialize};

/// A military rank. Ids are ordered by seniority, so "officer" is a simple
/// threshold on the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
  pub id:                    i64,
  pub name:                  String,
  pub regiment_abbreviation: String,
}

impl Rank {
  /// Id of the most junior commissioned rank (Second Lieutenant).
  pub const O1: i64 = 8;

  pub fn is_officer_rank(rank_id: i64) -> bool { rank_id >= Self::O1 }

  pub fn is_officer(&self) -> bool { Self::is_officer_rank(self.id) }
}

/// A formation groups battalions under one commander.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
  pub id:         i64,
  pub name:       String,
  pub short_name: String,
}

/// A unit. Appraisals record the battalion the officer served in during the
/// appraisal period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battalion {
  pub id:           i64,
  pub name:         String,
  pub short_name:   String,
  pub formation_id: Option<i64>,
}
