//! Seed data and the seeder.
//!
//! Lookup tables are seeded with fixed ids so that well-known ids such as
//! [`grade::NOT_GRADED`] and [`Rank::O1`] hold in every deployment. Seeding is
//! idempotent: rows that already exist are skipped, so running it on every
//! start is safe.

use serde::Serialize;

use crate::{
  metadata::{MetadataKind, NewMetadataEntry, grade},
  organisation::{Battalion, Formation, Rank},
  serviceperson::NewServiceperson,
  store::RecordStore,
  user::NewUser,
  validation::{ServicepersonContext, validate_serviceperson},
};

// ─── Static data ─────────────────────────────────────────────────────────────

/// `(id, name, short_name)`
pub const FORMATIONS: &[(i64, &str, &str)] = &[(1, "Trinidad and Tobago Regiment", "TTR")];

/// `(id, name, short_name, formation_id)`
pub const BATTALIONS: &[(i64, &str, &str, i64)] = &[
  (1, "1st Infantry Battalion", "1 TTR", 1),
  (2, "2nd Infantry Battalion", "2 TTR", 1),
  (3, "Engineer Battalion", "Engr Bn", 1),
  (4, "Support and Service Battalion", "SS Bn", 1),
  (5, "Regiment Headquarters", "RHQ", 1),
];

/// `(id, name, regiment_abbreviation)`, most junior first.
pub const RANKS: &[(i64, &str, &str)] = &[
  (1, "Private", "Pte"),
  (2, "Lance Corporal", "LCpl"),
  (3, "Corporal", "Cpl"),
  (4, "Sergeant", "Sgt"),
  (5, "Staff Sergeant", "SSgt"),
  (6, "Warrant Officer Class II", "WO2"),
  (7, "Warrant Officer Class I", "WO1"),
  (Rank::O1, "Second Lieutenant", "2Lt"),
  (9, "Lieutenant", "Lt"),
  (10, "Captain", "Capt"),
  (11, "Major", "Maj"),
  (12, "Lieutenant Colonel", "Lt Col"),
  (13, "Colonel", "Col"),
  (14, "Brigadier", "Brig"),
];

pub const GENDERS: &[(i64, &str)] = &[(1, "male"), (2, "female")];

pub const ENLISTMENT_TYPES: &[(i64, &str)] = &[(1, "regular"), (2, "reserve")];

pub const OFFICER_APPRAISAL_GRADES: &[(i64, &str)] = &[
  (grade::EXCELLENT, "excellent"),
  (grade::VERY_GOOD, "very good"),
  (grade::GOOD, "good"),
  (grade::ADEQUATE, "adequate"),
  (grade::WEAK, "weak"),
  (grade::NOT_GRADED, "not graded"),
];

// ─── Options and report ──────────────────────────────────────────────────────

/// The super-user created on first seed.
#[derive(Debug, Clone)]
pub struct AdminSeed {
  pub username:      String,
  pub name:          String,
  pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
  pub admin:         Option<AdminSeed>,
  /// Servicepeople to import; existing numbers are skipped.
  pub servicepeople: Vec<NewServiceperson>,
}

/// Rows inserted by one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
  pub formations:       usize,
  pub battalions:       usize,
  pub ranks:            usize,
  pub genders:          usize,
  pub enlistment_types: usize,
  pub appraisal_grades: usize,
  pub servicepeople:    usize,
  pub admins:           usize,
}

impl SeedReport {
  pub fn total(&self) -> usize {
    self.formations
      + self.battalions
      + self.ranks
      + self.genders
      + self.enlistment_types
      + self.appraisal_grades
      + self.servicepeople
      + self.admins
  }
}

// ─── Seeders ─────────────────────────────────────────────────────────────────

/// Run every seeder in dependency order.
pub async fn run<S: RecordStore>(store: &S, options: &SeedOptions) -> Result<SeedReport, S::Error> {
  let mut report = SeedReport {
    formations: seed_formations(store).await?,
    battalions: seed_battalions(store).await?,
    ranks: seed_ranks(store).await?,
    genders: seed_lookup(store, MetadataKind::Gender, GENDERS).await?,
    enlistment_types: seed_lookup(store, MetadataKind::EnlistmentType, ENLISTMENT_TYPES).await?,
    appraisal_grades: seed_lookup(
      store,
      MetadataKind::OfficerAppraisalGrade,
      OFFICER_APPRAISAL_GRADES,
    )
    .await?,
    ..SeedReport::default()
  };

  report.servicepeople = import_servicepeople(store, &options.servicepeople).await?;

  if let Some(admin) = &options.admin {
    report.admins = seed_admin(store, admin).await?;
  }

  tracing::info!(inserted = report.total(), ?report, "seeding complete");
  Ok(report)
}

pub async fn seed_formations<S: RecordStore>(store: &S) -> Result<usize, S::Error> {
  let mut inserted = 0;
  for &(id, name, short_name) in FORMATIONS {
    let formation = Formation { id, name: name.to_owned(), short_name: short_name.to_owned() };
    inserted += usize::from(store.seed_formation(formation).await?);
  }
  Ok(inserted)
}

pub async fn seed_battalions<S: RecordStore>(store: &S) -> Result<usize, S::Error> {
  let mut inserted = 0;
  for &(id, name, short_name, formation_id) in BATTALIONS {
    let battalion = Battalion {
      id,
      name: name.to_owned(),
      short_name: short_name.to_owned(),
      formation_id: Some(formation_id),
    };
    inserted += usize::from(store.seed_battalion(battalion).await?);
  }
  Ok(inserted)
}

pub async fn seed_ranks<S: RecordStore>(store: &S) -> Result<usize, S::Error> {
  let mut inserted = 0;
  for &(id, name, abbreviation) in RANKS {
    let rank = Rank {
      id,
      name: name.to_owned(),
      regiment_abbreviation: abbreviation.to_owned(),
    };
    inserted += usize::from(store.seed_rank(rank).await?);
  }
  Ok(inserted)
}

pub async fn seed_lookup<S: RecordStore>(
  store: &S,
  kind: MetadataKind,
  rows: &[(i64, &str)],
) -> Result<usize, S::Error> {
  let mut inserted = 0;
  for &(id, name) in rows {
    inserted += usize::from(store.seed_metadata(kind, id, NewMetadataEntry::named(name)).await?);
  }
  Ok(inserted)
}

/// Import servicepeople, skipping numbers already on file and rows that fail
/// validation.
pub async fn import_servicepeople<S: RecordStore>(
  store: &S,
  rows: &[NewServiceperson],
) -> Result<usize, S::Error> {
  let mut inserted = 0;
  for row in rows {
    if store.get_serviceperson(row.number).await?.is_some() {
      continue;
    }
    let ctx = reference_context(store, row).await?;
    match validate_serviceperson(row.clone(), &ctx) {
      Ok(valid) => {
        store.create_serviceperson(valid).await?;
        inserted += 1;
      }
      Err(errors) => {
        tracing::warn!(number = row.number, ?errors, "skipping invalid serviceperson row");
      }
    }
  }
  Ok(inserted)
}

/// Look up every row `row` points at, so a bad reference is skipped instead
/// of failing the insert.
async fn reference_context<S: RecordStore>(
  store: &S,
  row: &NewServiceperson,
) -> Result<ServicepersonContext, S::Error> {
  let mut ctx = ServicepersonContext {
    rank_exists: store.get_rank(row.rank_id).await?.is_some(),
    ..ServicepersonContext::default()
  };
  if let Some(id) = row.battalion_id {
    ctx.battalion_exists = store.get_battalion(id).await?.is_some();
  }
  if let Some(id) = row.enlistment_type_id {
    ctx.enlistment_type_exists =
      store.get_metadata(MetadataKind::EnlistmentType, id).await?.is_some();
  }
  if let Some(id) = row.gender_id {
    ctx.gender_exists = store.get_metadata(MetadataKind::Gender, id).await?.is_some();
  }
  Ok(ctx)
}

pub async fn seed_admin<S: RecordStore>(store: &S, admin: &AdminSeed) -> Result<usize, S::Error> {
  if store.get_user_by_username(admin.username.clone()).await?.is_some() {
    return Ok(0);
  }
  store
    .create_user(NewUser {
      username:       admin.username.clone(),
      name:           admin.name.clone(),
      password_hash:  admin.password_hash.clone(),
      is_super_admin: true,
      permissions:    Default::default(),
    })
    .await?;
  tracing::info!(username = %admin.username, "created admin user");
  Ok(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn officer_ranks_start_at_o1() {
    let officers: Vec<_> = RANKS.iter().filter(|r| Rank::is_officer_rank(r.0)).collect();
    assert_eq!(officers.first().map(|r| r.2), Some("2Lt"));
    assert!(RANKS.windows(2).all(|w| w[0].0 < w[1].0));
  }

  #[test]
  fn not_graded_is_seeded_with_its_constant() {
    assert!(OFFICER_APPRAISAL_GRADES.contains(&(grade::NOT_GRADED, "not graded")));
  }
}
