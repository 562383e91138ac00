//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};

use muster_core::{
  appraisal::{AppraisalChecklist, AppraisalDetails, AppraisalPeriod, AppraisalRow, PeriodWrite},
  metadata::{MetadataDelete, MetadataEntry, MetadataKind, NewMetadataEntry},
  organisation::{Battalion, Formation, Rank},
  scope::{AppraisalQuery, ServicepersonQuery, officer_scope_sql},
  serviceperson::{NewServiceperson, Serviceperson, ServicepersonRow},
  store::RecordStore,
  user::{NewUser, User},
};

use crate::{
  Error, Result,
  encode::{
    APPRAISAL_SELECT, METADATA_COLUMNS, RawAppraisal, RawMetadata, RawServiceperson, RawUser,
    SERVICEPERSON_SELECT, USER_COLUMNS, decode_date, encode_date, encode_dt, encode_permissions,
  },
  schema::SCHEMA,
};

const DEFAULT_LIMIT: i64 = 100;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster records store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_servicepeople(&self, sql: String, params: Vec<Value>) -> Result<Vec<ServicepersonRow>> {
    let raws: Vec<RawServiceperson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawServiceperson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawServiceperson::into_row).collect()
  }

  async fn query_appraisals(&self, sql: String, params: Vec<Value>) -> Result<Vec<AppraisalRow>> {
    let raws: Vec<RawAppraisal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawAppraisal::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAppraisal::into_row).collect()
  }
}

/// The twenty detail columns, in the order [`APPRAISAL_DETAIL_COLUMNS`] lists them.
fn appraisal_values(d: &AppraisalDetails) -> Vec<Value> {
  vec![
    Value::Integer(d.serviceperson_number),
    Value::Text(encode_date(d.appraisal_start_at)),
    Value::Text(encode_date(d.appraisal_end_at)),
    d.battalion_id.map_or(Value::Null, Value::Integer),
    d.rank_id.map_or(Value::Null, Value::Integer),
    flag(d.is_appointment_correct),
    flag(d.is_assessment_rubric_complete),
    flag(d.has_company_commander),
    flag(d.has_company_commander_comments),
    flag(d.has_company_commander_signature),
    Value::Integer(d.officer_appraisal_grade_id),
    d.non_grading_reason.clone().map_or(Value::Null, Value::Text),
    flag(d.has_disciplinary_action),
    d.disciplinary_action_particulars.clone().map_or(Value::Null, Value::Text),
    flag(d.has_unit_commander),
    flag(d.has_unit_commander_comments),
    flag(d.has_unit_commander_signature),
    flag(d.has_formation_commander_comments),
    flag(d.has_formation_commander_signature),
    flag(d.has_serviceperson_signature),
  ]
}

const APPRAISAL_DETAIL_COLUMNS: [&str; 20] = [
  "serviceperson_number",
  "appraisal_start_at",
  "appraisal_end_at",
  "battalion_id",
  "rank_id",
  "is_appointment_correct",
  "is_assessment_rubric_complete",
  "has_company_commander",
  "has_company_commander_comments",
  "has_company_commander_signature",
  "officer_appraisal_grade_id",
  "non_grading_reason",
  "has_disciplinary_action",
  "disciplinary_action_particulars",
  "has_unit_commander",
  "has_unit_commander_comments",
  "has_unit_commander_signature",
  "has_formation_commander_comments",
  "has_formation_commander_signature",
  "has_serviceperson_signature",
];

fn flag(b: bool) -> Value { Value::Integer(i64::from(b)) }

/// `?, ?, …` with `n` placeholders.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

fn where_clause(conds: &[String]) -> String {
  if conds.is_empty() { String::new() } else { format!("WHERE {}", conds.join(" AND ")) }
}

/// SQLite reads a negative `LIMIT` as "no limit", so never let a count wrap.
fn sql_count(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn paging(limit: Option<usize>, offset: Option<usize>, params: &mut Vec<Value>) -> &'static str {
  params.push(Value::Integer(limit.map_or(DEFAULT_LIMIT, sql_count)));
  params.push(Value::Integer(offset.map_or(0, sql_count)));
  "LIMIT ? OFFSET ?"
}

/// `%text%` with the `LIKE` wildcards in `text` escaped; pair with
/// `ESCAPE '\'`.
fn like_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for ch in text.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(ch);
  }
  pattern.push('%');
  pattern
}

/// Tables and columns holding foreign keys into each lookup table.
fn metadata_references(kind: MetadataKind) -> &'static [(&'static str, &'static str)] {
  match kind {
    MetadataKind::InterviewReason => &[],
    MetadataKind::OfficerAppraisalGrade => {
      &[("officer_performance_appraisal_checklists", "officer_appraisal_grade_id")]
    }
    MetadataKind::EnlistmentType => &[("servicepeople", "enlistment_type_id")],
    MetadataKind::Gender => &[("servicepeople", "gender_id")],
  }
}

// ─── Appraisal period guard ──────────────────────────────────────────────────

/// Live appraisals of `?1` overlapping `[?2, ?3]` (inclusive), other than `?4`.
const OVERLAP_SQL: &str = "
  SELECT id, appraisal_start_at, appraisal_end_at
  FROM officer_performance_appraisal_checklists
  WHERE serviceperson_number = ?1
    AND deleted_at IS NULL
    AND appraisal_start_at <= ?3
    AND appraisal_end_at   >= ?2
    AND (?4 IS NULL OR id <> ?4)
  ORDER BY appraisal_start_at";

/// `(id, start, end)` as stored.
type RawPeriod = (i64, String, String);

fn first_overlap(
  conn: &rusqlite::Connection,
  number: i64,
  start: &str,
  end: &str,
  except: Option<i64>,
) -> rusqlite::Result<Option<RawPeriod>> {
  conn
    .query_row(
      &format!("{OVERLAP_SQL} LIMIT 1"),
      rusqlite::params![number, start, end, except],
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
}

fn decode_period((id, start, end): RawPeriod) -> Result<AppraisalPeriod> {
  Ok(AppraisalPeriod { id, start_at: decode_date(&start)?, end_at: decode_date(&end)? })
}

/// What a guarded write did inside its transaction.
enum Guarded<T> {
  Done(T),
  Missing,
  Overlaps(RawPeriod),
}

impl<T> Guarded<T> {
  /// Convert a refused write; `Done` is the caller's to handle.
  fn refused<U>(self) -> Result<PeriodWrite<U>> {
    match self {
      Self::Overlaps(raw) => Ok(PeriodWrite::Overlaps(decode_period(raw)?)),
      Self::Done(_) | Self::Missing => Ok(PeriodWrite::Missing),
    }
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Metadata ──────────────────────────────────────────────────────────────

  async fn list_metadata(&self, kind: MetadataKind) -> Result<Vec<MetadataEntry>> {
    let sql = format!("SELECT {METADATA_COLUMNS} FROM {} ORDER BY id", kind.table());

    let raws: Vec<RawMetadata> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawMetadata::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetadata::into_entry).collect()
  }

  async fn get_metadata(&self, kind: MetadataKind, id: i64) -> Result<Option<MetadataEntry>> {
    let sql = format!("SELECT {METADATA_COLUMNS} FROM {} WHERE id = ?1", kind.table());

    let raw: Option<RawMetadata> = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params![id], RawMetadata::from_row).optional()?)
      })
      .await?;

    raw.map(RawMetadata::into_entry).transpose()
  }

  async fn find_metadata_by_slug(
    &self,
    kind: MetadataKind,
    slug: String,
  ) -> Result<Option<MetadataEntry>> {
    let sql = format!("SELECT {METADATA_COLUMNS} FROM {} WHERE slug = ?1", kind.table());

    let raw: Option<RawMetadata> = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params![slug], RawMetadata::from_row).optional()?)
      })
      .await?;

    raw.map(RawMetadata::into_entry).transpose()
  }

  async fn create_metadata(
    &self,
    kind: MetadataKind,
    entry: NewMetadataEntry,
  ) -> Result<MetadataEntry> {
    let now = Utc::now();
    let slug = entry.slug();
    let (name, description) = (entry.name.clone(), entry.description.clone());
    let now_str = encode_dt(now);
    let sql = format!(
      "INSERT INTO {} (name, slug, description, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?4)",
      kind.table()
    );

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(&sql, rusqlite::params![name, slug, description, now_str])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(MetadataEntry {
      id,
      slug: entry.slug(),
      name: entry.name,
      description: entry.description,
      created_at: now,
      updated_at: now,
    })
  }

  async fn update_metadata(
    &self,
    kind: MetadataKind,
    id: i64,
    entry: NewMetadataEntry,
  ) -> Result<Option<MetadataEntry>> {
    let slug = entry.slug();
    let now_str = encode_dt(Utc::now());
    let sql = format!(
      "UPDATE {} SET name = ?1, slug = ?2, description = ?3, updated_at = ?4 WHERE id = ?5",
      kind.table()
    );

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(&sql, rusqlite::params![entry.name, slug, entry.description, now_str, id])?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_metadata(kind, id).await
  }

  async fn delete_metadata(&self, kind: MetadataKind, ids: Vec<i64>) -> Result<MetadataDelete> {
    if ids.is_empty() {
      return Ok(MetadataDelete::Deleted(0));
    }
    let marks = placeholders(ids.len());
    let sql = format!("DELETE FROM {} WHERE id IN ({marks})", kind.table());
    let references = metadata_references(kind);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut in_use = Vec::new();
        for (table, column) in references {
          let mut stmt = tx.prepare(&format!(
            "SELECT DISTINCT {column} FROM {table} WHERE {column} IN ({marks})"
          ))?;
          let used = stmt
            .query_map(rusqlite::params_from_iter(&ids), |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          in_use.extend(used);
        }
        if !in_use.is_empty() {
          in_use.sort_unstable();
          in_use.dedup();
          return Ok(MetadataDelete::InUse(in_use));
        }

        let n = tx.execute(&sql, rusqlite::params_from_iter(&ids))?;
        tx.commit()?;
        Ok(MetadataDelete::Deleted(n))
      })
      .await?;

    match &outcome {
      MetadataDelete::Deleted(removed) => {
        tracing::debug!(table = kind.table(), removed, "deleted metadata");
      }
      MetadataDelete::InUse(ids) => {
        tracing::debug!(table = kind.table(), ?ids, "metadata still referenced");
      }
    }
    Ok(outcome)
  }

  async fn seed_metadata(
    &self,
    kind: MetadataKind,
    id: i64,
    entry: NewMetadataEntry,
  ) -> Result<bool> {
    let slug = entry.slug();
    let now_str = encode_dt(Utc::now());
    let sql = format!(
      "INSERT OR IGNORE INTO {} (id, name, slug, description, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      kind.table()
    );

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(&sql, rusqlite::params![id, entry.name, slug, entry.description, now_str])?)
      })
      .await?;

    Ok(inserted == 1)
  }

  // ── Organisation ──────────────────────────────────────────────────────────

  async fn list_ranks(&self) -> Result<Vec<Rank>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt =
            conn.prepare("SELECT id, name, regiment_abbreviation FROM ranks ORDER BY id")?;
          let rows = stmt
            .query_map([], |row| {
              Ok(Rank { id: row.get(0)?, name: row.get(1)?, regiment_abbreviation: row.get(2)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn get_rank(&self, id: i64) -> Result<Option<Rank>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT id, name, regiment_abbreviation FROM ranks WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                  Ok(Rank {
                    id:                    row.get(0)?,
                    name:                  row.get(1)?,
                    regiment_abbreviation: row.get(2)?,
                  })
                },
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn seed_rank(&self, rank: Rank) -> Result<bool> {
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO ranks (id, name, regiment_abbreviation) VALUES (?1, ?2, ?3)",
          rusqlite::params![rank.id, rank.name, rank.regiment_abbreviation],
        )?)
      })
      .await?;
    Ok(inserted == 1)
  }

  async fn list_formations(&self) -> Result<Vec<Formation>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare("SELECT id, name, short_name FROM formations ORDER BY id")?;
          let rows = stmt
            .query_map([], |row| {
              Ok(Formation { id: row.get(0)?, name: row.get(1)?, short_name: row.get(2)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn seed_formation(&self, formation: Formation) -> Result<bool> {
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO formations (id, name, short_name) VALUES (?1, ?2, ?3)",
          rusqlite::params![formation.id, formation.name, formation.short_name],
        )?)
      })
      .await?;
    Ok(inserted == 1)
  }

  async fn list_battalions(&self) -> Result<Vec<Battalion>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn
            .prepare("SELECT id, name, short_name, formation_id FROM battalions ORDER BY id")?;
          let rows = stmt
            .query_map([], |row| {
              Ok(Battalion {
                id:           row.get(0)?,
                name:         row.get(1)?,
                short_name:   row.get(2)?,
                formation_id: row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn get_battalion(&self, id: i64) -> Result<Option<Battalion>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT id, name, short_name, formation_id FROM battalions WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                  Ok(Battalion {
                    id:           row.get(0)?,
                    name:         row.get(1)?,
                    short_name:   row.get(2)?,
                    formation_id: row.get(3)?,
                  })
                },
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn seed_battalion(&self, battalion: Battalion) -> Result<bool> {
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO battalions (id, name, short_name, formation_id)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            battalion.id,
            battalion.name,
            battalion.short_name,
            battalion.formation_id
          ],
        )?)
      })
      .await?;
    Ok(inserted == 1)
  }

  // ── Servicepeople ─────────────────────────────────────────────────────────

  async fn create_serviceperson(&self, input: NewServiceperson) -> Result<Serviceperson> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let row = input.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO servicepeople
             (number, first_name, middle_name, last_name, rank_id, battalion_id,
              enlistment_type_id, gender_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            row.number,
            row.first_name,
            row.middle_name,
            row.last_name,
            row.rank_id,
            row.battalion_id,
            row.enlistment_type_id,
            row.gender_id,
            now_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(Serviceperson {
      number:             input.number,
      first_name:         input.first_name,
      middle_name:        input.middle_name,
      last_name:          input.last_name,
      rank_id:            input.rank_id,
      battalion_id:       input.battalion_id,
      enlistment_type_id: input.enlistment_type_id,
      gender_id:          input.gender_id,
      created_at:         now,
      updated_at:         now,
      deleted_at:         None,
    })
  }

  async fn update_serviceperson(
    &self,
    number: i64,
    input: NewServiceperson,
  ) -> Result<Option<Serviceperson>> {
    let now_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE servicepeople
           SET first_name = ?1, middle_name = ?2, last_name = ?3, rank_id = ?4,
               battalion_id = ?5, enlistment_type_id = ?6, gender_id = ?7, updated_at = ?8
           WHERE number = ?9",
          rusqlite::params![
            input.first_name,
            input.middle_name,
            input.last_name,
            input.rank_id,
            input.battalion_id,
            input.enlistment_type_id,
            input.gender_id,
            now_str,
            number,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    Ok(self.get_serviceperson(number).await?.map(|row| row.serviceperson))
  }

  async fn get_serviceperson(&self, number: i64) -> Result<Option<ServicepersonRow>> {
    let sql = format!("{SERVICEPERSON_SELECT} WHERE s.number = ?");
    let rows = self.query_servicepeople(sql, vec![Value::Integer(number)]).await?;
    Ok(rows.into_iter().next())
  }

  async fn list_servicepeople(&self, query: ServicepersonQuery) -> Result<Vec<ServicepersonRow>> {
    let mut conds = Vec::new();
    let mut params = Vec::new();

    if let Some(text) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      conds.push(
        "(CAST(s.number AS TEXT) LIKE ? ESCAPE '\\' OR s.first_name LIKE ? ESCAPE '\\' \
         OR s.last_name LIKE ? ESCAPE '\\')"
          .to_owned(),
      );
      let pattern = like_pattern(text);
      params.extend(std::iter::repeat_n(Value::Text(pattern), 3));
    }
    if query.officers_only {
      conds.push(officer_scope_sql("s"));
    }
    conds.extend(query.trashed.sql("s"));

    let page = paging(query.limit, query.offset, &mut params);
    let sql = format!("{SERVICEPERSON_SELECT} {} ORDER BY s.number {page}", where_clause(&conds));
    self.query_servicepeople(sql, params).await
  }

  async fn trash_serviceperson(&self, number: i64) -> Result<bool> {
    let now_str = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE servicepeople SET deleted_at = ?1, updated_at = ?1
           WHERE number = ?2 AND deleted_at IS NULL",
          rusqlite::params![now_str, number],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn restore_serviceperson(&self, number: i64) -> Result<bool> {
    let now_str = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE servicepeople SET deleted_at = NULL, updated_at = ?1
           WHERE number = ?2 AND deleted_at IS NOT NULL",
          rusqlite::params![now_str, number],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  // ── Appraisals ────────────────────────────────────────────────────────────

  async fn create_appraisal(
    &self,
    details: AppraisalDetails,
  ) -> Result<PeriodWrite<AppraisalChecklist>> {
    let now = Utc::now();
    let mut params = appraisal_values(&details);
    params.push(Value::Text(encode_dt(now)));
    params.push(Value::Text(encode_dt(now)));
    let sql = format!(
      "INSERT INTO officer_performance_appraisal_checklists ({}, created_at, updated_at)
       VALUES ({})",
      APPRAISAL_DETAIL_COLUMNS.join(", "),
      placeholders(APPRAISAL_DETAIL_COLUMNS.len() + 2),
    );

    let number = details.serviceperson_number;
    let (start_at, end_at) = details.period();
    let (start, end) = (encode_date(start_at), encode_date(end_at));

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(raw) = first_overlap(&tx, number, &start, &end, None)? {
          return Ok(Guarded::Overlaps(raw));
        }
        tx.execute(&sql, rusqlite::params_from_iter(params))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Guarded::Done(id))
      })
      .await?;

    let id = match outcome {
      Guarded::Done(id) => id,
      refused => {
        tracing::debug!(number, "appraisal period already covered");
        return refused.refused();
      }
    };
    tracing::debug!(id, number, "created appraisal");
    Ok(PeriodWrite::Written(AppraisalChecklist {
      id,
      details,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }))
  }

  async fn update_appraisal(
    &self,
    id: i64,
    details: AppraisalDetails,
  ) -> Result<PeriodWrite<AppraisalChecklist>> {
    let number = details.serviceperson_number;
    let (start_at, end_at) = details.period();
    let (start, end) = (encode_date(start_at), encode_date(end_at));
    let mut params = appraisal_values(&details);
    params.push(Value::Text(encode_dt(Utc::now())));
    params.push(Value::Integer(id));
    let assignments: Vec<String> =
      APPRAISAL_DETAIL_COLUMNS.iter().map(|c| format!("{c} = ?")).collect();
    let sql = format!(
      "UPDATE officer_performance_appraisal_checklists SET {}, updated_at = ?
       WHERE id = ? AND deleted_at IS NULL",
      assignments.join(", "),
    );

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let live: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM officer_performance_appraisal_checklists
                          WHERE id = ?1 AND deleted_at IS NULL)",
          rusqlite::params![id],
          |row| row.get(0),
        )?;
        if !live {
          return Ok(Guarded::Missing);
        }
        if let Some(raw) = first_overlap(&tx, number, &start, &end, Some(id))? {
          return Ok(Guarded::Overlaps(raw));
        }
        tx.execute(&sql, rusqlite::params_from_iter(params))?;
        tx.commit()?;
        Ok(Guarded::Done(()))
      })
      .await?;

    if !matches!(outcome, Guarded::Done(())) {
      return outcome.refused();
    }
    Ok(
      self
        .get_appraisal(id)
        .await?
        .map_or(PeriodWrite::Missing, |row| PeriodWrite::Written(row.checklist)),
    )
  }

  async fn get_appraisal(&self, id: i64) -> Result<Option<AppraisalRow>> {
    let sql = format!("{APPRAISAL_SELECT} WHERE a.id = ?");
    let rows = self.query_appraisals(sql, vec![Value::Integer(id)]).await?;
    Ok(rows.into_iter().next())
  }

  async fn list_appraisals(&self, query: AppraisalQuery) -> Result<Vec<AppraisalRow>> {
    let mut conds = Vec::new();
    let mut params = Vec::new();

    if let Some(text) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      let pattern = like_pattern(text);
      let mut any = vec![
        "CAST(a.serviceperson_number AS TEXT) LIKE ? ESCAPE '\\'",
        "s.first_name LIKE ? ESCAPE '\\'",
        "s.last_name LIKE ? ESCAPE '\\'",
      ];
      params.extend(std::iter::repeat_n(Value::Text(pattern), 3));
      if let Some(year) = query.search_year() {
        any.push("strftime('%Y', a.appraisal_end_at) = ?");
        params.push(Value::Text(format!("{year:04}")));
      }
      conds.push(format!("({})", any.join(" OR ")));
    }
    if let Some(date) = query.start_on_or_before {
      conds.push("a.appraisal_start_at <= ?".to_owned());
      params.push(Value::Text(encode_date(date)));
    }
    if let Some(date) = query.end_on_or_before {
      conds.push("a.appraisal_end_at <= ?".to_owned());
      params.push(Value::Text(encode_date(date)));
    }
    if let Some(grade_id) = query.grade_id {
      conds.push("a.officer_appraisal_grade_id = ?".to_owned());
      params.push(Value::Integer(grade_id));
    }
    if let Some(number) = query.serviceperson {
      conds.push("a.serviceperson_number = ?".to_owned());
      params.push(Value::Integer(number));
    }
    conds.extend(query.scopes.iter().map(|scope| scope.sql().to_owned()));
    conds.extend(query.trashed.sql("a"));

    let direction = if query.descending { "DESC" } else { "ASC" };
    let page = paging(query.limit, query.offset, &mut params);
    let sql = format!(
      "{APPRAISAL_SELECT} {} ORDER BY {} {direction}, a.id {direction} {page}",
      where_clause(&conds),
      query.sort.column(),
    );
    self.query_appraisals(sql, params).await
  }

  async fn overlapping_periods(
    &self,
    number: i64,
    start_at: NaiveDate,
    end_at: NaiveDate,
  ) -> Result<Vec<AppraisalPeriod>> {
    let (start_str, end_str) = (encode_date(start_at), encode_date(end_at));

    let raws: Vec<RawPeriod> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(OVERLAP_SQL)?;
        let rows = stmt
          .query_map(rusqlite::params![number, start_str, end_str, None::<i64>], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(decode_period).collect()
  }

  async fn trash_appraisals(&self, ids: Vec<i64>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let sql = format!(
      "UPDATE officer_performance_appraisal_checklists
       SET deleted_at = ?, updated_at = ?
       WHERE deleted_at IS NULL AND id IN ({})",
      placeholders(ids.len()),
    );
    let now_str = encode_dt(Utc::now());
    let params: Vec<Value> = [Value::Text(now_str.clone()), Value::Text(now_str)]
      .into_iter()
      .chain(ids.into_iter().map(Value::Integer))
      .collect();

    let trashed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = tx.execute(&sql, rusqlite::params_from_iter(params))?;
        tx.commit()?;
        Ok(n)
      })
      .await?;
    Ok(trashed)
  }

  async fn restore_appraisal(&self, id: i64) -> Result<PeriodWrite<()>> {
    let now_str = encode_dt(Utc::now());
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let trashed: Option<(i64, String, String)> = tx
          .query_row(
            "SELECT serviceperson_number, appraisal_start_at, appraisal_end_at
             FROM officer_performance_appraisal_checklists
             WHERE id = ?1 AND deleted_at IS NOT NULL",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;
        let Some((number, start, end)) = trashed else {
          return Ok(Guarded::Missing);
        };
        if let Some(raw) = first_overlap(&tx, number, &start, &end, Some(id))? {
          return Ok(Guarded::Overlaps(raw));
        }
        tx.execute(
          "UPDATE officer_performance_appraisal_checklists
           SET deleted_at = NULL, updated_at = ?1
           WHERE id = ?2",
          rusqlite::params![now_str, id],
        )?;
        tx.commit()?;
        Ok(Guarded::Done(()))
      })
      .await?;

    match outcome {
      Guarded::Done(()) => Ok(PeriodWrite::Written(())),
      refused => refused.refused(),
    }
  }

  async fn force_delete_appraisal(&self, id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM officer_performance_appraisal_checklists WHERE id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(removed == 1)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, user: NewUser) -> Result<User> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let permissions = encode_permissions(&user.permissions)?;
    let (username, name, hash) =
      (user.username.clone(), user.name.clone(), user.password_hash.clone());
    let is_super_admin = user.is_super_admin;

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (username, name, password_hash, is_super_admin, permissions, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![username, name, hash, is_super_admin, permissions, now_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(User {
      id,
      username: user.username,
      name: user.name,
      password_hash: user.password_hash,
      is_super_admin,
      permissions: user.permissions,
      created_at: now,
    })
  }

  async fn get_user_by_username(&self, username: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
              rusqlite::params![username],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn update_user(
    &self,
    id: i64,
    name: String,
    password_hash: Option<String>,
  ) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE users SET name = ?1, password_hash = COALESCE(?2, password_hash) WHERE id = ?3",
          rusqlite::params![name, password_hash, id],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
              rusqlite::params![id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}
