//! The `RecordStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `muster-store-sqlite`).
//! The API layer and the seeder depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  appraisal::{AppraisalChecklist, AppraisalDetails, AppraisalPeriod, AppraisalRow, PeriodWrite},
  metadata::{MetadataDelete, MetadataEntry, MetadataKind, NewMetadataEntry},
  organisation::{Battalion, Formation, Rank},
  scope::{AppraisalQuery, ServicepersonQuery},
  serviceperson::{NewServiceperson, Serviceperson, ServicepersonRow},
  user::{NewUser, User},
};

/// Abstraction over a Muster records backend.
///
/// Every write is atomic: a method either persists the whole record or
/// nothing. Validation happens before the store is called, but the
/// invariants that depend on other rows (one live appraisal per period,
/// lookups still in use) are re-checked by the store inside the write.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Metadata lookups ─────────────────────────────────────────────────

  fn list_metadata(
    &self,
    kind: MetadataKind,
  ) -> impl Future<Output = Result<Vec<MetadataEntry>, Self::Error>> + Send + '_;

  fn get_metadata(
    &self,
    kind: MetadataKind,
    id: i64,
  ) -> impl Future<Output = Result<Option<MetadataEntry>, Self::Error>> + Send + '_;

  fn find_metadata_by_slug(
    &self,
    kind: MetadataKind,
    slug: String,
  ) -> impl Future<Output = Result<Option<MetadataEntry>, Self::Error>> + Send + '_;

  fn create_metadata(
    &self,
    kind: MetadataKind,
    entry: NewMetadataEntry,
  ) -> impl Future<Output = Result<MetadataEntry, Self::Error>> + Send + '_;

  /// Replace name and description. Returns `None` if the row does not exist.
  fn update_metadata(
    &self,
    kind: MetadataKind,
    id: i64,
    entry: NewMetadataEntry,
  ) -> impl Future<Output = Result<Option<MetadataEntry>, Self::Error>> + Send + '_;

  /// Delete rows by id. Nothing is removed if any of them is still
  /// referenced.
  fn delete_metadata(
    &self,
    kind: MetadataKind,
    ids: Vec<i64>,
  ) -> impl Future<Output = Result<MetadataDelete, Self::Error>> + Send + '_;

  /// Insert a row with a fixed id unless that id or slug already exists.
  /// Returns `true` if a row was inserted.
  fn seed_metadata(
    &self,
    kind: MetadataKind,
    id: i64,
    entry: NewMetadataEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Organisation ─────────────────────────────────────────────────────

  fn list_ranks(&self) -> impl Future<Output = Result<Vec<Rank>, Self::Error>> + Send + '_;

  fn get_rank(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Rank>, Self::Error>> + Send + '_;

  fn seed_rank(&self, rank: Rank) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_formations(
    &self,
  ) -> impl Future<Output = Result<Vec<Formation>, Self::Error>> + Send + '_;

  fn seed_formation(
    &self,
    formation: Formation,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_battalions(
    &self,
  ) -> impl Future<Output = Result<Vec<Battalion>, Self::Error>> + Send + '_;

  fn get_battalion(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Battalion>, Self::Error>> + Send + '_;

  fn seed_battalion(
    &self,
    battalion: Battalion,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Servicepeople ────────────────────────────────────────────────────

  fn create_serviceperson(
    &self,
    input: NewServiceperson,
  ) -> impl Future<Output = Result<Serviceperson, Self::Error>> + Send + '_;

  /// Replace every editable column of `number`. The number itself is fixed.
  fn update_serviceperson(
    &self,
    number: i64,
    input: NewServiceperson,
  ) -> impl Future<Output = Result<Option<Serviceperson>, Self::Error>> + Send + '_;

  /// Fetch one serviceperson, trashed or not.
  fn get_serviceperson(
    &self,
    number: i64,
  ) -> impl Future<Output = Result<Option<ServicepersonRow>, Self::Error>> + Send + '_;

  fn list_servicepeople(
    &self,
    query: ServicepersonQuery,
  ) -> impl Future<Output = Result<Vec<ServicepersonRow>, Self::Error>> + Send + '_;

  /// Soft-delete. Returns `false` if the row is missing or already trashed.
  fn trash_serviceperson(
    &self,
    number: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn restore_serviceperson(
    &self,
    number: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Appraisals ───────────────────────────────────────────────────────

  /// Insert unless a live appraisal of the same serviceperson overlaps the
  /// period.
  fn create_appraisal(
    &self,
    details: AppraisalDetails,
  ) -> impl Future<Output = Result<PeriodWrite<AppraisalChecklist>, Self::Error>> + Send + '_;

  /// Replace a live appraisal unless another live one overlaps the new
  /// period. Trashed rows are [`PeriodWrite::Missing`].
  fn update_appraisal(
    &self,
    id: i64,
    details: AppraisalDetails,
  ) -> impl Future<Output = Result<PeriodWrite<AppraisalChecklist>, Self::Error>> + Send + '_;

  /// Fetch one appraisal row, trashed or not.
  fn get_appraisal(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<AppraisalRow>, Self::Error>> + Send + '_;

  fn list_appraisals(
    &self,
    query: AppraisalQuery,
  ) -> impl Future<Output = Result<Vec<AppraisalRow>, Self::Error>> + Send + '_;

  /// Live appraisals of `number` whose period overlaps `[start_at, end_at]`.
  fn overlapping_periods(
    &self,
    number: i64,
    start_at: NaiveDate,
    end_at: NaiveDate,
  ) -> impl Future<Output = Result<Vec<AppraisalPeriod>, Self::Error>> + Send + '_;

  /// Soft-delete every live row in `ids`; returns the number trashed.
  fn trash_appraisals(
    &self,
    ids: Vec<i64>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Un-trash a row unless a live appraisal now overlaps its period.
  fn restore_appraisal(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<PeriodWrite<()>, Self::Error>> + Send + '_;

  /// Permanently remove a row. Returns `false` if it did not exist.
  fn force_delete_appraisal(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Users ────────────────────────────────────────────────────────────

  fn create_user(
    &self,
    user: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(&self) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Change the display name and, when given, the password hash. Returns
  /// `None` if the user does not exist.
  fn update_user(
    &self,
    id: i64,
    name: String,
    password_hash: Option<String>,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;
}
