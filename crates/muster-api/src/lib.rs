//! JSON REST API for Muster.
//!
//! Exposes an axum [`Router`] backed by any [`muster_core::store::RecordStore`].
//! Every route authenticates with HTTP Basic credentials checked against the
//! `users` table, then applies the resource policy. TLS and tracing layers are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", muster_api::api_router(store.clone()))
//! ```

pub mod appraisals;
pub mod auth;
pub mod error;
pub mod metadata;
pub mod organisation;
pub mod search;
pub mod servicepeople;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use muster_core::store::RecordStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RecordStore + 'static,
{
  Router::new()
    // Metadata lookups
    .route("/metadata/{kind}", get(metadata::list::<S>).post(metadata::create::<S>))
    .route("/metadata/{kind}/bulk-delete", post(metadata::bulk_delete::<S>))
    .route(
      "/metadata/{kind}/{id}",
      get(metadata::get_one::<S>)
        .put(metadata::update::<S>)
        .delete(metadata::delete_one::<S>),
    )
    // Organisation
    .route("/ranks", get(organisation::ranks::<S>))
    .route("/battalions", get(organisation::battalions::<S>))
    .route("/formations", get(organisation::formations::<S>))
    // Servicepeople
    .route("/servicepeople", get(servicepeople::list::<S>).post(servicepeople::create::<S>))
    .route("/officers", get(servicepeople::officers::<S>))
    .route(
      "/servicepeople/{number}",
      get(servicepeople::get_one::<S>)
        .put(servicepeople::update::<S>)
        .delete(servicepeople::delete_one::<S>),
    )
    .route("/servicepeople/{number}/restore", post(servicepeople::restore::<S>))
    // Appraisals
    .route("/appraisals", get(appraisals::list::<S>).post(appraisals::create::<S>))
    .route("/appraisals/form-state", post(appraisals::form_state::<S>))
    .route("/appraisals/bulk-delete", post(appraisals::bulk_delete::<S>))
    .route("/appraisals/export", post(appraisals::export::<S>))
    .route(
      "/appraisals/{id}",
      get(appraisals::get_one::<S>)
        .put(appraisals::update::<S>)
        .delete(appraisals::delete_one::<S>),
    )
    .route("/appraisals/{id}/restore", post(appraisals::restore::<S>))
    .route("/appraisals/{id}/force", delete(appraisals::force_delete::<S>))
    // Search
    .route("/search", get(search::handler::<S>))
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/me", get(users::me).put(users::update_me::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
