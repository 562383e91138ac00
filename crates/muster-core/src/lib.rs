//! Core types and trait definitions for the Muster personnel records service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! appraisal rule table, validation, authorization policies, query scopes and
//! seed data all live here as plain data and pure functions; storage backends
//! implement [`store::RecordStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod appraisal;
pub mod error;
pub mod metadata;
pub mod organisation;
pub mod policy;
pub mod rules;
pub mod scope;
pub mod seed;
pub mod serviceperson;
pub mod store;
pub mod user;
pub mod validation;

pub use error::{Error, Result};
