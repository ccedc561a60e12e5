//! # farmhub-service
//!
//! The revision photo intake pipeline: archive validation, image
//! normalization, ordinal assignment, and the revision state machine that
//! takes a revision from `STAGING` to `FINALIZADA`.
//!
//! Persistence is reached through the [`store`] traits so the pipeline can
//! run against Postgres in production and an in-memory store in tests.

pub mod error;
pub mod intake;
pub mod revision;
pub mod store;

pub use error::{IntakeItemError, RevisionError};
pub use revision::service::RevisionService;
