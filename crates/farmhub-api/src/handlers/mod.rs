//! Route handlers organized by domain.

mod form;
pub mod health;
pub mod revision;
