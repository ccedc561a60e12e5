//! # farmhub-database
//!
//! PostgreSQL database connection management and concrete repository
//! implementations for the catalog and revision tables.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
