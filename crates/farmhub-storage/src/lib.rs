//! # farmhub-storage
//!
//! Storage for revision photos: the local filesystem provider and the pure
//! mapping from revisions and ordinals to storage keys.

pub mod layout;
pub mod providers;

pub use layout::{RevisionLayout, sanitize_filename};
pub use providers::local::LocalStorageProvider;
