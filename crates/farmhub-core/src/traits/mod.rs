//! Core trait definitions that form the contracts between FarmHub crates.

pub mod storage;

pub use storage::{StorageObjectMeta, StorageProvider};
