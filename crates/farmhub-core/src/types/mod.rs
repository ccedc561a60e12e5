//! Core type definitions used across the FarmHub workspace.

pub mod id;

pub use id::*;
