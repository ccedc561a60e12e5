//! The revision state machine and the pieces it is built from.

pub mod assignment;
pub mod locks;
pub mod ordinal;
pub mod relocate;
pub mod service;

pub use assignment::LabelAssignment;
pub use service::{
    CountCheck, FinalizeOutcome, IntakeOutcome, NewRevisionRequest, RevisionPhotos,
    RevisionService, ServiceHealth, UploadedFile,
};
