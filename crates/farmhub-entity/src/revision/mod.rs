//! Revision domain entities.

pub mod model;
pub mod photo;
pub mod state;

pub use model::{NewRevision, Revision};
pub use photo::{NewPhoto, PhotoFinalUpdate, PhotoOrdinalUpdate, RevisionPhoto};
pub use state::{PhotoState, RevisionState};
