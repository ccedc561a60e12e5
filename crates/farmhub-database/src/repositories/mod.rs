//! Repository implementations for FarmHub tables.

pub mod farm;
pub mod photo;
pub mod revision;
pub mod sector;

pub use farm::FarmRepository;
pub use photo::PhotoRepository;
pub use revision::RevisionRepository;
pub use sector::SectorRepository;
