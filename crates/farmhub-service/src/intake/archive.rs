//! ZIP archive validation.
//!
//! Every check here runs against the central directory only. No member is
//! inflated until [`read_members`] is called on an inspection that already
//! passed.

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::ZipArchive;

use farmhub_core::config::IntakeConfig;
use farmhub_storage::sanitize_filename;

use crate::error::{IntakeItemError, RevisionError};

/// Extensions accepted as images, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Size and count ceilings applied to an uploaded archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeLimits {
    /// Maximum archive size in bytes.
    pub max_archive_bytes: u64,
    /// Maximum number of non-directory members.
    pub max_members: usize,
    /// Maximum sum of declared uncompressed sizes.
    pub max_total_uncompressed_bytes: u64,
    /// Maximum declared size of one image member.
    pub max_member_bytes: u64,
}

impl From<&IntakeConfig> for IntakeLimits {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            max_archive_bytes: config.max_archive_bytes,
            max_members: config.max_members,
            max_total_uncompressed_bytes: config.max_total_uncompressed_bytes,
            max_member_bytes: config.max_member_bytes,
        }
    }
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self::from(&IntakeConfig::default())
    }
}

/// An image member that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedMember {
    /// Position in the archive's central directory.
    #[serde(skip)]
    pub index: usize,
    /// Sanitized file name.
    pub name: String,
    /// Declared uncompressed size.
    pub declared_size: u64,
}

/// Result of validating an archive without extracting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveInspection {
    /// Number of non-directory members.
    pub total_members: usize,
    /// Eligible images, sorted by sanitized name.
    pub accepted: Vec<AcceptedMember>,
    /// Members skipped because their extension is not an image extension.
    pub omitted: usize,
    /// Eligible images excluded for a per-item reason.
    pub errors: Vec<IntakeItemError>,
}

/// Bytes of one accepted member.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Sanitized file name.
    pub name: String,
    /// Raw (still encoded) image bytes.
    pub data: Vec<u8>,
}

/// Whether a file name carries an allowed image extension.
pub fn is_supported_image(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Validate an archive against `limits` using only its metadata.
pub fn inspect_archive(
    bytes: &[u8],
    limits: &IntakeLimits,
) -> Result<ArchiveInspection, RevisionError> {
    let size = bytes.len() as u64;
    if size > limits.max_archive_bytes {
        return Err(RevisionError::PayloadTooLarge {
            size,
            limit: limits.max_archive_bytes,
        });
    }

    let mut archive = open(bytes)?;

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| RevisionError::InvalidArchive {
                reason: e.to_string(),
            })?;
        if entry.is_dir() {
            continue;
        }
        files.push((index, entry.name().to_string(), entry.size()));
    }

    if files.is_empty() {
        return Err(RevisionError::EmptyArchive);
    }
    if files.len() > limits.max_members {
        return Err(RevisionError::TooManyMembers {
            count: files.len(),
            limit: limits.max_members,
        });
    }

    let total: u64 = files
        .iter()
        .fold(0u64, |acc, (_, _, size)| acc.saturating_add(*size));
    if total > limits.max_total_uncompressed_bytes {
        return Err(RevisionError::UncompressedSizeExceeded {
            total,
            limit: limits.max_total_uncompressed_bytes,
        });
    }

    let mut inspection = ArchiveInspection {
        total_members: files.len(),
        ..Default::default()
    };

    for (index, raw_name, declared_size) in files {
        if !is_supported_image(&raw_name) {
            inspection.omitted += 1;
            continue;
        }

        let name = sanitize_filename(&raw_name);
        if declared_size > limits.max_member_bytes {
            inspection.errors.push(IntakeItemError::new(
                name,
                format!(
                    "declared size {declared_size} exceeds the {} byte limit",
                    limits.max_member_bytes
                ),
            ));
            continue;
        }

        inspection.accepted.push(AcceptedMember {
            index,
            name,
            declared_size,
        });
    }

    inspection
        .accepted
        .sort_by(|a, b| a.name.cmp(&b.name).then(a.index.cmp(&b.index)));

    debug!(
        total_members = inspection.total_members,
        accepted = inspection.accepted.len(),
        omitted = inspection.omitted,
        errors = inspection.errors.len(),
        "Inspected archive"
    );

    Ok(inspection)
}

/// Inflate the accepted members, in the order given.
///
/// A member that fails to inflate, or inflates to more than it declared, is
/// reported as an item error instead of failing the batch. The returned
/// members keep the relative order of `accepted`.
pub fn read_members(
    bytes: &[u8],
    accepted: &[AcceptedMember],
) -> Result<(Vec<ArchiveMember>, Vec<IntakeItemError>), RevisionError> {
    let mut archive = open(bytes)?;
    let mut members = Vec::with_capacity(accepted.len());
    let mut errors = Vec::new();

    for member in accepted {
        match read_one(&mut archive, member) {
            Ok(data) => members.push(ArchiveMember {
                name: member.name.clone(),
                data,
            }),
            Err(reason) => errors.push(IntakeItemError::new(member.name.clone(), reason)),
        }
    }

    Ok((members, errors))
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, RevisionError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| RevisionError::InvalidArchive {
        reason: e.to_string(),
    })
}

fn read_one(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    member: &AcceptedMember,
) -> Result<Vec<u8>, String> {
    let file = archive.by_index(member.index).map_err(|e| e.to_string())?;

    let capacity = usize::try_from(member.declared_size).unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);
    file.take(member.declared_size.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| e.to_string())?;

    if data.len() as u64 > member.declared_size {
        return Err("member inflates beyond its declared size".to_string());
    }
    Ok(data)
}
