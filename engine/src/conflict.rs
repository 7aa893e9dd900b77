//! Conflict policy for copy and move.
//!
//! The decision is made per leaf file. Folders are never skipped as a whole:
//! their destination is created when missing and the policy is applied to
//! each file below them.

use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::fs_ops::resolve_physical;
use crate::model::ArtifactType;

/// What to do with one file whose destination has been computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Copy, overwriting any existing destination
    Proceed,
    /// Leave source and destination untouched and record the artifact as ignored
    Skip,
}

/// Skip only when the destination exists and overwriting was not requested.
pub fn decide(overwrite: bool, destination_exists: bool) -> ConflictDecision {
    if !overwrite && destination_exists {
        ConflictDecision::Skip
    } else {
        ConflictDecision::Proceed
    }
}

/// Fail when `destination` resolves to `source`, or, for folders, lies inside
/// it. Runs before any other work on the artifact.
///
/// Both paths are compared after resolving symlinks in their existing
/// ancestors, so a destination reached through a linked folder is caught.
///
/// Returns the resolved destination path.
pub fn ensure_distinct_destination(
    artifact_type: ArtifactType,
    source: &Path,
    destination: &Path,
) -> Result<PathBuf, EngineError> {
    let resolved_source = resolve_physical(source)?;
    let resolved_destination = resolve_physical(destination)?;

    if resolved_source == resolved_destination {
        return Err(match artifact_type {
            ArtifactType::File => EngineError::SameDestinationFile {
                path: source.to_path_buf(),
            },
            ArtifactType::Folder | ArtifactType::Drive => EngineError::SameDestinationFolder {
                path: source.to_path_buf(),
            },
        });
    }

    if artifact_type != ArtifactType::File && resolved_destination.starts_with(&resolved_source) {
        return Err(EngineError::DestinationInsideSource {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    Ok(resolved_destination)
}
