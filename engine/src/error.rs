//! Error types for the artifact engine.
//!
//! `EngineError` covers both the domain taxonomy (validation failures,
//! conflicts, drive protection) and the I/O failures that can surface while an
//! operation touches the filesystem. Skipped artifacts are not errors while a
//! batch runs; they are accumulated and surfaced once as
//! [`EngineError::CanNotOperateOnFiles`] after the batch finishes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ArtifactType, FsArtifact};
use crate::transfer::BatchState;

/// Errors raised by repository, transfer and search operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An empty or whitespace-only path was supplied.
    #[error("the {kind} path is empty")]
    ArtifactPathNull { kind: &'static str },

    /// An empty or whitespace-only name was supplied.
    #[error("the artifact name is empty")]
    ArtifactNameNull,

    /// The name contains a character reserved by the filesystem.
    #[error("the name '{name}' contains invalid characters")]
    ArtifactInvalidName { name: String },

    /// The target of a create or rename already exists.
    #[error("the {kind} already exists: {}", .path.display())]
    ArtifactAlreadyExists { kind: &'static str, path: PathBuf },

    /// The artifact is missing, or its type does not match what is on disk.
    #[error("the {kind} does not exist: {}", .path.display())]
    ArtifactDoesNotExist { kind: &'static str, path: PathBuf },

    /// Listing a directory was refused by the operating system.
    #[error("access to {} is denied", .path.display())]
    ArtifactUnauthorizedAccess { path: PathBuf },

    /// The artifact type could not be resolved from the path.
    #[error("the artifact type of {} could not be resolved", .path.display())]
    ArtifactTypeNull { path: PathBuf },

    /// Drives can be neither renamed nor deleted.
    #[error("drive {} can not be modified or deleted", .path.display())]
    CanNotModifyOrDeleteDrive { path: PathBuf },

    /// A file would be copied or moved onto itself.
    #[error("the source and destination of file {} are the same", .path.display())]
    SameDestinationFile { path: PathBuf },

    /// A folder would be copied or moved onto itself.
    #[error("the source and destination of folder {} are the same", .path.display())]
    SameDestinationFolder { path: PathBuf },

    /// A folder would be copied or moved into its own subtree.
    #[error("folder {} can not be transferred into its own subtree {}", .source_path.display(), .destination.display())]
    DestinationInsideSource {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// The content supplied for a new file is empty.
    #[error("the file content is empty")]
    StreamNull,

    /// Some artifacts of a batch were skipped because of overwrite conflicts.
    #[error("can not operate on {} artifact(s): {}", .ignored.len(), ignored_names(.ignored))]
    CanNotOperateOnFiles { ignored: Vec<FsArtifact> },

    /// The copied file does not hash to the same value as its source.
    #[error("checksum verification failed for {}", .path.display())]
    VerificationFailed { path: PathBuf },

    /// A batch was run outside the `Pending` state.
    #[error("batch must be pending to run; current state: {state:?}")]
    InvalidBatchState { state: BatchState },

    /// Failed to read from a source artifact.
    #[error("failed to read {}", .path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a destination artifact.
    #[error("failed to write {}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory.
    #[error("failed to create directory {}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to delete or rename an artifact.
    #[error("failed to modify {}", .path.display())]
    ModifyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn ignored_names(ignored: &[FsArtifact]) -> String {
    ignored
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    /// Returns true for the domain taxonomy, whose message is meant to be
    /// shown to a user as is. Everything else is an unexpected failure that a
    /// caller should report generically.
    pub fn is_known(&self) -> bool {
        !matches!(
            self,
            Self::ReadError { .. }
                | Self::WriteError { .. }
                | Self::DirectoryCreationFailed { .. }
                | Self::ModifyFailed { .. }
                | Self::Io(_)
        )
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::ModifyFailed { source, .. }
            | Self::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// The artifacts skipped by a batch, empty for every other error.
    pub fn ignored(&self) -> &[FsArtifact] {
        match self {
            Self::CanNotOperateOnFiles { ignored } => ignored,
            _ => &[],
        }
    }

    pub(crate) fn path_null(kind: &'static str) -> Self {
        Self::ArtifactPathNull { kind }
    }

    pub(crate) fn does_not_exist(kind: ArtifactType, path: impl Into<PathBuf>) -> Self {
        Self::ArtifactDoesNotExist {
            kind: kind.label(),
            path: path.into(),
        }
    }
}
