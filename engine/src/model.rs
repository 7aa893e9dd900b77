//! Core data model for artifacts.
//!
//! This module defines the value types exchanged with callers:
//! - FsArtifact: a snapshot of a file, folder or drive
//! - ProgressInfo: one progress tick of a batch
//! - FsArtifactChanges: the result of an existence re-check
//! - DeepSearchFilter: the predicate of a deep search

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    File,
    Folder,
    /// Root-level volume; never deleted or renamed.
    Drive,
}

impl ArtifactType {
    /// Lowercase label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            ArtifactType::File => "file",
            ArtifactType::Folder => "folder",
            ArtifactType::Drive => "drive",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactType::File => write!(f, "File"),
            ArtifactType::Folder => write!(f, "Folder"),
            ArtifactType::Drive => write!(f, "Drive"),
        }
    }
}

/// Which storage backend owns a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    /// Built-in storage of the device
    InternalMemory,
    /// Removable or mounted media
    ExternalMemory,
}

/// A snapshot of a filesystem entry.
///
/// Artifacts are built fresh by every repository query; nothing keeps them in
/// sync with the disk afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsArtifact {
    /// Absolute path, the identity of the artifact
    pub full_path: PathBuf,

    /// Display name (the file name, or the drive label)
    pub name: String,

    /// Containing folder; None for drives and roots
    pub parent_full_path: Option<PathBuf>,

    pub artifact_type: ArtifactType,

    /// Extension including the leading dot, e.g. ".txt"
    pub file_extension: Option<String>,

    /// Size in bytes, files only
    pub size: Option<u64>,

    pub last_modified: Option<DateTime<Local>>,

    pub provider_type: ProviderType,

    /// Set by callers (e.g. a destination picker); the engine ignores it
    pub is_disabled: bool,

    /// Set by callers; the engine ignores it
    pub is_available_offline: bool,
}

impl FsArtifact {
    pub fn new(
        full_path: impl Into<PathBuf>,
        name: impl Into<String>,
        artifact_type: ArtifactType,
        provider_type: ProviderType,
    ) -> Self {
        FsArtifact {
            full_path: full_path.into(),
            name: name.into(),
            parent_full_path: None,
            artifact_type,
            file_extension: None,
            size: None,
            last_modified: None,
            provider_type,
            is_disabled: false,
            is_available_offline: false,
        }
    }

    pub fn is_file(&self) -> bool {
        self.artifact_type == ArtifactType::File
    }

    pub fn is_folder(&self) -> bool {
        self.artifact_type == ArtifactType::Folder
    }

    pub fn is_drive(&self) -> bool {
        self.artifact_type == ArtifactType::Drive
    }
}

/// Extension of a path with its leading dot, as shown to users.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
}

/// One progress tick of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Name of the artifact being processed
    pub current_text: String,

    /// "<value> of <max>"
    pub current_sub_text: String,

    /// 0-based tick counter
    pub current_value: usize,

    /// Number of top-level artifacts in the batch
    pub max_value: usize,
}

/// How an artifact changed since a caller last saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsArtifactChangesType {
    /// The path still exists; compare `last_modified` to detect edits
    Modify,
    /// The path no longer exists
    Delete,
}

/// Result of re-checking a known path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsArtifactChanges {
    pub artifact_full_path: PathBuf,
    pub is_path_exist: bool,
    pub last_modified: Option<DateTime<Local>>,
    pub changes_type: FsArtifactChangesType,
}

/// Extension families a deep search can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactCategorySearchType {
    Document,
    Image,
    Video,
    Audio,
    Archive,
}

impl ArtifactCategorySearchType {
    /// Lowercase extensions (with leading dot) belonging to this category.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Document => &[
                ".txt", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt",
                ".ods", ".odp", ".rtf", ".csv", ".md",
            ],
            Self::Image => &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tif", ".tiff", ".webp", ".svg",
                ".heic", ".ico",
            ],
            Self::Video => &[
                ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".3gp",
            ],
            Self::Audio => &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma", ".opus"],
            Self::Archive => &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
        }
    }

    pub fn contains(self, extension: &str) -> bool {
        let lower = extension.to_lowercase();
        self.extensions().iter().any(|e| *e == lower)
    }
}

/// Rolling time windows for a deep search, relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactDateSearchType {
    Yesterday,
    Past7Days,
    Past30Days,
}

impl ArtifactDateSearchType {
    pub fn days(self) -> i64 {
        match self {
            Self::Yesterday => 1,
            Self::Past7Days => 7,
            Self::Past30Days => 30,
        }
    }
}

/// Predicate of a deep search. Every unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepSearchFilter {
    /// Case-insensitive substring of the artifact name
    pub search_text: Option<String>,
    pub category: Option<ArtifactCategorySearchType>,
    pub date_range: Option<ArtifactDateSearchType>,
}
