//! # FxFiles Engine - Artifact Transfer Library
//!
//! A headless file-manager engine in Rust: browse drives and folders,
//! create, rename and delete artifacts, copy and move batches of them, and
//! search whole drives. Designed as the foundation for multiple front ends
//! (CLI, GUI, automation).
//!
//! ## Overview
//!
//! The engine works on [`FsArtifact`]s (files, folders and drives) through a
//! [`LocalArtifactRepository`]. It features:
//! - Lazy, cancellable folder listing and deep search
//! - Batch copy/move with an explicit work stack
//! - Skip-or-overwrite conflict policy, reporting skipped artifacts
//! - Coarse progress reporting via callbacks (decoupled from UI technology)
//! - Optional checksum verification after copy
//!
//! ## Basic Usage
//!
//! ```no_run
//! use fxfiles_engine::{copy_artifacts, EngineError, LocalArtifactRepository};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = LocalArtifactRepository::default();
//! let report = repo.get_artifact(Path::new("/home/me/report.pdf"))?;
//!
//! match copy_artifacts(&repo, &[report], Path::new("/mnt/usb"), false, None, None) {
//!     Ok(batch) => println!("Copied {} files", batch.files_transferred),
//!     Err(EngineError::CanNotOperateOnFiles { ignored }) => {
//!         println!("{} artifacts already exist at the destination", ignored.len());
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (FsArtifact, ProgressInfo, search filters)
//! - **error**: Error types and handling
//! - **repository**: Filesystem-backed artifact operations
//! - **transfer**: Batch copy and move (create, run)
//! - **search**: Deep search over folders and drives
//! - **conflict**: Skip/overwrite decisions and destination checks
//! - **progress**: Progress callback trait
//! - **cancel**: Cooperative cancellation token
//! - **checksums**: Checksum computation and verification
//! - **config**: TOML configuration (drives, external media roots)

pub mod cancel;
pub mod checksums;
pub mod config;
pub mod conflict;
pub mod drives;
pub mod error;
pub mod fs_ops;
pub mod model;
pub mod naming;
pub mod progress;
pub mod provider;
pub mod repository;
pub mod search;
pub mod transfer;

// Re-export main types and functions
pub use cancel::CancellationToken;
pub use checksums::{compute_file_checksum, verify_copy, ChecksumAlgorithm, ChecksumValue};
pub use config::{ConfigError, DriveConfig, EngineConfig};
pub use error::EngineError;
pub use model::{
    ArtifactCategorySearchType, ArtifactDateSearchType, ArtifactType, DeepSearchFilter,
    FsArtifact, FsArtifactChanges, FsArtifactChangesType, ProgressInfo, ProviderType,
};
pub use progress::ProgressCallback;
pub use repository::{ChildArtifacts, LocalArtifactRepository};
pub use search::DeepSearch;
pub use transfer::{
    copy_artifacts, create_batch, move_artifacts, run_batch, BatchState, Mode, TransferBatch,
};
