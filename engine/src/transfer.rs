//! Batch copy and move.
//!
//! This module provides the batch lifecycle:
//! - Creating a batch from top-level artifacts and a destination folder
//! - Running a batch (depth-first, one artifact at a time)
//! - Convenience wrappers that surface skipped artifacts as an error
//!
//! Folders are expanded onto an explicit work stack rather than by recursion,
//! so the depth of a tree does not grow the call stack.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::cancel::{is_cancelled, CancellationToken};
use crate::checksums::{self, ChecksumAlgorithm};
use crate::conflict::{decide, ensure_distinct_destination, ConflictDecision};
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{ArtifactType, FsArtifact};
use crate::naming::{is_blank_path, require_path};
use crate::progress::{ProgressCallback, ProgressCounter};
use crate::repository::LocalArtifactRepository;

/// The operation mode for a transfer batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Copy artifacts; sources remain unchanged
    Copy,
    /// Copy, then delete each source once it has been fully transferred
    Move,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Copy => write!(f, "Copy"),
            Mode::Move => write!(f, "Move"),
        }
    }
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Created, not yet started
    Pending,
    /// Listing the children of a folder
    Expanding,
    /// Copying or deleting artifacts
    Transferring,
    /// Every artifact was transferred
    Completed,
    /// Finished, but some artifacts were skipped
    PartiallyIgnored,
    /// Stopped early by a cancellation request
    Cancelled,
    /// Stopped by an error; work done before it is kept
    Failed,
}

impl BatchState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Completed
                | BatchState::PartiallyIgnored
                | BatchState::Cancelled
                | BatchState::Failed
        )
    }
}

/// A copy or move of a list of artifacts into one destination folder.
#[derive(Debug)]
pub struct TransferBatch {
    /// Unique identifier, used to correlate log lines
    pub id: Uuid,

    pub mode: Mode,

    /// Top-level artifacts, processed in this order
    pub artifacts: Vec<FsArtifact>,

    /// Folder receiving the top-level artifacts
    pub destination: PathBuf,

    /// Replace existing destination files instead of skipping them
    pub overwrite: bool,

    /// Hash every copied file against its source
    pub verify: Option<ChecksumAlgorithm>,

    pub state: BatchState,

    /// Artifacts skipped because of conflicts or unreadable folders
    pub ignored: Vec<FsArtifact>,

    /// Top-level artifacts fully processed
    pub processed: usize,

    /// Files copied (including those of expanded folders)
    pub files_transferred: usize,

    pub bytes_transferred: u64,

    pub created_at: SystemTime,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
}

impl TransferBatch {
    /// Turn a finished batch into the caller-facing result: a batch with
    /// skipped artifacts becomes `CanNotOperateOnFiles`.
    pub fn into_result(self) -> Result<TransferBatch, EngineError> {
        if self.ignored.is_empty() {
            Ok(self)
        } else {
            Err(EngineError::CanNotOperateOnFiles {
                ignored: self.ignored,
            })
        }
    }
}

/// Create a new batch in Pending state.
///
/// # Errors
/// `ArtifactPathNull` if the destination or any artifact path is blank.
pub fn create_batch<P: AsRef<Path>>(
    artifacts: Vec<FsArtifact>,
    destination: P,
    mode: Mode,
    overwrite: bool,
) -> Result<TransferBatch, EngineError> {
    let destination = destination.as_ref();
    require_path(destination, "destination")?;

    if let Some(artifact) = artifacts.iter().find(|a| is_blank_path(&a.full_path)) {
        return Err(EngineError::path_null(artifact.artifact_type.label()));
    }

    Ok(TransferBatch {
        id: Uuid::new_v4(),
        mode,
        artifacts,
        destination: destination.to_path_buf(),
        overwrite,
        verify: None,
        state: BatchState::Pending,
        ignored: Vec::new(),
        processed: 0,
        files_transferred: 0,
        bytes_transferred: 0,
        created_at: SystemTime::now(),
        start_time: None,
        end_time: None,
    })
}

/// Run a batch.
///
/// Emits progress tick 0 before the first artifact and one tick after each
/// top-level artifact; nested work is not reported. Cancellation is polled
/// before each artifact, top-level or nested, and leaves the rest untouched.
/// Skipped artifacts are collected in `batch.ignored`.
///
/// # Errors
/// `InvalidBatchState` unless the batch is Pending. Validation failures
/// (same destination, destination inside source) and I/O failures stop the
/// batch where it stands in the `Failed` state; nothing already done is
/// rolled back.
pub fn run_batch(
    batch: &mut TransferBatch,
    repo: &LocalArtifactRepository,
    progress: Option<&dyn ProgressCallback>,
    cancel: Option<&CancellationToken>,
) -> Result<(), EngineError> {
    if batch.state != BatchState::Pending {
        return Err(EngineError::InvalidBatchState { state: batch.state });
    }

    let span = info_span!("batch", id = %batch.id, mode = %batch.mode);
    let _guard = span.enter();

    batch.state = BatchState::Transferring;
    batch.start_time = Some(SystemTime::now());
    info!(
        count = batch.artifacts.len(),
        destination = ?batch.destination,
        overwrite = batch.overwrite,
        "starting batch"
    );

    let result = run_top_level(batch, repo, progress, cancel);
    batch.end_time = Some(SystemTime::now());
    let completed = match result {
        Ok(completed) => completed,
        Err(e) => {
            batch.state = BatchState::Failed;
            warn!(processed = batch.processed, error = %e, "batch failed");
            return Err(e);
        }
    };

    batch.state = if !completed {
        BatchState::Cancelled
    } else if batch.ignored.is_empty() {
        BatchState::Completed
    } else {
        BatchState::PartiallyIgnored
    };

    info!(
        state = ?batch.state,
        processed = batch.processed,
        files = batch.files_transferred,
        bytes = batch.bytes_transferred,
        ignored = batch.ignored.len(),
        "batch finished"
    );
    Ok(())
}

/// Returns false when the batch was cancelled.
fn run_top_level(
    batch: &mut TransferBatch,
    repo: &LocalArtifactRepository,
    progress: Option<&dyn ProgressCallback>,
    cancel: Option<&CancellationToken>,
) -> Result<bool, EngineError> {
    let artifacts = batch.artifacts.clone();
    let mut counter = ProgressCounter::new(progress, artifacts.len());

    for artifact in &artifacts {
        counter.start(&artifact.name);

        if is_cancelled(cancel) {
            warn!(
                remaining = artifacts.len() - batch.processed,
                "batch cancelled"
            );
            return Ok(false);
        }

        if !transfer_tree(batch, repo, artifact, cancel)? {
            warn!(artifact = ?artifact.full_path, "batch cancelled inside a folder");
            return Ok(false);
        }

        batch.processed += 1;
        counter.tick(&artifact.name);
    }

    Ok(true)
}

enum Step {
    /// Transfer an artifact into a destination folder
    Visit {
        artifact: FsArtifact,
        destination_dir: PathBuf,
    },
    /// All children of a folder are done; delete it if this is a move and
    /// nothing below it was skipped
    FinishFolder {
        artifact: FsArtifact,
        ignored_before: usize,
    },
}

/// Transfer one top-level artifact and everything below it.
///
/// Returns false when cancelled part way. A cancelled walk never reaches the
/// `FinishFolder` step of the folders it was inside, so their sources are
/// kept.
///
/// Symlinks are leaves: the link itself is recreated at the destination and,
/// for a move, removed. Nothing behind a link is read, copied or deleted.
fn transfer_tree(
    batch: &mut TransferBatch,
    repo: &LocalArtifactRepository,
    root: &FsArtifact,
    cancel: Option<&CancellationToken>,
) -> Result<bool, EngineError> {
    let mut stack = vec![Step::Visit {
        artifact: root.clone(),
        destination_dir: batch.destination.clone(),
    }];
    let mut is_root = true;

    while let Some(step) = stack.pop() {
        match step {
            Step::Visit {
                artifact,
                destination_dir,
            } => {
                // The root was polled by the caller.
                if !is_root && is_cancelled(cancel) {
                    return Ok(false);
                }
                is_root = false;

                if fs_ops::is_symlink(&artifact.full_path) {
                    transfer_link(batch, &artifact, &destination_dir)?;
                    continue;
                }

                match artifact.artifact_type {
                    ArtifactType::File => transfer_file(batch, repo, &artifact, &destination_dir)?,
                    ArtifactType::Folder => {
                        expand_folder(batch, repo, artifact, &destination_dir, &mut stack)?
                    }
                    ArtifactType::Drive => {
                        warn!(drive = ?artifact.full_path, "drives can not be transferred, skipping");
                    }
                }
            }
            Step::FinishFolder {
                artifact,
                ignored_before,
            } => {
                if batch.mode == Mode::Move {
                    if batch.ignored.len() == ignored_before {
                        repo.delete_artifact(&artifact)?;
                    } else {
                        debug!(folder = ?artifact.full_path, "keeping source folder with skipped content");
                    }
                }
            }
        }
    }

    Ok(true)
}

fn entry_name(artifact: &FsArtifact) -> Result<&std::ffi::OsStr, EngineError> {
    artifact
        .full_path
        .file_name()
        .ok_or(EngineError::ArtifactNameNull)
}

fn transfer_file(
    batch: &mut TransferBatch,
    repo: &LocalArtifactRepository,
    artifact: &FsArtifact,
    destination_dir: &Path,
) -> Result<(), EngineError> {
    let destination = destination_dir.join(entry_name(artifact)?);
    ensure_distinct_destination(ArtifactType::File, &artifact.full_path, &destination)?;

    match decide(batch.overwrite, destination.exists()) {
        ConflictDecision::Skip => {
            debug!(file = ?artifact.full_path, destination = ?destination, "destination exists, skipping");
            batch.ignored.push(artifact.clone());
        }
        ConflictDecision::Proceed => {
            batch.state = BatchState::Transferring;
            let bytes = fs_ops::copy_file_with_metadata(&artifact.full_path, &destination)?;

            if let Some(algorithm) = batch.verify {
                checksums::verify_copy(&artifact.full_path, &destination, algorithm)?;
            }

            if batch.mode == Mode::Move {
                repo.delete_artifact(artifact)?;
            }

            batch.files_transferred += 1;
            batch.bytes_transferred += bytes;
            debug!(file = ?artifact.full_path, destination = ?destination, bytes, "transferred file");
        }
    }
    Ok(())
}

fn transfer_link(
    batch: &mut TransferBatch,
    artifact: &FsArtifact,
    destination_dir: &Path,
) -> Result<(), EngineError> {
    let destination = destination_dir.join(entry_name(artifact)?);
    ensure_distinct_destination(ArtifactType::File, &artifact.full_path, &destination)?;

    let exists = fs::symlink_metadata(&destination).is_ok();
    match decide(batch.overwrite, exists) {
        ConflictDecision::Skip => {
            debug!(link = ?artifact.full_path, destination = ?destination, "destination exists, skipping");
            batch.ignored.push(artifact.clone());
        }
        ConflictDecision::Proceed => {
            batch.state = BatchState::Transferring;
            fs_ops::copy_symlink(&artifact.full_path, &destination)?;

            if batch.mode == Mode::Move {
                fs_ops::remove_symlink(&artifact.full_path)?;
            }

            batch.files_transferred += 1;
            debug!(link = ?artifact.full_path, destination = ?destination, "transferred link");
        }
    }
    Ok(())
}

fn expand_folder(
    batch: &mut TransferBatch,
    repo: &LocalArtifactRepository,
    artifact: FsArtifact,
    destination_dir: &Path,
    stack: &mut Vec<Step>,
) -> Result<(), EngineError> {
    let target = destination_dir.join(entry_name(&artifact)?);
    ensure_distinct_destination(ArtifactType::Folder, &artifact.full_path, &target)?;

    batch.state = BatchState::Expanding;
    fs_ops::ensure_dir(&target)?;

    match repo.transfer_children(&artifact.full_path) {
        Ok(children) => {
            debug!(folder = ?artifact.full_path, children = children.len(), "expanded folder");
            stack.push(Step::FinishFolder {
                artifact,
                ignored_before: batch.ignored.len(),
            });
            // Reversed so that children pop in listing order.
            for child in children.into_iter().rev() {
                stack.push(Step::Visit {
                    artifact: child,
                    destination_dir: target.clone(),
                });
            }
        }
        Err(e) => {
            warn!(folder = ?artifact.full_path, error = %e, "can not list folder, skipping its content");
            batch.ignored.push(artifact);
        }
    }

    batch.state = BatchState::Transferring;
    Ok(())
}

/// Copy `artifacts` into `destination`.
///
/// # Errors
/// `CanNotOperateOnFiles` with the skipped artifacts when any destination
/// file existed and `overwrite` was false. Retry those with `overwrite` set
/// to replace them.
pub fn copy_artifacts(
    repo: &LocalArtifactRepository,
    artifacts: &[FsArtifact],
    destination: &Path,
    overwrite: bool,
    progress: Option<&dyn ProgressCallback>,
    cancel: Option<&CancellationToken>,
) -> Result<TransferBatch, EngineError> {
    transfer_artifacts(repo, Mode::Copy, artifacts, destination, overwrite, progress, cancel)
}

/// Move `artifacts` into `destination`. A folder source is deleted only when
/// nothing below it was skipped.
///
/// # Errors
/// Same as [`copy_artifacts`].
pub fn move_artifacts(
    repo: &LocalArtifactRepository,
    artifacts: &[FsArtifact],
    destination: &Path,
    overwrite: bool,
    progress: Option<&dyn ProgressCallback>,
    cancel: Option<&CancellationToken>,
) -> Result<TransferBatch, EngineError> {
    transfer_artifacts(repo, Mode::Move, artifacts, destination, overwrite, progress, cancel)
}

fn transfer_artifacts(
    repo: &LocalArtifactRepository,
    mode: Mode,
    artifacts: &[FsArtifact],
    destination: &Path,
    overwrite: bool,
    progress: Option<&dyn ProgressCallback>,
    cancel: Option<&CancellationToken>,
) -> Result<TransferBatch, EngineError> {
    let mut batch = create_batch(artifacts.to_vec(), destination, mode, overwrite)?;
    run_batch(&mut batch, repo, progress, cancel)?;
    batch.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressInfo;
    use std::fs;
    use std::sync::Mutex;

    fn artifact(repo: &LocalArtifactRepository, path: &Path) -> FsArtifact {
        repo.get_artifact(path).expect("Failed to read artifact")
    }

    /// src/ and dst/ folders inside a fresh temp dir.
    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src dir");
        fs::create_dir(&dst).expect("Failed to create dst dir");
        (temp_dir, src, dst)
    }

    #[test]
    fn test_copy_skips_existing_and_reports_ignored() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "source a").unwrap();
        fs::write(src.join("b.txt"), "source b").unwrap();
        fs::write(dst.join("a.txt"), "existing a").unwrap();

        let batch = vec![artifact(&repo, &src.join("a.txt")), artifact(&repo, &src.join("b.txt"))];
        let result = copy_artifacts(&repo, &batch, &dst, false, None, None);

        match result {
            Err(EngineError::CanNotOperateOnFiles { ignored }) => {
                let names: Vec<_> = ignored.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["a.txt"]);
            }
            other => panic!("Expected CanNotOperateOnFiles, got {:?}", other),
        }

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "existing a");
        assert_eq!(fs::read_to_string(dst.join("b.txt")).unwrap(), "source b");
        assert!(src.join("a.txt").exists());
        assert!(src.join("b.txt").exists());
    }

    #[test]
    fn test_copy_with_overwrite_replaces_destination() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "fresh bytes").unwrap();
        fs::write(dst.join("a.txt"), "stale").unwrap();

        let batch = copy_artifacts(&repo, &[artifact(&repo, &src.join("a.txt"))], &dst, true, None, None)
            .expect("Overwrite copy should succeed");

        assert_eq!(batch.state, BatchState::Completed);
        assert_eq!(batch.files_transferred, 1);
        assert_eq!(fs::read(dst.join("a.txt")).unwrap(), fs::read(src.join("a.txt")).unwrap());
        assert!(src.join("a.txt").exists());
    }

    #[test]
    fn test_copy_nested_folder_preserves_structure() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let tree = src.join("tree");
        fs::create_dir_all(tree.join("a").join("b").join("c")).unwrap();
        fs::write(tree.join("root.txt"), "r").unwrap();
        fs::write(tree.join("a").join("b").join("c").join("deep.txt"), "deep").unwrap();
        fs::create_dir(tree.join("empty")).unwrap();

        let batch = copy_artifacts(&repo, &[artifact(&repo, &tree)], &dst, false, None, None)
            .expect("Copy should succeed");

        assert_eq!(batch.files_transferred, 2);
        assert_eq!(fs::read_to_string(dst.join("tree").join("root.txt")).unwrap(), "r");
        assert_eq!(
            fs::read_to_string(dst.join("tree/a/b/c/deep.txt")).unwrap(),
            "deep"
        );
        assert!(dst.join("tree").join("empty").is_dir());
        assert!(tree.exists());
    }

    #[test]
    fn test_move_folder_without_conflicts_removes_source() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let folder = src.join("photos");
        fs::create_dir_all(folder.join("2024")).unwrap();
        fs::write(folder.join("a.jpg"), "a").unwrap();
        fs::write(folder.join("2024").join("b.jpg"), "b").unwrap();

        let batch = move_artifacts(&repo, &[artifact(&repo, &folder)], &dst, false, None, None)
            .expect("Move should succeed");

        assert_eq!(batch.state, BatchState::Completed);
        assert!(!folder.exists());
        assert!(dst.join("photos").join("a.jpg").exists());
        assert!(dst.join("photos").join("2024").join("b.jpg").exists());
    }

    #[test]
    fn test_move_folder_with_skipped_descendant_keeps_source() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let folder = src.join("docs");
        fs::create_dir_all(folder.join("inner")).unwrap();
        fs::write(folder.join("free.txt"), "free").unwrap();
        fs::write(folder.join("inner").join("clash.txt"), "mine").unwrap();
        fs::create_dir_all(dst.join("docs").join("inner")).unwrap();
        fs::write(dst.join("docs").join("inner").join("clash.txt"), "theirs").unwrap();

        let result = move_artifacts(&repo, &[artifact(&repo, &folder)], &dst, false, None, None);

        let err = result.expect_err("Move with a conflict should report it");
        assert_eq!(err.ignored().len(), 1);
        assert_eq!(err.ignored()[0].name, "clash.txt");

        assert!(folder.exists(), "Source folder must be kept");
        assert!(folder.join("inner").join("clash.txt").exists());
        assert!(!folder.join("free.txt").exists(), "Non-conflicting file is moved");
        assert_eq!(fs::read_to_string(dst.join("docs").join("free.txt")).unwrap(), "free");
        assert_eq!(
            fs::read_to_string(dst.join("docs").join("inner").join("clash.txt")).unwrap(),
            "theirs"
        );
    }

    #[test]
    fn test_skip_in_one_folder_does_not_keep_a_sibling_folder() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::create_dir(src.join("first")).unwrap();
        fs::create_dir(src.join("second")).unwrap();
        fs::write(src.join("first").join("x.txt"), "x").unwrap();
        fs::write(src.join("second").join("y.txt"), "y").unwrap();
        fs::create_dir(dst.join("first")).unwrap();
        fs::write(dst.join("first").join("x.txt"), "old").unwrap();

        let artifacts = vec![artifact(&repo, &src.join("first")), artifact(&repo, &src.join("second"))];
        let err = move_artifacts(&repo, &artifacts, &dst, false, None, None).unwrap_err();

        assert_eq!(err.ignored().len(), 1);
        assert!(src.join("first").exists());
        assert!(!src.join("second").exists());
    }

    #[test]
    fn test_move_file_deletes_source() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("m.txt"), "move me").unwrap();

        move_artifacts(&repo, &[artifact(&repo, &src.join("m.txt"))], &dst, false, None, None)
            .expect("Move should succeed");

        assert!(!src.join("m.txt").exists());
        assert_eq!(fs::read_to_string(dst.join("m.txt")).unwrap(), "move me");
    }

    #[test]
    fn test_same_destination_fails_without_changes() {
        let (_temp_dir, src, _dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "keep").unwrap();
        fs::create_dir(src.join("sub")).unwrap();
        fs::write(src.join("sub").join("inner.txt"), "inner").unwrap();

        let file = artifact(&repo, &src.join("a.txt"));
        assert!(matches!(
            move_artifacts(&repo, &[file], &src, true, None, None),
            Err(EngineError::SameDestinationFile { .. })
        ));
        assert_eq!(fs::read_to_string(src.join("a.txt")).unwrap(), "keep");

        let folder = artifact(&repo, &src.join("sub"));
        assert!(matches!(
            copy_artifacts(&repo, &[folder], &src, true, None, None),
            Err(EngineError::SameDestinationFolder { .. })
        ));
        assert_eq!(fs::read_to_string(src.join("sub").join("inner.txt")).unwrap(), "inner");
    }

    #[test]
    fn test_folder_into_itself_is_rejected() {
        let (_temp_dir, src, _dst) = setup();
        let repo = LocalArtifactRepository::default();
        let folder = src.join("loop");
        fs::create_dir_all(folder.join("child")).unwrap();

        let result = copy_artifacts(&repo, &[artifact(&repo, &folder)], &folder.join("child"), false, None, None);
        assert!(matches!(result, Err(EngineError::DestinationInsideSource { .. })));
        assert!(!folder.join("child").join("loop").exists());
    }

    #[test]
    fn test_cancel_before_second_artifact() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let names = ["1.txt", "2.txt", "3.txt"];
        let artifacts: Vec<_> = names
            .iter()
            .map(|name| {
                fs::write(src.join(name), *name).unwrap();
                artifact(&repo, &src.join(name))
            })
            .collect();

        let token = CancellationToken::new();
        let cancel_after_first = |info: &ProgressInfo| {
            if info.current_value == 1 {
                token.cancel();
            }
        };

        let mut batch = create_batch(artifacts, &dst, Mode::Move, false).unwrap();
        run_batch(&mut batch, &repo, Some(&cancel_after_first), Some(&token))
            .expect("Cancellation is not an error");

        assert_eq!(batch.state, BatchState::Cancelled);
        assert_eq!(batch.processed, 1);
        assert!(batch.ignored.is_empty());
        assert!(dst.join("1.txt").exists());
        assert!(!src.join("1.txt").exists());
        for name in &names[1..] {
            assert!(!dst.join(name).exists());
            assert!(src.join(name).exists());
        }
    }

    #[test]
    fn test_cancel_inside_folder_keeps_source_folder() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let folder = src.join("big");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.txt"), "a").unwrap();

        let mut batch = create_batch(vec![artifact(&repo, &folder)], &dst, Mode::Move, false).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let root = batch.artifacts[0].clone();
        let finished = transfer_tree(&mut batch, &repo, &root, Some(&token))
            .expect("Cancellation is not an error");

        assert!(!finished);
        assert!(folder.join("a.txt").exists());
        assert!(dst.join("big").is_dir());
        assert!(!dst.join("big").join("a.txt").exists());
    }

    #[test]
    fn test_progress_counts_top_level_artifacts_only() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let folder = src.join("many");
        fs::create_dir(&folder).unwrap();
        for i in 0..10 {
            fs::write(folder.join(format!("{i}.txt")), "x").unwrap();
        }
        fs::write(src.join("single.txt"), "s").unwrap();

        let seen = Mutex::new(Vec::new());
        let callback = |info: &ProgressInfo| seen.lock().unwrap().push(info.clone());
        let artifacts = vec![artifact(&repo, &folder), artifact(&repo, &src.join("single.txt"))];
        copy_artifacts(&repo, &artifacts, &dst, false, Some(&callback), None).expect("Copy should succeed");

        let seen = seen.into_inner().unwrap();
        let values: Vec<_> = seen.iter().map(|i| i.current_value).collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert!(seen.iter().all(|i| i.max_value == 2));
        assert_eq!(seen[0].current_text, "many");
        assert_eq!(seen[2].current_text, "single.txt");
        assert_eq!(seen[1].current_sub_text, "1 of 2");
    }

    #[cfg(unix)]
    #[test]
    fn test_destination_linked_to_source_keeps_data() {
        let (temp_dir, src, _dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "precious").unwrap();
        let alias = temp_dir.path().join("alias");
        std::os::unix::fs::symlink(&src, &alias).unwrap();

        let file = artifact(&repo, &src.join("a.txt"));
        assert!(matches!(
            copy_artifacts(&repo, &[file.clone()], &alias, true, None, None),
            Err(EngineError::SameDestinationFile { .. })
        ));
        assert_eq!(fs::read_to_string(src.join("a.txt")).unwrap(), "precious");

        assert!(matches!(
            move_artifacts(&repo, &[file], &alias, true, None, None),
            Err(EngineError::SameDestinationFile { .. })
        ));
        assert_eq!(fs::read_to_string(src.join("a.txt")).unwrap(), "precious");
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_into_a_link_inside_itself_is_rejected() {
        let (temp_dir, src, _dst) = setup();
        let repo = LocalArtifactRepository::default();
        let folder = src.join("album");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.jpg"), "a").unwrap();
        let alias = temp_dir.path().join("alias");
        std::os::unix::fs::symlink(&folder, &alias).unwrap();

        let result = move_artifacts(&repo, &[artifact(&repo, &folder)], &alias, true, None, None);
        assert!(matches!(result, Err(EngineError::DestinationInsideSource { .. })));
        assert_eq!(fs::read_to_string(folder.join("a.jpg")).unwrap(), "a");
    }

    #[cfg(unix)]
    #[test]
    fn test_move_does_not_delete_through_a_link() {
        let (temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let outside = temp_dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), "keep").unwrap();
        let tree = src.join("tree");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("own.txt"), "own").unwrap();
        std::os::unix::fs::symlink("../../outside", tree.join("link")).unwrap();

        move_artifacts(&repo, &[artifact(&repo, &tree)], &dst, false, None, None)
            .expect("Move should succeed");

        assert_eq!(fs::read_to_string(outside.join("keep.txt")).unwrap(), "keep");
        assert!(!tree.exists());
        let moved_link = dst.join("tree").join("link");
        assert!(fs_ops::is_symlink(&moved_link));
        assert_eq!(fs::read_link(&moved_link).unwrap(), PathBuf::from("../../outside"));
        assert!(dst.join("tree").join("own.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_with_a_self_referencing_link_terminates() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let tree = src.join("tree");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(".", tree.join("self")).unwrap();

        let batch = copy_artifacts(&repo, &[artifact(&repo, &tree)], &dst, false, None, None)
            .expect("Copy should succeed");

        assert_eq!(batch.files_transferred, 2);
        let copied_link = dst.join("tree").join("self");
        assert!(fs_ops::is_symlink(&copied_link));
        assert_eq!(fs::read_link(&copied_link).unwrap(), PathBuf::from("."));
        assert!(dst.join("tree").join("a.txt").exists());
        assert!(fs_ops::is_symlink(&tree.join("self")));
    }

    #[cfg(unix)]
    #[test]
    fn test_move_keeps_an_unlistable_subfolder_and_its_parents() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        let tree = src.join("tree");
        let locked = tree.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("secret.txt"), "s").unwrap();
        fs::write(tree.join("free.txt"), "f").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can list anything; only check the skip when permissions hold.
        let enforced = fs::read_dir(&locked).is_err();
        let result = move_artifacts(&repo, &[artifact(&repo, &tree)], &dst, false, None, None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if enforced {
            let err = result.expect_err("Unlistable folder should be reported");
            let names: Vec<_> = err.ignored().iter().map(|a| a.name.as_str()).collect();
            assert_eq!(names, vec!["locked"]);
            assert!(tree.exists());
            assert!(locked.join("secret.txt").exists());
            assert!(!tree.join("free.txt").exists());
            assert!(dst.join("tree").join("free.txt").exists());
        } else {
            result.expect("Move should succeed when permissions are not enforced");
        }
    }

    #[test]
    fn test_error_leaves_batch_failed() {
        let (_temp_dir, src, _dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "a").unwrap();

        let mut batch = create_batch(vec![artifact(&repo, &src.join("a.txt"))], &src, Mode::Copy, true).unwrap();
        let result = run_batch(&mut batch, &repo, None, None);

        assert!(matches!(result, Err(EngineError::SameDestinationFile { .. })));
        assert_eq!(batch.state, BatchState::Failed);
        assert!(batch.state.is_terminal());
        assert!(batch.end_time.is_some());
        assert!(matches!(
            run_batch(&mut batch, &repo, None, None),
            Err(EngineError::InvalidBatchState { .. })
        ));
    }

    #[test]
    fn test_run_batch_requires_pending_state() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "a").unwrap();

        let mut batch = create_batch(vec![artifact(&repo, &src.join("a.txt"))], &dst, Mode::Copy, true).unwrap();
        run_batch(&mut batch, &repo, None, None).expect("First run should succeed");
        assert!(batch.state.is_terminal());
        assert!(batch.start_time.is_some());
        assert!(batch.end_time.is_some());

        let result = run_batch(&mut batch, &repo, None, None);
        assert!(matches!(result, Err(EngineError::InvalidBatchState { .. })));
    }

    #[test]
    fn test_create_batch_rejects_blank_paths() {
        let repo = LocalArtifactRepository::default();
        let blank = FsArtifact::new("", "x", ArtifactType::File, repo.provider_type(Path::new("")));

        assert!(matches!(
            create_batch(Vec::new(), "  ", Mode::Copy, false),
            Err(EngineError::ArtifactPathNull { .. })
        ));
        assert!(matches!(
            create_batch(vec![blank], "/tmp", Mode::Copy, false),
            Err(EngineError::ArtifactPathNull { .. })
        ));
    }

    #[test]
    fn test_copy_creates_missing_destination() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("a.txt"), "a").unwrap();
        let target = dst.join("new").join("place");

        copy_artifacts(&repo, &[artifact(&repo, &src.join("a.txt"))], &target, false, None, None)
            .expect("Copy should succeed");
        assert!(target.join("a.txt").exists());
    }

    #[test]
    fn test_verified_copy() {
        let (_temp_dir, src, dst) = setup();
        let repo = LocalArtifactRepository::default();
        fs::write(src.join("v.bin"), vec![7u8; 200_000]).unwrap();

        let mut batch = create_batch(vec![artifact(&repo, &src.join("v.bin"))], &dst, Mode::Copy, false).unwrap();
        batch.verify = Some(ChecksumAlgorithm::Blake3);
        run_batch(&mut batch, &repo, None, None).expect("Verified copy should succeed");

        assert_eq!(batch.state, BatchState::Completed);
        assert_eq!(batch.bytes_transferred, 200_000);
    }
}
