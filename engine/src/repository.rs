//! Artifact repository backed by the local filesystem.
//!
//! Every query builds fresh [`FsArtifact`] snapshots; nothing is cached.
//! Validation runs before any I/O so a rejected call never mutates the disk.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cancel::{is_cancelled, CancellationToken};
use crate::config::{DriveConfig, EngineConfig};
use crate::drives::{self, DriveRoot};
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{
    dotted_extension, ArtifactType, FsArtifact, FsArtifactChanges, FsArtifactChangesType,
    ProviderType,
};
use crate::naming::{has_invalid_chars, require_path, validate_name};
use crate::progress::{ProgressCallback, ProgressCounter};
use crate::provider::ProviderResolver;

/// Leaf operations against the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalArtifactRepository {
    drives: Vec<DriveConfig>,
    providers: ProviderResolver,
}

impl Default for LocalArtifactRepository {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LocalArtifactRepository {
    pub fn new(config: EngineConfig) -> Self {
        LocalArtifactRepository {
            drives: config.drives,
            providers: ProviderResolver::new(config.external_roots),
        }
    }

    pub fn provider_type(&self, path: &Path) -> ProviderType {
        self.providers.resolve(path)
    }

    fn ready_drives(&self) -> Vec<DriveRoot> {
        drives::ready_drives(&self.drives)
    }

    /// All ready drives. Unready drives are skipped silently.
    pub fn get_drives(&self) -> Vec<FsArtifact> {
        self.ready_drives()
            .into_iter()
            .map(|drive| self.drive_artifact(drive))
            .collect()
    }

    fn drive_artifact(&self, drive: DriveRoot) -> FsArtifact {
        let provider = self.provider_type(&drive.path);
        let mut artifact = FsArtifact::new(drive.path, drive.name, ArtifactType::Drive, provider);
        artifact.last_modified = fs::metadata(&artifact.full_path)
            .ok()
            .and_then(|m| fs_ops::modified_local(&m));
        artifact
    }

    /// Resolve the type of `path`: file first, then drive root, then folder.
    pub fn get_artifact_type(&self, path: &Path) -> Option<ArtifactType> {
        if path.is_file() {
            return Some(ArtifactType::File);
        }
        if self.ready_drives().iter().any(|drive| drive.path == path) {
            return Some(ArtifactType::Drive);
        }
        if path.is_dir() {
            return Some(ArtifactType::Folder);
        }
        None
    }

    /// Snapshot of a single artifact.
    ///
    /// # Errors
    /// `ArtifactPathNull` for a blank path, `ArtifactDoesNotExist` when the
    /// path is neither a file, a drive nor a folder.
    pub fn get_artifact(&self, path: &Path) -> Result<FsArtifact, EngineError> {
        require_path(path, "artifact")?;

        let artifact_type = self
            .get_artifact_type(path)
            .ok_or_else(|| EngineError::ArtifactDoesNotExist {
                kind: "artifact",
                path: path.to_path_buf(),
            })?;

        match artifact_type {
            ArtifactType::Drive => {
                let drive = self
                    .ready_drives()
                    .into_iter()
                    .find(|drive| drive.path == path)
                    .ok_or_else(|| EngineError::does_not_exist(ArtifactType::Drive, path))?;
                Ok(self.drive_artifact(drive))
            }
            // The entry can vanish between the type check and the metadata read;
            // keep the type already found.
            ArtifactType::File | ArtifactType::Folder => {
                let metadata = fs::metadata(path).ok();
                Ok(self.entry_artifact(path, artifact_type, metadata.as_ref()))
            }
        }
    }

    pub(crate) fn entry_artifact(
        &self,
        path: &Path,
        artifact_type: ArtifactType,
        metadata: Option<&fs::Metadata>,
    ) -> FsArtifact {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let mut artifact = FsArtifact::new(path, name, artifact_type, self.provider_type(path));
        artifact.parent_full_path = path.parent().map(Path::to_path_buf);
        artifact.last_modified = metadata.and_then(fs_ops::modified_local);

        if artifact_type == ArtifactType::File {
            artifact.file_extension = dotted_extension(path);
            artifact.size = metadata.map(fs::Metadata::len);
        }
        artifact
    }

    /// Immediate children of `path`, produced lazily.
    ///
    /// A missing or blank path yields the drive list. Folders come before
    /// files, each group in the order the platform lists them. Hidden, system
    /// and temporary entries are skipped. A file path yields that file.
    ///
    /// # Errors
    /// `ArtifactDoesNotExist` for an unknown path, `ArtifactUnauthorizedAccess`
    /// when listing is refused. Other listing failures give an empty listing.
    pub fn get_artifacts<'a>(
        &'a self,
        path: Option<&Path>,
        cancel: Option<&'a CancellationToken>,
    ) -> Result<ChildArtifacts<'a>, EngineError> {
        let path = match path {
            Some(path) if !crate::naming::is_blank_path(path) => path,
            _ => {
                let pending = self.get_drives().into_iter().map(PendingChild::Ready).collect();
                return Ok(ChildArtifacts::new(self, pending, cancel));
            }
        };

        let artifact_type = self
            .get_artifact_type(path)
            .ok_or_else(|| EngineError::ArtifactDoesNotExist {
                kind: "artifact",
                path: path.to_path_buf(),
            })?;

        let pending = match artifact_type {
            ArtifactType::Folder | ArtifactType::Drive => {
                let (folders, files) = match list_entries(path) {
                    Ok(listing) => listing,
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                        return Err(EngineError::ArtifactUnauthorizedAccess {
                            path: path.to_path_buf(),
                        });
                    }
                    Err(e) => {
                        debug!(path = ?path, error = %e, "listing failed, returning no children");
                        (Vec::new(), Vec::new())
                    }
                };
                folders
                    .into_iter()
                    .map(|p| PendingChild::Entry(p, ArtifactType::Folder))
                    .chain(files.into_iter().map(|p| PendingChild::Entry(p, ArtifactType::File)))
                    .collect()
            }
            ArtifactType::File => VecDeque::from([PendingChild::Entry(
                path.to_path_buf(),
                ArtifactType::File,
            )]),
        };

        Ok(ChildArtifacts::new(self, pending, cancel))
    }

    /// Children of a folder for a transfer: files first, then subfolders,
    /// hidden entries included so that a move never leaves them behind.
    pub(crate) fn transfer_children(&self, folder: &Path) -> io::Result<Vec<FsArtifact>> {
        let (folders, files) = list_entries(folder)?;
        let mut children = Vec::with_capacity(files.len() + folders.len());
        for (paths, artifact_type) in [(files, ArtifactType::File), (folders, ArtifactType::Folder)] {
            for path in paths {
                let metadata = fs::metadata(&path).ok();
                children.push(self.entry_artifact(&path, artifact_type, metadata.as_ref()));
            }
        }
        Ok(children)
    }

    /// Create a file at `path` filled from `content`.
    ///
    /// # Errors
    /// In order: `StreamNull` for empty content, `ArtifactPathNull`,
    /// `ArtifactNameNull`, `ArtifactInvalidName`, `ArtifactAlreadyExists`.
    pub fn create_file<R: BufRead>(&self, path: &Path, mut content: R) -> Result<FsArtifact, EngineError> {
        if content.fill_buf()?.is_empty() {
            return Err(EngineError::StreamNull);
        }

        require_path(path, "file")?;

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if crate::naming::name_without_extension(&file_name).trim().is_empty() {
            return Err(EngineError::ArtifactNameNull);
        }

        if has_invalid_chars(&file_name) {
            return Err(EngineError::ArtifactInvalidName { name: file_name });
        }

        if fs::symlink_metadata(path).is_ok() {
            return Err(already_exists(ArtifactType::File, path));
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => already_exists(ArtifactType::File, path),
                _ => EngineError::WriteError {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?;

        let written = io::copy(&mut content, &mut file).map_err(|e| EngineError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
        drop(file);

        debug!(path = ?path, bytes = written, "created file");

        let metadata = fs::metadata(path).ok();
        let mut artifact = self.entry_artifact(path, ArtifactType::File, metadata.as_ref());
        artifact.size = Some(written);
        Ok(artifact)
    }

    /// Create several files in order. Stops at the first failure; a
    /// cancellation stops before the next file.
    pub fn create_files<I, R>(
        &self,
        files: I,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<FsArtifact>, EngineError>
    where
        I: IntoIterator<Item = (PathBuf, R)>,
        R: BufRead,
    {
        let mut created = Vec::new();
        for (path, content) in files {
            if is_cancelled(cancel) {
                break;
            }
            created.push(self.create_file(&path, content)?);
        }
        Ok(created)
    }

    /// Create folder `name` inside `parent`.
    pub fn create_folder(&self, parent: &Path, name: &str) -> Result<FsArtifact, EngineError> {
        require_path(parent, "folder")?;
        validate_name(name)?;

        let path = parent.join(name);
        if fs::symlink_metadata(&path).is_ok() {
            return Err(already_exists(ArtifactType::Folder, &path));
        }

        fs::create_dir_all(&path).map_err(|e| EngineError::DirectoryCreationFailed {
            path: path.clone(),
            source: e,
        })?;

        debug!(path = ?path, "created folder");

        let metadata = fs::metadata(&path).ok();
        Ok(self.entry_artifact(&path, ArtifactType::Folder, metadata.as_ref()))
    }

    /// Delete a file, or a folder recursively.
    ///
    /// # Errors
    /// `ArtifactPathNull`, `ArtifactDoesNotExist` when the disk does not hold
    /// an entry of the artifact's type, `CanNotModifyOrDeleteDrive` for drives.
    pub fn delete_artifact(&self, artifact: &FsArtifact) -> Result<(), EngineError> {
        require_path(&artifact.full_path, artifact.artifact_type.label())?;

        let path = &artifact.full_path;
        match artifact.artifact_type {
            ArtifactType::File if !path.is_file() => {
                Err(EngineError::does_not_exist(ArtifactType::File, path))
            }
            ArtifactType::Folder if !path.is_dir() => {
                Err(EngineError::does_not_exist(ArtifactType::Folder, path))
            }
            ArtifactType::File => fs_ops::remove_path(path, false),
            ArtifactType::Folder => fs_ops::remove_path(path, true),
            ArtifactType::Drive => Err(EngineError::CanNotModifyOrDeleteDrive { path: path.clone() }),
        }?;

        debug!(path = ?path, kind = %artifact.artifact_type, "deleted artifact");
        Ok(())
    }

    /// Delete a batch of artifacts in order, with one progress tick per
    /// artifact. A cancellation stops before the next artifact.
    ///
    /// Returns how many artifacts were deleted.
    pub fn delete_artifacts(
        &self,
        artifacts: &[FsArtifact],
        progress: Option<&dyn ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize, EngineError> {
        let mut counter = ProgressCounter::new(progress, artifacts.len());
        let mut deleted = 0;

        for artifact in artifacts {
            counter.start(&artifact.name);

            if is_cancelled(cancel) {
                info!(deleted, remaining = artifacts.len() - deleted, "delete cancelled");
                break;
            }

            self.delete_artifact(artifact)?;
            deleted += 1;
            counter.tick(&artifact.name);
        }
        Ok(deleted)
    }

    /// Rename a file within its folder. A new name without an extension keeps
    /// the current extension.
    pub fn rename_file(&self, path: &Path, new_name: &str) -> Result<FsArtifact, EngineError> {
        require_path(path, "file")?;

        if self.get_artifact_type(path) == Some(ArtifactType::Drive) {
            return Err(EngineError::CanNotModifyOrDeleteDrive {
                path: path.to_path_buf(),
            });
        }

        validate_name(new_name)?;

        if !path.is_file() {
            return Err(EngineError::does_not_exist(ArtifactType::File, path));
        }

        let new_file_name = match (Path::new(new_name).extension(), path.extension()) {
            (None, Some(ext)) => format!("{}.{}", new_name, ext.to_string_lossy()),
            _ => new_name.to_string(),
        };

        let new_path = sibling(path, &new_file_name);
        if fs::symlink_metadata(&new_path).is_ok() {
            return Err(already_exists(ArtifactType::File, &new_path));
        }

        rename(path, &new_path)?;

        let metadata = fs::metadata(&new_path).ok();
        Ok(self.entry_artifact(&new_path, ArtifactType::File, metadata.as_ref()))
    }

    /// Rename a folder within its parent.
    pub fn rename_folder(&self, path: &Path, new_name: &str) -> Result<FsArtifact, EngineError> {
        require_path(path, "folder")?;

        let artifact_type = self
            .get_artifact_type(path)
            .ok_or_else(|| EngineError::ArtifactTypeNull {
                path: path.to_path_buf(),
            })?;

        validate_name(new_name)?;

        if !path.is_dir() {
            return Err(EngineError::does_not_exist(ArtifactType::Folder, path));
        }

        if artifact_type == ArtifactType::Drive {
            return Err(EngineError::CanNotModifyOrDeleteDrive {
                path: path.to_path_buf(),
            });
        }

        let new_path = sibling(path, new_name);
        if fs::symlink_metadata(&new_path).is_ok() {
            return Err(already_exists(ArtifactType::Folder, &new_path));
        }

        rename(path, &new_path)?;

        let metadata = fs::metadata(&new_path).ok();
        Ok(self.entry_artifact(&new_path, ArtifactType::Folder, metadata.as_ref()))
    }

    /// Re-check known paths for external deletion or modification.
    ///
    /// # Errors
    /// A blank path aborts the whole batch with `ArtifactPathNull`; no
    /// partial result is returned.
    pub fn check_path_exists<P: AsRef<Path>>(
        &self,
        paths: &[P],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<FsArtifactChanges>, EngineError> {
        let mut changes = Vec::with_capacity(paths.len());

        for path in paths {
            if is_cancelled(cancel) {
                break;
            }

            let path = path.as_ref();
            require_path(path, "artifact")?;

            let change = match fs::metadata(path) {
                Ok(metadata) => FsArtifactChanges {
                    artifact_full_path: path.to_path_buf(),
                    is_path_exist: true,
                    last_modified: fs_ops::modified_local(&metadata),
                    changes_type: FsArtifactChangesType::Modify,
                },
                Err(_) => FsArtifactChanges {
                    artifact_full_path: path.to_path_buf(),
                    is_path_exist: false,
                    last_modified: None,
                    changes_type: FsArtifactChangesType::Delete,
                },
            };
            changes.push(change);
        }

        Ok(changes)
    }

    /// Open a file for buffered reading.
    pub fn get_file_content(&self, path: &Path) -> Result<BufReader<fs::File>, EngineError> {
        require_path(path, "file")?;

        if !path.is_file() {
            return Err(EngineError::does_not_exist(ArtifactType::File, path));
        }

        let file = fs::File::open(path).map_err(|e| EngineError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(BufReader::new(file))
    }
}

fn already_exists(kind: ArtifactType, path: &Path) -> EngineError {
    EngineError::ArtifactAlreadyExists {
        kind: kind.label(),
        path: path.to_path_buf(),
    }
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), EngineError> {
    fs::rename(from, to).map_err(|e| EngineError::ModifyFailed {
        path: from.to_path_buf(),
        source: e,
    })?;
    debug!(from = ?from, to = ?to, "renamed artifact");
    Ok(())
}

/// Split the entries of a folder into (folders, files), in listing order.
/// Unreadable entries are dropped.
fn list_entries(path: &Path) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut folders = Vec::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(path)? {
        let Ok(entry) = entry else { continue };
        let entry_path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(ft) if ft.is_symlink() => entry_path.is_dir(),
            Ok(ft) => ft.is_dir(),
            Err(_) => continue,
        };
        if is_dir {
            folders.push(entry_path);
        } else {
            files.push(entry_path);
        }
    }

    Ok((folders, files))
}

enum PendingChild {
    Ready(FsArtifact),
    Entry(PathBuf, ArtifactType),
}

/// Lazy listing returned by [`LocalArtifactRepository::get_artifacts`].
///
/// Metadata is read as items are pulled. Entries that disappear in the
/// meantime, and hidden entries, are skipped. The iterator ends early once
/// its cancellation token is set.
pub struct ChildArtifacts<'a> {
    repo: &'a LocalArtifactRepository,
    pending: VecDeque<PendingChild>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> ChildArtifacts<'a> {
    fn new(
        repo: &'a LocalArtifactRepository,
        pending: VecDeque<PendingChild>,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        ChildArtifacts {
            repo,
            pending,
            cancel,
        }
    }
}

impl Iterator for ChildArtifacts<'_> {
    type Item = FsArtifact;

    fn next(&mut self) -> Option<FsArtifact> {
        loop {
            if is_cancelled(self.cancel) {
                self.pending.clear();
                return None;
            }

            match self.pending.pop_front()? {
                PendingChild::Ready(artifact) => return Some(artifact),
                PendingChild::Entry(path, artifact_type) => {
                    let Ok(metadata) = fs::metadata(&path) else {
                        continue;
                    };
                    if fs_ops::is_hidden_entry(&path, &metadata) {
                        continue;
                    }
                    return Some(self.repo.entry_artifact(&path, artifact_type, Some(&metadata)));
                }
            }
        }
    }
}
