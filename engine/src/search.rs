//! Deep search.
//!
//! A lazy walk over one subtree or every ready drive. Directories are read one
//! at a time from an explicit stack; a directory that can not be read is
//! skipped and the walk goes on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Local};
use tracing::debug;

use crate::cancel::{is_cancelled, CancellationToken};
use crate::fs_ops;
use crate::model::{ArtifactType, DeepSearchFilter, FsArtifact};
use crate::repository::LocalArtifactRepository;

impl DeepSearchFilter {
    /// True if `artifact` passes every filter that is set.
    pub fn matches(&self, artifact: &FsArtifact) -> bool {
        if let Some(text) = self.search_text.as_deref().filter(|t| !t.is_empty()) {
            if !artifact.name.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }

        if let Some(category) = self.category {
            match artifact.file_extension.as_deref() {
                Some(extension) if category.contains(extension) => {}
                _ => return false,
            }
        }

        if let Some(range) = self.date_range {
            // "now" is taken per candidate, so the window slides during a
            // long walk.
            let threshold = Local::now() - Duration::days(range.days());
            match artifact.last_modified {
                Some(modified) if modified >= threshold => {}
                _ => return false,
            }
        }

        true
    }
}

/// Lazy iterator over matching artifacts below a set of roots.
///
/// Roots themselves are never yielded. Single pass; ends early once the
/// cancellation token is set.
pub struct DeepSearch<'a> {
    repo: &'a LocalArtifactRepository,
    filter: DeepSearchFilter,
    cancel: Option<&'a CancellationToken>,
    roots: Vec<PathBuf>,
    stack: Vec<fs::ReadDir>,
}

impl<'a> DeepSearch<'a> {
    fn new(
        repo: &'a LocalArtifactRepository,
        mut roots: Vec<PathBuf>,
        filter: DeepSearchFilter,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        roots.reverse();
        DeepSearch {
            repo,
            filter,
            cancel,
            roots,
            stack: Vec::new(),
        }
    }

    fn open(&mut self, dir: &Path) {
        match fs::read_dir(dir) {
            Ok(entries) => self.stack.push(entries),
            Err(e) => debug!(path = ?dir, error = %e, "skipping unreadable folder"),
        }
    }
}

impl Iterator for DeepSearch<'_> {
    type Item = FsArtifact;

    fn next(&mut self) -> Option<FsArtifact> {
        loop {
            if is_cancelled(self.cancel) {
                self.stack.clear();
                self.roots.clear();
                return None;
            }

            let Some(entries) = self.stack.last_mut() else {
                let root = self.roots.pop()?;
                self.open(&root);
                continue;
            };

            let entry = match entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            let path = entry.path();
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            if fs_ops::is_hidden_entry(&path, &metadata) {
                continue;
            }

            let artifact_type = if metadata.is_dir() {
                // Symlinked folders are not followed.
                let is_link = entry.file_type().map(|ft| ft.is_symlink()).unwrap_or(false);
                if !is_link {
                    self.open(&path);
                }
                ArtifactType::Folder
            } else {
                ArtifactType::File
            };

            let artifact = self.repo.entry_artifact(&path, artifact_type, Some(&metadata));
            if self.filter.matches(&artifact) {
                return Some(artifact);
            }
        }
    }
}

impl LocalArtifactRepository {
    /// Search every ready drive.
    pub fn search_artifacts<'a>(
        &'a self,
        filter: DeepSearchFilter,
        cancel: Option<&'a CancellationToken>,
    ) -> DeepSearch<'a> {
        let roots = self
            .get_drives()
            .into_iter()
            .map(|drive| drive.full_path)
            .collect();
        DeepSearch::new(self, roots, filter, cancel)
    }

    /// Search below `root` only.
    pub fn search_in<'a>(
        &'a self,
        root: &Path,
        filter: DeepSearchFilter,
        cancel: Option<&'a CancellationToken>,
    ) -> DeepSearch<'a> {
        DeepSearch::new(self, vec![root.to_path_buf()], filter, cancel)
    }
}
