//! Filesystem operations module.
//!
//! This module provides the low-level primitives the repository and the
//! transfer engine are built on:
//! - Copying files with modification-time preservation
//! - Creating directories
//! - Copying and removing symlinks without following them
//! - Hidden/system entry detection
//! - Path resolution and same-file detection for destination guards

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::error::EngineError;

/// Copy a file from source to destination, preserving its modification time.
///
/// An existing destination file is truncated and overwritten, unless it is
/// the source itself (reached through a link), which fails with
/// `SameDestinationFile` before anything is written.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    if is_same_file(src, dst) {
        return Err(EngineError::SameDestinationFile {
            path: src.to_path_buf(),
        });
    }

    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_mtime = src_file
        .metadata()
        .map_err(|e| EngineError::ReadError {
            path: src.to_path_buf(),
            source: e,
        })?
        .modified()
        .ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        if let Err(e) = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)) {
            tracing::debug!(path = ?dst, error = %e, "failed to preserve modification time");
        }
    }

    Ok(bytes_copied)
}

/// Create `path` and any missing ancestors.
///
/// # Errors
/// Fails if `path` exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Remove a file, or a folder with everything below it.
pub fn remove_path(path: &Path, is_dir: bool) -> Result<(), EngineError> {
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| EngineError::ModifyFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// True if `path` itself is a symbolic link (dangling or not).
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Recreate the link `src` at `dst` with the same target. The target is
/// neither read nor followed. An existing file or link at `dst` is replaced;
/// an existing folder is not.
pub fn copy_symlink(src: &Path, dst: &Path) -> Result<(), EngineError> {
    let target = fs::read_link(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    ensure_parent_dir_exists(dst)?;

    if let Ok(existing) = fs::symlink_metadata(dst) {
        if existing.is_dir() {
            return Err(EngineError::WriteError {
                path: dst.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "a folder is in the way"),
            });
        }
        remove_symlink(dst)?;
    }

    create_symlink(&target, src, dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })
}

#[cfg(unix)]
fn create_symlink(target: &Path, _src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(windows)]
fn create_symlink(target: &Path, src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(target, dst)
    } else {
        std::os::windows::fs::symlink_file(target, dst)
    }
}

/// Remove a link (or a plain file) without touching what it points to.
pub fn remove_symlink(path: &Path) -> Result<(), EngineError> {
    let result = fs::remove_file(path);
    // Directory links are removed as directories on Windows.
    #[cfg(windows)]
    let result = result.or_else(|_| fs::remove_dir(path));
    result.map_err(|e| EngineError::ModifyFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Modification time of an entry in local time, if the platform reports one.
pub fn modified_local(metadata: &fs::Metadata) -> Option<DateTime<Local>> {
    metadata.modified().ok().map(to_local)
}

pub fn to_local(time: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(time)
}

/// True for entries a file manager does not show: dot-files on Unix, and
/// hidden, system or temporary entries on Windows.
#[cfg(not(windows))]
pub fn is_hidden_entry(path: &Path, _metadata: &fs::Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

#[cfg(windows)]
pub fn is_hidden_entry(_path: &Path, metadata: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x100;

    metadata.file_attributes()
        & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM | FILE_ATTRIBUTE_TEMPORARY)
        != 0
}

/// Absolute path with every existing ancestor resolved through symlinks.
/// The last component is kept as is, so a link is not followed and the path
/// may name an entry that does not exist yet.
pub fn resolve_physical(path: &Path) -> io::Result<PathBuf> {
    let lexical = resolve_absolute(path)?;
    let (Some(parent), Some(name)) = (lexical.parent(), lexical.file_name()) else {
        return Ok(lexical);
    };

    let mut existing = parent;
    let mut missing = Vec::new();
    let mut resolved = loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => break canonical,
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(up), Some(component)) => {
                    missing.push(component);
                    existing = up;
                }
                _ => break existing.to_path_buf(),
            },
        }
    };

    for component in missing.iter().rev() {
        resolved.push(component);
    }
    resolved.push(name);
    Ok(resolved)
}

/// True if both paths exist and name the same file on disk (same device and
/// inode), however they are spelled.
#[cfg(unix)]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Make a path absolute and fold `.` and `..` lexically. Symlinks are not
/// followed, so the result can name a path that does not exist yet.
pub fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Ok(resolved)
}
