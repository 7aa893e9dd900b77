//! Drive enumeration.
//!
//! Drive roots come from [`EngineConfig::drives`](crate::EngineConfig) when
//! configured, otherwise from the platform: `/` on Unix and every existing
//! drive letter on Windows. A drive is ready when its root can be listed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DriveConfig;

/// A ready drive root and its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveRoot {
    pub path: PathBuf,
    pub name: String,
}

/// Ready drives among `configured`, or among the platform roots when
/// nothing is configured. Unready roots are skipped.
pub fn ready_drives(configured: &[DriveConfig]) -> Vec<DriveRoot> {
    let candidates = if configured.is_empty() {
        platform_roots()
    } else {
        configured.to_vec()
    };

    candidates
        .into_iter()
        .filter(|drive| is_ready(&drive.path))
        .map(|drive| DriveRoot {
            name: drive_name(&drive.path, drive.label.as_deref()),
            path: drive.path,
        })
        .collect()
}

fn is_ready(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(path = ?path, error = %e, "skipping drive that is not ready");
            false
        }
    }
}

/// "<label> (<path>)" with a label, otherwise the bare path. A trailing
/// separator is dropped from the displayed path, except for a bare root.
pub fn drive_name(path: &Path, label: Option<&str>) -> String {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(std::path::MAIN_SEPARATOR);
    let display = if trimmed.is_empty() { raw.as_ref() } else { trimmed };

    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => format!("{} ({})", label, display),
        None => display.to_string(),
    }
}

#[cfg(windows)]
fn platform_roots() -> Vec<DriveConfig> {
    (b'A'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|path| path.exists())
        .map(|path| DriveConfig { path, label: None })
        .collect()
}

#[cfg(not(windows))]
fn platform_roots() -> Vec<DriveConfig> {
    vec![DriveConfig {
        path: PathBuf::from("/"),
        label: None,
    }]
}
