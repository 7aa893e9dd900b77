//! Engine configuration.
//!
//! The configuration is a small TOML document describing the drive roots the
//! repository exposes and the mount roots that count as external storage:
//!
//! ```toml
//! external_roots = ["/media", "/mnt"]
//!
//! [[drives]]
//! path = "/"
//!
//! [[drives]]
//! path = "/media/usb"
//! label = "USB"
//! ```
//!
//! Every field is optional; missing fields take the platform defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("drive #{0} has an empty path")]
    EmptyDrivePath(usize),

    #[error("external root #{0} is empty")]
    EmptyExternalRoot(usize),
}

/// A drive root exposed by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Root path of the drive
    pub path: PathBuf,

    /// Volume label, shown as "<label> (<path>)"
    #[serde(default)]
    pub label: Option<String>,
}

/// Configuration of a [`LocalArtifactRepository`](crate::LocalArtifactRepository).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drive roots; platform roots are used when empty
    pub drives: Vec<DriveConfig>,

    /// Paths under these roots are classified as external storage
    pub external_roots: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            drives: Vec::new(),
            external_roots: default_external_roots(),
        }
    }
}

#[cfg(unix)]
fn default_external_roots() -> Vec<PathBuf> {
    ["/media", "/mnt", "/run/media"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

#[cfg(not(unix))]
fn default_external_roots() -> Vec<PathBuf> {
    Vec::new()
}

impl EngineConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a configuration document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, drive) in self.drives.iter().enumerate() {
            if is_blank(&drive.path) {
                return Err(ConfigError::EmptyDrivePath(index));
            }
        }
        for (index, root) in self.external_roots.iter().enumerate() {
            if is_blank(root) {
                return Err(ConfigError::EmptyExternalRoot(index));
            }
        }
        Ok(())
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
