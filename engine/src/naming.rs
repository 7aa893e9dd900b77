//! Path and name validation shared by create and rename operations.

use std::path::Path;

use crate::error::EngineError;

#[cfg(windows)]
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

#[cfg(not(windows))]
const RESERVED_CHARS: &[char] = &['/', '\0'];

/// True when the path is empty or only whitespace.
pub fn is_blank_path(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

/// True when `name` contains a reserved character anywhere.
pub fn has_invalid_chars(name: &str) -> bool {
    name.chars()
        .any(|c| RESERVED_CHARS.contains(&c) || (cfg!(windows) && c.is_control()))
}

/// `name` up to its last dot. A name that is only an extension, such as
/// `.txt`, has an empty stem.
pub fn name_without_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

pub(crate) fn require_path(path: &Path, kind: &'static str) -> Result<(), EngineError> {
    if is_blank_path(path) {
        return Err(EngineError::path_null(kind));
    }
    Ok(())
}

/// Name ladder: blank → `ArtifactNameNull`, reserved chars → `ArtifactInvalidName`.
pub(crate) fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::ArtifactNameNull);
    }
    if has_invalid_chars(name) {
        return Err(EngineError::ArtifactInvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
