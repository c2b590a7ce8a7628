//! Hand-off files shared between pipeline stages.
//!
//! Each stage reads its predecessor's output from disk, so the stages can
//! also run as separate CLI invocations.

use std::path::{Path, PathBuf};

use codeguardian_core::GuardianError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Write `content` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`GuardianError::Io`] if a directory or the file cannot be
/// written.
pub fn write_text(path: &Path, content: &str) -> Result<(), GuardianError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
    Ok(())
}

/// Write `value` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`GuardianError::Serialization`] or [`GuardianError::Io`].
pub fn write_json_pretty<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), GuardianError> {
    write_text(path, &serde_json::to_string_pretty(value)?)
}

/// Write `value` as compact JSON.
///
/// # Errors
///
/// Returns [`GuardianError::Serialization`] or [`GuardianError::Io`].
pub fn write_json_compact<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), GuardianError> {
    write_text(path, &serde_json::to_string(value)?)
}

/// Read a text file.
///
/// # Errors
///
/// Returns [`GuardianError::MissingFiles`] if `path` does not exist, or
/// [`GuardianError::Io`] if it cannot be read.
pub fn read_text(path: &Path) -> Result<String, GuardianError> {
    require_files(&[path])?;
    Ok(std::fs::read_to_string(path)?)
}

/// Read and deserialize a JSON file.
///
/// # Errors
///
/// As [`read_text`], plus [`GuardianError::Serialization`] for malformed
/// JSON.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, GuardianError> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

/// Check that every path exists, reporting all missing ones at once.
///
/// # Errors
///
/// Returns [`GuardianError::MissingFiles`] listing each missing path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codeguardian_review::artifacts::require_files;
///
/// let err = require_files(&[Path::new("/no/such/a"), Path::new("/no/such/b")]).unwrap_err();
/// assert!(err.to_string().contains("/no/such/b"));
/// ```
pub fn require_files(paths: &[&Path]) -> Result<(), GuardianError> {
    let missing: Vec<PathBuf> = paths
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.to_path_buf())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GuardianError::MissingFiles(missing))
    }
}
