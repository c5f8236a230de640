//! Filesystem utilities.
//!
//! Safe primitives shared by the file-backed collaborators:
//! - validation of lesson ids and relative resource paths before they touch disk
//! - crash-tolerant writes for the persistent cache and settings

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Path Validation Utilities
// =============================================================================

/// Validates that an identifier component is safe to use in resource paths.
///
/// Rejects empty identifiers, traversal sequences (`..`), path separators,
/// drive letter indicators and control characters.
pub fn validate_path_id_component(id: &str, label: &str) -> Result<(), String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(format!("{label} is empty or contains only whitespace"));
    }
    if trimmed.contains("..")
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains(':')
    {
        return Err(format!(
            "Invalid {label}: contains path traversal characters"
        ));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(format!("Invalid {label}: contains control characters"));
    }
    Ok(())
}

/// Resolves a relative resource URL (e.g. `subtitles/psalm_1/v.1_psalm_1_en.srt`)
/// below `root`.
///
/// Only plain components are accepted, so the result can never leave `root`.
pub fn resolve_resource_path(root: &Path, url: &str) -> Result<PathBuf, String> {
    let trimmed = url.trim().trim_start_matches("./");
    if trimmed.is_empty() {
        return Err("resource path is empty".to_string());
    }
    if trimmed.contains("://") {
        return Err(format!("resource path must be relative: {trimmed}"));
    }

    let relative = Path::new(trimmed);
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            _ => {
                return Err(format!(
                    "resource path contains a non-plain component: {trimmed}"
                ))
            }
        }
    }

    Ok(resolved)
}

/// Default directory for the persistent caption cache.
///
/// "dirs" is best-effort and may return None in sandboxed environments.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("psalmody"))
        .unwrap_or_else(|| PathBuf::from(".psalmody-cache"))
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Write bytes to `path` using an atomic replace pattern.
///
/// - Write to a sibling temporary file.
/// - Flush and sync the temp file.
/// - Swap into place by renaming.
/// - If the destination exists, it is first moved aside as a `.bak` file, then removed.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = sibling_with_suffix(path, "tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut sibling = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| suffix.to_string());
    sibling.set_file_name(format!("{file_name}.{suffix}"));
    sibling
}

fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    // Windows: rename-over-existing may fail depending on filesystem; use a backup swap.
    let bak = sibling_with_suffix(dest, "bak");
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_bytes_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        atomic_write_bytes(&path, b"one").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");

        atomic_write_bytes(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert!(!sibling_with_suffix(&path, "bak").exists());
    }

    // =========================================================================
    // Path Validation Tests
    // =========================================================================

    #[test]
    fn test_validate_path_id_component() {
        assert!(validate_path_id_component("23", "lessonId").is_ok());
        assert!(validate_path_id_component("", "lessonId").is_err());
        assert!(validate_path_id_component("../etc", "lessonId").is_err());
        assert!(validate_path_id_component("a/b", "lessonId").is_err());
        assert!(validate_path_id_component("c:", "lessonId").is_err());
        assert!(validate_path_id_component("1\n", "lessonId").is_ok());
        assert!(validate_path_id_component("1\u{0}2", "lessonId").is_err());
    }

    #[test]
    fn test_resolve_resource_path_stays_below_root() {
        let root = Path::new("/srv/lessons");
        assert_eq!(
            resolve_resource_path(root, "subtitles/psalm_1/v.1_psalm_1_en.srt").unwrap(),
            PathBuf::from("/srv/lessons/subtitles/psalm_1/v.1_psalm_1_en.srt")
        );
        assert_eq!(
            resolve_resource_path(root, "./psalm-config.json").unwrap(),
            PathBuf::from("/srv/lessons/psalm-config.json")
        );
        assert!(resolve_resource_path(root, "../secret").is_err());
        assert!(resolve_resource_path(root, "/etc/passwd").is_err());
        assert!(resolve_resource_path(root, "https://example.com/a.srt").is_err());
        assert!(resolve_resource_path(root, "  ").is_err());
    }
}
