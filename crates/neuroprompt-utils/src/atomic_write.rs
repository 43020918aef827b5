//! Atomic file writes for stage artifacts and the run manifest
//!
//! Content goes to a temporary file in the target directory, is fsynced, then
//! renamed over the target. A reader therefore sees either the previous file or
//! the complete new one. Bytes are written exactly as given; artifacts must read
//! back identical to what the stage produced.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Number of bytes written to the target
    pub bytes_written: usize,
    /// Whether the copy fallback for cross-filesystem temp dirs was used
    pub used_cross_filesystem_fallback: bool,
}

/// Atomically write content to a file using temp file + fsync + rename.
///
/// Parent directories are created as needed.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let mut result = AtomicWriteResult {
        bytes_written: content.len(),
        ..AtomicWriteResult::default()
    };

    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;

    temp_file
        .write_all(content.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    match temp_file.persist(path.as_std_path()) {
        Ok(_) => {}
        Err(e) if is_cross_filesystem_error(&e.error) => {
            result.used_cross_filesystem_fallback = true;
            // The temp file is removed when `e.file` drops after the copy.
            cross_filesystem_copy_from_path(e.file.path(), path)?;
        }
        Err(e) => {
            return Err(anyhow::Error::new(e.error))
                .with_context(|| format!("Failed to atomically write file: {path}"));
        }
    }

    Ok(result)
}

/// Check if an error indicates a cross-filesystem rename
#[cfg(unix)]
fn is_cross_filesystem_error(err: &std::io::Error) -> bool {
    // EXDEV on Linux and macOS
    err.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &std::io::Error) -> bool {
    false
}

/// copy → fsync → rename, used when the temp file landed on another filesystem
fn cross_filesystem_copy_from_path(temp_path: &Path, target: &Utf8Path) -> Result<()> {
    let content = fs::read(temp_path)
        .with_context(|| "Failed to read temporary file for cross-filesystem copy")?;

    let target_dir = target.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut target_temp = NamedTempFile::new_in(target_dir)
        .with_context(|| format!("Failed to create temp file in target directory: {target_dir}"))?;

    target_temp
        .write_all(&content)
        .with_context(|| "Failed to write content during cross-filesystem copy")?;
    target_temp
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync during cross-filesystem copy")?;
    target_temp
        .persist(target.as_std_path())
        .map_err(|e| anyhow::Error::new(e.error))
        .with_context(|| format!("Failed to persist during cross-filesystem copy: {target}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_atomic_write_basic() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = utf8_dir(&temp_dir).join("generated_prompt.txt");

        let content = "Perspective: You are a senior editor\nRequest: Tighten this copy";
        let result = write_file_atomic(&file_path, content).unwrap();

        assert_eq!(result.bytes_written, content.len());
        assert!(!result.used_cross_filesystem_fallback);
        assert_eq!(fs::read_to_string(&file_path).unwrap(), content);
    }

    #[test]
    fn test_atomic_write_preserves_bytes_exactly() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = utf8_dir(&temp_dir).join("crlf.txt");

        let content = "line1\r\nline2\rline3 世界 🌍";
        write_file_atomic(&file_path, content).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), content);
    }

    #[test]
    fn test_atomic_write_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = utf8_dir(&temp_dir).join("data").join("runs").join("final_prompt.txt");

        write_file_atomic(&nested, "final").unwrap();

        assert!(nested.exists());
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = utf8_dir(&temp_dir).join("manifest.json");

        write_file_atomic(&file_path, "{\"artifacts\":[]}").unwrap();
        write_file_atomic(&file_path, "{\"artifacts\":[1]}").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"artifacts\":[1]}");
        let leftovers = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary files must not be left behind");
    }

    #[test]
    fn test_atomic_write_empty_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = utf8_dir(&temp_dir).join("empty.txt");

        let result = write_file_atomic(&file_path, "").unwrap();

        assert_eq!(result.bytes_written, 0);
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "");
    }
}
