//! File system helpers for materializing generated stacks.
//!
//! Output files are written with a temp-file-and-rename strategy so a generated
//! stack never contains a half-written `docker-compose.yml` or `devcontainer.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::DevcError;

/// Creates `path` and its parents if missing.
///
/// # Errors
///
/// Fails when the directory cannot be created or `path` exists as a file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Atomically writes a string to a file.
///
/// # Errors
///
/// See [`atomic_write`].
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Writes bytes to a sibling temp file, syncs it, and renames it over `path`.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Fails when the temp file cannot be created, written, synced or persisted.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().with_context(|| "Failed to sync file to disk")?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// Reads a UTF-8 file, reporting the path on failure.
///
/// # Errors
///
/// Returns [`DevcError::FileUnreadable`] when the file cannot be read.
pub fn read_text_file(path: &Path) -> Result<String, DevcError> {
    fs::read_to_string(path).map_err(|e| DevcError::FileUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Regular files under `root`, as sorted paths relative to `root`.
///
/// Symlinks are not followed.
///
/// # Errors
///
/// Fails when a directory cannot be read.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", root.display()))?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Recursively copies the regular files of `src` into `dst`.
///
/// Returns the copied paths relative to `dst`.
///
/// # Errors
///
/// Fails when any directory cannot be read or any file cannot be copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<Vec<PathBuf>> {
    ensure_dir(dst)?;
    let files = list_files(src)?;
    for relative in &files {
        let target = dst.join(relative);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(src.join(relative), &target).with_context(|| {
            format!("Failed to copy file from {} to {}", src.join(relative).display(), target.display())
        })?;
    }
    tracing::debug!("Copied {} file(s) from {} to {}", files.len(), src.display(), dst.display());
    Ok(files)
}

/// Prepares an output directory for a fresh stack.
///
/// A missing directory is created and an empty one is reused. A non-empty one is
/// refused unless `force` is set, in which case its contents are removed.
///
/// # Errors
///
/// Returns [`DevcError::OutputExists`] when the directory has contents and
/// `force` is not set, or an IO error when it cannot be emptied or created.
pub fn prepare_output_dir(path: &Path, force: bool) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(anyhow::anyhow!("Output path exists but is not a directory: {}", path.display()));
        }
        let has_contents = fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {}", path.display()))?
            .next()
            .is_some();
        if !has_contents {
            return Ok(());
        }
        if !force {
            return Err(DevcError::OutputExists {
                path: path.display().to_string(),
            }
            .into());
        }
        for entry in fs::read_dir(path).with_context(|| format!("Failed to read directory: {}", path.display()))? {
            let entry = entry?;
            let entry_path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&entry_path)
                    .with_context(|| format!("Failed to remove directory: {}", entry_path.display()))?;
            } else {
                fs::remove_file(&entry_path)
                    .with_context(|| format!("Failed to remove file: {}", entry_path.display()))?;
            }
        }
        tracing::debug!("Emptied existing output directory {}", path.display());
        Ok(())
    } else {
        ensure_dir(path)
    }
}
