//! File operation utilities
//!
//! Centralized file handling so every writer in the pipeline creates
//! directories, stages partial files and appends ledger lines the same way.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{ExportError, FileOperation, Result};

/// Create a temporary file path for partial downloads
///
/// `photo.jpg` stages as `photo.jpg.part`, so assets that differ only by
/// extension never share a temp file.
pub fn create_temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest_path.with_file_name(name)
}

/// Atomically rename a temporary file to its final destination
pub async fn atomic_rename(temp_path: &Path, dest_path: &Path) -> Result<()> {
    fs::rename(temp_path, dest_path)
        .await
        .map_err(ExportError::file_system(dest_path, FileOperation::Move))?;
    debug!("Atomically renamed {} to {}", temp_path.display(), dest_path.display());
    Ok(())
}

/// Create a directory and all of its parents
pub async fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(ExportError::file_system(path, FileOperation::CreateDir))
}

/// Check whether a file is already present on disk
pub async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Write a file, replacing any previous contents
pub async fn write_replacing(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .await
        .map_err(ExportError::file_system(path, FileOperation::Write))
}

/// Append lines to a text file, creating it (and its directory) when absent
pub async fn append_lines(path: &Path, lines: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(ExportError::file_system(path, FileOperation::Append))?;

    let mut buffer = String::new();
    for line in lines {
        buffer.push_str(line);
        buffer.push('\n');
    }
    file.write_all(buffer.as_bytes())
        .await
        .map_err(ExportError::file_system(path, FileOperation::Append))?;
    file.flush()
        .await
        .map_err(ExportError::file_system(path, FileOperation::Append))
}

/// Read a text file as non-empty lines; a missing file reads as empty
pub async fn read_lines(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ExportError::file_system(path, FileOperation::Read)(e)),
    }
}
