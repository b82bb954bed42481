//! Writes bundle output into the configured output directory.
//!
//! Every emitted file is first written next to its target with a `.tmp`
//! suffix and renamed only once all of them are on disk, so a failed build
//! never leaves a half-written `vls.js` beside a stale source map. File names
//! coming out of the engine are cleaned and must stay inside the output
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use rolldown::BundleOutput;
use rolldown_common::Output;

use crate::{Error, Result};

/// Write every chunk and asset of `output` under `dir`, replacing existing files.
pub fn write_bundle_to(output: &BundleOutput, dir: &Path) -> Result<Vec<PathBuf>> {
    let files: Vec<(&str, &[u8])> = output
        .assets
        .iter()
        .map(|item| match item {
            Output::Asset(asset) => (asset.filename.as_str(), asset.source.as_bytes()),
            Output::Chunk(chunk) => (chunk.filename.as_str(), chunk.code.as_bytes()),
        })
        .collect();

    write_files(dir, &files)
}

/// Write named byte buffers under `dir`.
///
/// Returns the final paths in input order.
pub fn write_files(dir: &Path, files: &[(&str, &[u8])]) -> Result<Vec<PathBuf>> {
    let dir = normalize_dir(dir)?;

    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut operations = Vec::with_capacity(files.len());
    for (filename, content) in files {
        let target = validate_output_path(&dir, filename)?;
        operations.push((target, *content));
    }

    write_files_atomic(&operations)?;

    tracing::debug!(dir = %dir.display(), files = operations.len(), "bundle written");
    Ok(operations.into_iter().map(|(path, _)| path).collect())
}

fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }

    let cwd = std::env::current_dir().map_err(|e| {
        Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
    })?;
    Ok(cwd.join(cleaned).clean())
}

/// Resolve `filename` under `base_dir`, rejecting anything that escapes it.
fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();

    if !full_path.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files = Vec::with_capacity(operations.len());

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp = temp_path(target);
        fs::write(&temp, content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp.display(),
                e
            ))
        })?;

        temp_files.push((temp, target.clone()));
    }

    for (temp, target) in &temp_files {
        fs::rename(temp, target).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp.display(),
                target.display(),
                e
            ))
        })?;
    }

    Ok(())
}

fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp, _) in temp_files {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                tracing::warn!(
                    path = %temp.display(),
                    error = %e,
                    "failed to clean up temporary file"
                );
            }
        }
    }
}
