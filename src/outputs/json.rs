//! JSON output for graph database import.
//!
//! Records are written as one pretty-printed JSON array per file. Non-ASCII
//! text is kept as UTF-8. The file is written beside its final name and
//! renamed into place, so an interrupted run leaves the previous file intact.

use crate::utils::backup_file;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `records` to `{output_dir}/{filename}` and return the path.
///
/// The directory is created if needed. With `backup` set, an existing file
/// is first copied to `{filename}.bak`.
///
/// # Arguments
///
/// * `records` - Records serialised as one pretty-printed JSON array
/// * `output_dir` - Directory holding the output file
/// * `filename` - Output file name inside `output_dir`
/// * `backup` - Copy an existing file to `.bak` before replacing it
///
/// # Returns
///
/// The path of the written file.
///
/// # Errors
///
/// Returns an error if serialisation or directory creation fails, or if the
/// backup copy, the write or the final rename fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %filename, count = records.len()))]
pub async fn write_records<T: Serialize>(
    records: &[T],
    output_dir: &Path,
    filename: &str,
    backup: bool,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(records)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = output_dir.join(filename);
    if backup {
        backup_file(&path).await?;
    }

    let tmp_path = output_dir.join(format!("{filename}.tmp"));
    fs::write(&tmp_path, json).await?;
    fs::rename(&tmp_path, &path).await?;
    info!(path = %path.display(), "Wrote JSON file");

    Ok(path)
}
