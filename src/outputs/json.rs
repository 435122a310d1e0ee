//! JSON snapshot writer.
//!
//! Snapshots are serialized with `serde_json`'s pretty printer, which leaves
//! non-ASCII text (Chinese titles, emoji) unescaped. The file is first
//! written next to its destination and then renamed over it, so a reader
//! never sees a half-written snapshot.

use crate::error::ScrapeError;
use crate::models::Snapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `snapshot` to `{output_dir}/{file_name}`, creating the directory
/// if needed and replacing any previous file.
///
/// # Arguments
///
/// * `snapshot` - The envelope and payload to write
/// * `output_dir` - Directory holding every snapshot
/// * `file_name` - Fixed per-source file name, e.g. `ptt-trends.json`
///
/// # Returns
///
/// The path written.
///
/// # Errors
///
/// [`ScrapeError::Write`] if serialization, directory creation, the
/// temporary write, or the final rename fails.
#[instrument(level = "info", skip(snapshot), fields(output_dir = %output_dir.display()))]
pub async fn write_snapshot<P: Serialize>(
    snapshot: &Snapshot<P>,
    output_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, ScrapeError> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| ScrapeError::Write(format!("serialize {file_name}: {e}")))?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create output dir");
        return Err(ScrapeError::Write(format!(
            "create {}: {e}",
            output_dir.display()
        )));
    }

    let final_path = output_dir.join(file_name);
    let tmp_path = output_dir.join(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| ScrapeError::Write(format!("write {}: {e}", tmp_path.display())))?;
    if let Err(e) = fs::rename(&tmp_path, &final_path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(ScrapeError::Write(format!(
            "rename into {}: {e}",
            final_path.display()
        )));
    }

    info!(path = %final_path.display(), bytes = json.len(), "Wrote snapshot");
    Ok(final_path)
}
