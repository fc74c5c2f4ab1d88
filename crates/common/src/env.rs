//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup, plus
//! small helpers for values read from the environment.

use std::path::Path;

use tracing::warn;

/// Ensure the parent directory of a file-backed store exists.
pub async fn ensure_data_dir(file_path: &str) -> anyhow::Result<()> {
    let Some(parent) = Path::new(file_path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    if tokio::fs::metadata(parent).await.is_err() {
        warn!(dir = %parent.display(), "data directory missing; creating it");
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    Ok(())
}

/// Restore newlines in a PEM key that was flattened into a single env line.
pub fn unescape_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}
