//! Local snapshot of the running configuration taken before the upload.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{Result, SwupError};

/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_hostname(hostname: &str) -> String {
    hostname
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Backup file name for a device at the current local time.
pub fn backup_file_name(hostname: &str) -> String {
    format!(
        "backup_{}_{}.txt",
        sanitize_hostname(hostname),
        Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Write the running configuration into `dir`. Returns the file path.
pub fn write_backup(dir: &Path, hostname: &str, config: &str) -> Result<PathBuf> {
    if config.trim().is_empty() {
        return Err(SwupError::Backup(
            "device returned an empty configuration".to_string(),
        ));
    }

    let path = dir.join(backup_file_name(hostname));
    std::fs::write(&path, config)
        .map_err(|e| SwupError::Backup(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), bytes = config.len(), "Configuration backed up");
    Ok(path)
}
