mod blob;
mod config;

pub use blob::{
    load_or_default, load_versioned, save_versioned, BlobStore, MemoryBlobStore, SqliteBlobStore,
    BLOB_VERSION, OCCURRENCE_LOG_KEY, SCHEDULES_KEY, SETTINGS_KEY,
};
pub use config::{
    AdherenceConfig, Config, ConflictsConfig, DosesConfig, LogConfig, RefillConfig, WaterConfig,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `CAREBELL_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/carebell[-dev]/`, with the `-dev` suffix when
/// `CAREBELL_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("CAREBELL_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("CAREBELL_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("carebell-dev")
            } else {
                base_dir.join("carebell")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
