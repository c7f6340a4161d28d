mod config;
pub mod database;
pub mod migrations;
pub mod routine_catalog;

pub use config::{CalendarConfig, Config, RetryConfig, StorageConfig, SyncConfig};
pub use database::Database;
pub use routine_catalog::RoutineCatalog;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable selecting the `-dev` data directory.
pub const ENV_VAR: &str = "ROUTINECAL_ENV";
/// Environment variable overriding the data directory entirely.
pub const DATA_DIR_VAR: &str = "ROUTINECAL_DATA_DIR";

/// Returns `~/.config/routinecal[-dev]/` based on ROUTINECAL_ENV, or the
/// directory named by ROUTINECAL_DATA_DIR when set.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os(DATA_DIR_VAR) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var(ENV_VAR).unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("routinecal-dev")
            } else {
                base_dir.join("routinecal")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
