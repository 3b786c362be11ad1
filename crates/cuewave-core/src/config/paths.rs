//! Where cuewave keeps its configuration

use std::path::PathBuf;

/// File name of the engine configuration
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Per-user cuewave configuration directory
///
/// Returns: `<platform config dir>/cuewave`, falling back to `./cuewave`
/// when the platform has no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cuewave")
}

/// Default location of the engine configuration file
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}
