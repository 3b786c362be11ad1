//! Engine configuration
//!
//! Everything tunable about the waveform display lives in [`EngineConfig`]:
//! zoom limits, marker span, bar style, synthetic fallback, and the decoded
//! peak resolution. It is stored as YAML next to the other per-user settings.
//!
//! ```ignore
//! use cuewave_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! let config = config.sanitized();
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path, CONFIG_FILE_NAME};
pub use settings::{EngineConfig, StyleConfig, SyntheticConfig, ZoomConfig};
