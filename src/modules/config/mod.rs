pub mod settings;

pub use settings::{Backend, ConfigError, Settings, DEFAULT_CONFIG_FILE, MAX_CALIBRATION_TARGET_MS};
