//! Configuration for geoframe.
//!
//! Settings are read from `~/.geoframe/config.ini`; every key is optional and
//! falls back to the defaults in [`defaults`].
//!
//! # Example
//!
//! ```
//! use geoframe::config::{ConfigFile, DEFAULT_TOLERANCE};
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.tolerance.length, DEFAULT_TOLERANCE);
//! assert_eq!(config.terrain.viewport_group, "Terrain");
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_log_directory, DEFAULT_LOG_FILE, DEFAULT_LOG_LEVEL, DEFAULT_OPERATION_NAME,
    DEFAULT_SOURCE_GROUP, DEFAULT_TOLERANCE, DEFAULT_VIEWPORT_GROUP,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, GeoSettings, LoggingSettings, TerrainSettings, ToleranceSettings,
    TrackingSettings,
};
