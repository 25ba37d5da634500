//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::geo::NorthCompensation;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Group names and operation naming
    pub terrain: TerrainSettings,
    /// Length tolerance for classification and cropping
    pub tolerance: ToleranceSettings,
    /// Geo-reference projection settings
    pub geo: GeoSettings,
    /// Where transform baselines are stored
    pub tracking: TrackingSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Terrain group configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainSettings {
    /// Name of the user-edited viewport group
    pub viewport_group: String,
    /// Name of the hidden source data group
    pub source_group: String,
    /// Undo name of a synchronization cycle
    pub operation_name: String,
}

/// Tolerance configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceSettings {
    /// Length in host units below which a change counts as none
    pub length: f64,
}

/// Geo-reference configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoSettings {
    /// Adapter applied before the host's point → UTM projection
    pub north_compensation: NorthCompensation,
}

/// Transform tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSettings {
    /// Attribute dictionary name
    pub namespace: String,
    /// Attribute key holding the baseline
    pub key: String,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter when RUST_LOG is not set
    pub level: String,
    /// Directory for the log file
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}
