//! Default values for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::geo::NorthCompensation;
use crate::tracker::{DEFAULT_KEY, DEFAULT_NAMESPACE};

/// Default viewport group name.
pub const DEFAULT_VIEWPORT_GROUP: &str = "Terrain";

/// Default source group name.
pub const DEFAULT_SOURCE_GROUP: &str = "Terrain Data";

/// Default undo name of a synchronization cycle.
pub const DEFAULT_OPERATION_NAME: &str = "Terrain Sync";

/// Default length tolerance in host units.
pub const DEFAULT_TOLERANCE: f64 = 0.001;

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "geoframe.log";

/// Default log directory (~/.geoframe/logs).
pub fn default_log_directory() -> PathBuf {
    super::file::config_directory().join("logs")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            terrain: TerrainSettings {
                viewport_group: DEFAULT_VIEWPORT_GROUP.to_string(),
                source_group: DEFAULT_SOURCE_GROUP.to_string(),
                operation_name: DEFAULT_OPERATION_NAME.to_string(),
            },
            tolerance: ToleranceSettings {
                length: DEFAULT_TOLERANCE,
            },
            geo: GeoSettings {
                north_compensation: NorthCompensation::DoubleAngle,
            },
            tracking: TrackingSettings {
                namespace: DEFAULT_NAMESPACE.to_string(),
                key: DEFAULT_KEY.to_string(),
            },
            logging: LoggingSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                directory: default_log_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
