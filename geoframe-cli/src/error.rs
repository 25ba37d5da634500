//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use geoframe::config::ConfigFileError;
use geoframe::geo::GeoError;
use geoframe::sync::SyncError;
use geoframe::terrain::CropError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration error
    Config(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Projection of a point failed
    Geo(GeoError),
    /// Building the demo scene failed
    Scene(CropError),
    /// A synchronization cycle failed
    Sync(SyncError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Sync(SyncError::NotConfigured { .. }) = self {
            eprintln!();
            eprintln!("Check the [terrain] group names in your config file:");
            eprintln!("  geoframe config path");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Geo(e) => write!(f, "Projection failed: {}", e),
            CliError::Scene(e) => write!(f, "Failed to build demo scene: {}", e),
            CliError::Sync(e) => write!(f, "Synchronization failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Geo(e) => Some(e),
            CliError::Scene(e) => Some(e),
            CliError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<GeoError> for CliError {
    fn from(e: GeoError) -> Self {
        CliError::Geo(e)
    }
}

impl From<CropError> for CliError {
    fn from(e: CropError) -> Self {
        CliError::Scene(e)
    }
}

impl From<SyncError> for CliError {
    fn from(e: SyncError) -> Self {
        CliError::Sync(e)
    }
}
