//! Viewport synchronization.
//!
//! This module turns raw host change notifications into one atomic update of
//! the geo-reference or the viewport content:
//!
//! ```text
//! host observer ──► ChangeNotifier ──(channel)──► ObserverBridge::run_pending
//!                                                        │
//!                                                        ▼
//!                                          ChangeCoordinator::on_change
//!                                   delta ─► classify ─► move_earth | crop
//! ```
//!
//! # Example
//!
//! ```
//! use geoframe::config::ConfigFile;
//! use geoframe::host::memory::demo_scene;
//! use geoframe::sync::{ChangeCoordinator, ObserverBridge};
//!
//! let (mut host, scene) = demo_scene().unwrap();
//! let mut bridge = ObserverBridge::new(ChangeCoordinator::new(&ConfigFile::default()));
//! bridge.coordinator_mut().attach(&mut host).unwrap();
//! bridge.attach(&mut host, scene.viewport).unwrap();
//!
//! // Nothing changed yet, so there is nothing to run.
//! assert!(bridge.run_pending(&mut host).unwrap().is_none());
//! ```

mod bridge;
mod coordinator;

pub use bridge::{BridgeStats, ChangeNotice, ChangeNotifier, ObserverBridge};
pub use coordinator::{ChangeCoordinator, CycleOutcome, SyncState};

use thiserror::Error;

use crate::geo::GeoError;
use crate::host::HostError;
use crate::math::MathError;
use crate::terrain::{CropError, TerrainRole};
use crate::tracker::TrackerError;

/// Errors from a synchronization cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required group could not be found by name.
    #[error("{role} group '{name}' not found in the model")]
    NotConfigured { role: TerrainRole, name: String },

    /// The host rejected an edit or transaction call.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Reading or writing the tracked baseline failed.
    #[error("transform tracking failed: {0}")]
    Tracker(#[from] TrackerError),

    /// Updating the geo-reference failed.
    #[error("geo-reference update failed: {0}")]
    Geo(#[from] GeoError),

    /// Re-cropping the viewport failed.
    #[error("crop failed: {0}")]
    Crop(#[from] CropError),

    /// Transform math failed.
    #[error(transparent)]
    Math(#[from] MathError),
}
