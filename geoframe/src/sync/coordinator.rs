//! One synchronization cycle.

use glam::DAffine3;
use tracing::{debug, error, info, warn};

use super::SyncError;
use crate::config::ConfigFile;
use crate::geo::{GeoReference, GeoReferenceModel};
use crate::host::Host;
use crate::math::{TransformClassifier, TransformKind};
use crate::terrain::{CropReport, TerrainCropEngine, TerrainHandles, TerrainPair};
use crate::tracker::TransformTracker;

/// Where the coordinator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Waiting for a change.
    #[default]
    Idle,
    /// Reading the transform delta.
    Computing,
    /// The delta was the identity; nothing to do.
    NoOp,
    /// Applying a rigid motion to the geo-reference and the source.
    Relocating,
    /// Regenerating the viewport content.
    Recropping,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Computing => "computing",
            SyncState::NoOp => "no-op",
            SyncState::Relocating => "relocating",
            SyncState::Recropping => "recropping",
        };
        f.write_str(name)
    }
}

/// What a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The viewport did not change.
    NoOp,
    /// The viewport moved; the geo-reference and source followed.
    Relocated {
        /// Geo-reference after the update.
        geo: GeoReference,
        /// The rigid motion that was applied.
        movement: DAffine3,
    },
    /// The viewport was resized and its content regenerated.
    Recropped(CropReport),
    /// The viewport or source no longer exists; nothing was done.
    Stale,
}

/// Runs delta → classify → dispatch inside one host operation.
#[derive(Debug)]
pub struct ChangeCoordinator {
    handles: TerrainHandles,
    tracker: TransformTracker,
    classifier: TransformClassifier,
    geo: GeoReferenceModel,
    crop: TerrainCropEngine,
    operation_name: String,
    state: SyncState,
    last_outcome: Option<CycleOutcome>,
}

impl ChangeCoordinator {
    /// Build a coordinator from configuration.
    pub fn new(config: &ConfigFile) -> Self {
        let tolerance = config.tolerance.length;
        Self {
            handles: TerrainHandles::new(
                &config.terrain.viewport_group,
                &config.terrain.source_group,
            ),
            tracker: TransformTracker::new(&config.tracking.namespace, &config.tracking.key),
            classifier: TransformClassifier::new(tolerance),
            geo: GeoReferenceModel::new(config.geo.north_compensation),
            crop: TerrainCropEngine::new(tolerance),
            operation_name: config.terrain.operation_name.clone(),
            state: SyncState::Idle,
            last_outcome: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Outcome of the most recent successful cycle.
    pub fn last_outcome(&self) -> Option<&CycleOutcome> {
        self.last_outcome.as_ref()
    }

    /// The geo-reference model used for relocation.
    pub fn geo_model(&self) -> &GeoReferenceModel {
        &self.geo
    }

    /// The transform tracker used for deltas.
    pub fn tracker(&self) -> &TransformTracker {
        &self.tracker
    }

    /// Resolve both groups and capture the viewport's baseline transform.
    ///
    /// Fails with [`SyncError::NotConfigured`] if either group is missing.
    pub fn attach<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<TerrainPair, SyncError> {
        let pair = self.handles.resolve(&*host)?;

        host.start_operation(&self.operation_name, true)?;
        match self.tracker.init_tracking(host, pair.viewport) {
            Ok(_) => host.commit_operation()?,
            Err(e) => {
                abort_quietly(host);
                return Err(e.into());
            }
        }

        info!(
            viewport = %pair.viewport,
            source = %pair.source,
            "Terrain synchronization attached"
        );
        Ok(pair)
    }

    /// Run one synchronization cycle.
    ///
    /// Everything the cycle changes, including the tracked baseline, is
    /// grouped in a single transparent operation. On error the operation is
    /// aborted, so the host rolls every change back, and the error returned.
    pub fn on_change<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<CycleOutcome, SyncError> {
        self.transition(SyncState::Computing);

        let Some(pair) = self.handles.refresh(&*host) else {
            warn!("Terrain groups are gone, skipping cycle");
            self.transition(SyncState::Idle);
            return Ok(CycleOutcome::Stale);
        };

        if let Err(e) = host.start_operation(&self.operation_name, true) {
            self.transition(SyncState::Idle);
            return Err(e.into());
        }

        let result = self.run_cycle(host, pair);
        let result = match result {
            Ok(outcome) => match host.commit_operation() {
                Ok(()) => Ok(outcome),
                Err(e) => {
                    abort_quietly(host);
                    Err(e.into())
                }
            },
            Err(e) => {
                error!(error = %e, "Synchronization cycle failed, rolling back");
                abort_quietly(host);
                Err(e)
            }
        };

        if let Ok(outcome) = &result {
            self.last_outcome = Some(outcome.clone());
        }
        self.transition(SyncState::Idle);
        result
    }

    fn run_cycle<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        pair: TerrainPair,
    ) -> Result<CycleOutcome, SyncError> {
        let delta = self.tracker.delta(host, pair.viewport)?;
        let kind = self.classifier.classify(&delta);
        debug!(kind = %kind, viewport = %pair.viewport, "Classified viewport change");

        match kind {
            TransformKind::Identity => {
                self.transition(SyncState::NoOp);
                Ok(CycleOutcome::NoOp)
            }
            TransformKind::Scaling => {
                self.transition(SyncState::Recropping);
                let report = self.crop.crop(host, pair.source, pair.viewport)?;
                info!(
                    footprint = %report.footprint,
                    erased_edges = report.erased_edges,
                    "Viewport re-cropped"
                );
                Ok(CycleOutcome::Recropped(report))
            }
            TransformKind::RigidMotion => {
                self.transition(SyncState::Relocating);
                let geo = self.geo.move_earth(host, &delta)?;
                host.transform_by(pair.source, delta)?;
                info!(geo = %geo, "Geo-reference relocated");
                Ok(CycleOutcome::Relocated {
                    geo,
                    movement: delta,
                })
            }
        }
    }

    fn transition(&mut self, next: SyncState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Sync state");
            self.state = next;
        }
    }
}

fn abort_quietly<H: Host + ?Sized>(host: &mut H) {
    if let Err(e) = host.abort_operation() {
        error!(error = %e, "Failed to abort operation");
    }
}
