//! Simulate one viewport edit against the demo scene.

use clap::Args;
use glam::{DAffine3, DVec3};
use geoframe::config::ConfigFile;
use geoframe::geo::GeoReferenceModel;
use geoframe::host::memory::{demo_scene, MemoryHost};
use geoframe::host::{GroupId, HostError, SceneHost, Transactions};
use geoframe::sync::{ChangeCoordinator, CycleOutcome, ObserverBridge, SyncError};
use tracing::info;

use super::projection_for;
use crate::error::CliError;

const EDIT_OPERATION: &str = "Edit Terrain";

/// Arguments for `geoframe simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Uniform horizontal scale applied to the viewport
    #[arg(long, default_value = "1")]
    pub scale: f64,

    /// Rotation about Z in degrees, counter-clockwise
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub rotate: f64,

    /// Translation as X,Y,Z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    pub translate: Option<DVec3>,
}

impl SimulateArgs {
    /// The edit as a transform in the viewport's parent frame.
    fn edit(&self) -> Result<DAffine3, CliError> {
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            return Err(CliError::InvalidArgument(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        let translation = self.translate.unwrap_or(DVec3::ZERO);
        Ok(DAffine3::from_translation(translation)
            * DAffine3::from_rotation_z(self.rotate.to_radians())
            * DAffine3::from_scale(DVec3::new(self.scale, self.scale, 1.0)))
    }
}

/// Parse `X,Y,Z` into a vector.
fn parse_vec3(value: &str) -> Result<DVec3, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected X,Y,Z, got '{}'", value));
    }
    let mut coords = [0.0; 3];
    for (coord, part) in coords.iter_mut().zip(&parts) {
        *coord = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok(DVec3::from_array(coords))
}

/// Apply `edit` as a user operation, the way an interactive move would.
fn apply_edit(host: &mut MemoryHost, viewport: GroupId, edit: DAffine3) -> Result<(), HostError> {
    host.start_operation(EDIT_OPERATION, false)?;
    if let Err(e) = host.transform_by(viewport, edit) {
        host.abort_operation()?;
        return Err(e);
    }
    host.commit_operation()
}

/// Build the demo scene, apply the edit and run one synchronization tick.
pub fn run(args: SimulateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let edit = args.edit()?;

    let (host, scene) = demo_scene()?;
    let mut host = host.with_projection(projection_for(config.geo.north_compensation));
    let geo = GeoReferenceModel::new(config.geo.north_compensation);

    let mut bridge = ObserverBridge::new(ChangeCoordinator::new(config));
    bridge.coordinator_mut().attach(&mut host)?;
    bridge
        .attach(&mut host, scene.viewport)
        .map_err(SyncError::from)?;

    println!("Before: {}", geo.snapshot(&host));
    println!(
        "        viewport {}",
        host.world_bounds(scene.viewport).map_err(SyncError::from)?
    );

    info!(operation = EDIT_OPERATION, "Applying viewport edit");
    apply_edit(&mut host, scene.viewport, edit).map_err(SyncError::from)?;

    let outcome = bridge.run_pending(&mut host)?;
    match &outcome {
        None => println!("Outcome: nothing to do"),
        Some(CycleOutcome::NoOp) => println!("Outcome: no change"),
        Some(CycleOutcome::Stale) => println!("Outcome: terrain groups missing"),
        Some(CycleOutcome::Relocated { .. }) => println!("Outcome: relocated"),
        Some(CycleOutcome::Recropped(report)) => println!(
            "Outcome: re-cropped to {} ({} edges erased)",
            report.footprint, report.erased_edges
        ),
    }

    println!("After:  {}", geo.snapshot(&host));
    println!(
        "        viewport {}",
        host.world_bounds(scene.viewport).map_err(SyncError::from)?
    );
    println!(
        "        viewport faces {}",
        host.face_count(scene.viewport).map_err(SyncError::from)?
    );

    let stats = bridge.stats();
    println!(
        "Notifications: {} received, {} coalesced, {} ignored during the cycle",
        stats.received, stats.coalesced, stats.inhibited
    );
    Ok(())
}
