//! Ready-made terrain scene for examples, the CLI and tests.

use super::MemoryHost;
use crate::geo::LatLong;
use crate::host::{GroupId, SceneHost};
use crate::terrain::{CropError, TerrainCropEngine};

/// Geo-location of the demo model's origin (Stockholm).
pub const DEMO_ORIGIN: LatLong = LatLong {
    latitude: 59.3293,
    longitude: 18.0686,
};

/// Height of the demo model's origin.
pub const DEMO_HEIGHT: f64 = 28.0;

/// Half the width of the demo source dataset.
pub const DEMO_SOURCE_HALF_EXTENT: f64 = 50.0;

/// Grid spacing of the demo source dataset.
pub const DEMO_SOURCE_SPACING: f64 = 5.0;

/// Half the width of the demo viewport.
pub const DEMO_VIEWPORT_HALF_EXTENT: f64 = 10.0;

/// Handles into a scene built by [`demo_scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoScene {
    /// The `Terrain` group.
    pub viewport: GroupId,
    /// The `Terrain Data` group.
    pub source: GroupId,
}

/// Two hills and a hollow.
fn demo_height(x: f64, y: f64) -> f64 {
    let bump = |cx: f64, cy: f64, radius: f64| {
        let d2 = (x - cx).powi(2) + (y - cy).powi(2);
        (-d2 / (radius * radius)).exp()
    };
    12.0 * bump(5.0, 5.0, 8.0) + 6.0 * bump(-30.0, 20.0, 12.0) - 4.0 * bump(-5.0, -5.0, 6.0)
}

/// Build a model with a `Terrain Data` height field and a `Terrain`
/// viewport already cropped to its central square.
pub fn demo_scene() -> Result<(MemoryHost, DemoScene), CropError> {
    let mut host = MemoryHost::new().with_location(DEMO_ORIGIN, DEMO_HEIGHT, 0.0);

    let source = host.add_top_level_group("Terrain Data");
    host.add_terrain_grid(
        source,
        DEMO_SOURCE_HALF_EXTENT,
        DEMO_SOURCE_SPACING,
        demo_height,
    )?;

    let viewport = host.add_top_level_group("Terrain");
    let half = DEMO_VIEWPORT_HALF_EXTENT;
    host.add_face(
        viewport,
        &[
            glam::DVec3::new(-half, -half, 0.0),
            glam::DVec3::new(half, -half, 0.0),
            glam::DVec3::new(half, half, 0.0),
            glam::DVec3::new(-half, half, 0.0),
        ],
    )?;
    TerrainCropEngine::new(crate::config::DEFAULT_TOLERANCE).crop(&mut host, source, viewport)?;

    Ok((host, DemoScene { viewport, source }))
}
