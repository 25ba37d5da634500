//! Re-cropping the viewport from the source dataset.

use glam::DVec3;
use thiserror::Error;
use tracing::{debug, warn};

use crate::host::{EdgeId, GroupId, HostError, SceneHost};
use crate::math::{try_inverse, BoundingBox, MathError};

/// Errors from cropping.
#[derive(Debug, Error)]
pub enum CropError {
    /// The viewport has no horizontal extent to crop to.
    #[error("viewport {0} has an empty footprint")]
    EmptyFootprint(GroupId),

    /// A host geometry call failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The source could not be placed in the viewport frame.
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Result of a crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropReport {
    /// Kept region in the viewport's frame: the viewport's old footprint
    /// with the copied content's vertical extent.
    pub footprint: BoundingBox,
    /// Edges removed because they fell outside the footprint.
    pub erased_edges: usize,
}

/// Regenerates a viewport's content from a larger source group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainCropEngine {
    tolerance: f64,
}

impl TerrainCropEngine {
    /// Create an engine using `tolerance` as the length slack for
    /// containment tests and cutter padding.
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// Replace `target`'s content with the part of `source` inside
    /// `target`'s current footprint.
    ///
    /// The footprint is taken from `target`'s content in its own frame, so a
    /// resize through the group transform widens the crop in world space. The
    /// vertical extent comes from the source, never from the old content.
    pub fn crop<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        source: GroupId,
        target: GroupId,
    ) -> Result<CropReport, CropError> {
        let original = host.content_bounds(target)?;
        if original.is_empty() || original.width() <= self.tolerance || original.depth() <= self.tolerance
        {
            return Err(CropError::EmptyFootprint(target));
        }

        let placement = try_inverse(&host.transform(target)?)? * host.transform(source)?;

        host.clear(target)?;
        let instance = host.add_instance(target, source, placement)?;
        host.explode(instance)?;

        let copied = host.content_bounds(target)?;
        if copied.is_empty() {
            warn!(source = %source, target = %target, "Source has no content, viewport left empty");
            return Ok(CropReport {
                footprint: original,
                erased_edges: 0,
            });
        }

        let combined = original.with_vertical_extent(copied.min.z, copied.max.z);
        debug!(
            original = %original,
            combined = %combined,
            "Cropping source content to viewport footprint"
        );

        let cutter = self.build_cutter(host, target, &combined)?;
        host.intersect_with(target, cutter)?;
        let erased_edges = self.erase_outside(host, target, &combined);
        host.erase(cutter)?;

        Ok(CropReport {
            footprint: combined,
            erased_edges,
        })
    }

    /// Closed box over `bounds`, padded vertically by the tolerance.
    fn build_cutter<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        target: GroupId,
        bounds: &BoundingBox,
    ) -> Result<GroupId, HostError> {
        let bottom = bounds.min.z - self.tolerance;
        let height = bounds.height() + 2.0 * self.tolerance;

        let cutter = host.add_group(target)?;
        let base = [
            DVec3::new(bounds.min.x, bounds.min.y, bottom),
            DVec3::new(bounds.max.x, bounds.min.y, bottom),
            DVec3::new(bounds.max.x, bounds.max.y, bottom),
            DVec3::new(bounds.min.x, bounds.max.y, bottom),
        ];
        let face = host.add_face(cutter, &base)?;
        if host.face_normal(cutter, face)?.z < 0.0 {
            host.reverse_face(cutter, face)?;
        }
        host.pushpull(cutter, face, height)?;
        Ok(cutter)
    }

    /// Best-effort removal of edges whose midpoint lies outside `bounds`.
    fn erase_outside<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        target: GroupId,
        bounds: &BoundingBox,
    ) -> usize {
        let outside: Vec<EdgeId> = match host.edges(target) {
            Ok(edges) => edges
                .iter()
                .filter(|edge| !bounds.contains(edge.midpoint(), self.tolerance))
                .map(|edge| edge.id)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Could not list edges for cleanup");
                return 0;
            }
        };

        if outside.is_empty() {
            return 0;
        }
        match host.erase_edges(target, &outside) {
            Ok(()) => outside.len(),
            Err(e) => {
                warn!(error = %e, count = outside.len(), "Cleanup of outside edges failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use glam::DAffine3;

    const TOLERANCE: f64 = 0.001;

    fn flat_square(host: &mut MemoryHost, group: GroupId, half: f64) {
        host.add_face(
            group,
            &[
                DVec3::new(-half, -half, 0.0),
                DVec3::new(half, -half, 0.0),
                DVec3::new(half, half, 0.0),
                DVec3::new(-half, half, 0.0),
            ],
        )
        .unwrap();
    }

    fn scene() -> (MemoryHost, GroupId, GroupId) {
        let mut host = MemoryHost::new();
        let target = host.add_top_level_group("Terrain");
        let source = host.add_top_level_group("Terrain Data");
        flat_square(&mut host, target, 5.0);
        host.add_terrain_grid(source, 50.0, 5.0, |x, y| {
            if (x, y) == (5.0, 5.0) {
                12.0
            } else if (x, y) == (-5.0, -5.0) {
                -4.0
            } else {
                0.0
            }
        })
        .unwrap();
        (host, source, target)
    }

    #[test]
    fn test_crop_keeps_footprint_and_source_heights() {
        let (mut host, source, target) = scene();

        let report = TerrainCropEngine::new(TOLERANCE)
            .crop(&mut host, source, target)
            .unwrap();
        let bounds = host.content_bounds(target).unwrap();

        assert!((bounds.width() - 10.0).abs() < 1e-9);
        assert!((bounds.depth() - 10.0).abs() < 1e-9);
        assert_eq!(bounds.min.z, -4.0);
        assert_eq!(bounds.max.z, 12.0);
        assert!(report.erased_edges > 0);
        assert_eq!(report.footprint.max.z, 12.0);
    }

    #[test]
    fn test_crop_uses_viewport_frame() {
        let (mut host, source, target) = scene();
        host.set_transform(target, DAffine3::from_scale(DVec3::new(2.0, 2.0, 1.0)))
            .unwrap();

        TerrainCropEngine::new(TOLERANCE)
            .crop(&mut host, source, target)
            .unwrap();
        let world = host.world_bounds(target).unwrap();

        assert!((world.width() - 20.0).abs() < 1e-9);
        assert!((world.depth() - 20.0).abs() < 1e-9);
        assert!((world.min.x + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_crop_off_grid_splits_faces() {
        let mut host = MemoryHost::new();
        let target = host.add_top_level_group("Terrain");
        let source = host.add_top_level_group("Terrain Data");
        flat_square(&mut host, target, 3.3);
        host.add_terrain_grid(source, 20.0, 5.0, |x, _| x * 0.1).unwrap();

        TerrainCropEngine::new(TOLERANCE)
            .crop(&mut host, source, target)
            .unwrap();
        let bounds = host.content_bounds(target).unwrap();

        assert!((bounds.min.x + 3.3).abs() < 1e-9);
        assert!((bounds.max.y - 3.3).abs() < 1e-9);
        assert!((bounds.max.z - 0.33).abs() < 1e-9);
        assert!(host
            .edges(target)
            .unwrap()
            .iter()
            .all(|edge| edge.midpoint().x.abs() <= 3.3 + TOLERANCE));
    }

    #[test]
    fn test_cutter_is_removed() {
        let (mut host, source, target) = scene();

        TerrainCropEngine::new(TOLERANCE)
            .crop(&mut host, source, target)
            .unwrap();

        assert!(host.children(target).unwrap().is_empty());
    }

    #[test]
    fn test_nested_source_groups_are_cropped() {
        let (mut host, source, target) = scene();
        let nested = host.add_group(source).unwrap();
        host.add_terrain_grid(nested, 40.0, 5.0, |_, _| 1.0).unwrap();

        TerrainCropEngine::new(TOLERANCE)
            .crop(&mut host, source, target)
            .unwrap();
        let bounds = host.content_bounds(target).unwrap();

        assert!(host.children(target).unwrap().is_empty());
        assert!(bounds.min.x >= -5.0 - 1e-9 && bounds.max.x <= 5.0 + 1e-9);
        assert!(bounds.min.y >= -5.0 - 1e-9 && bounds.max.y <= 5.0 + 1e-9);
        assert_eq!(bounds.max.z, 12.0);
    }

    #[test]
    fn test_empty_viewport_is_error() {
        let mut host = MemoryHost::new();
        let target = host.add_top_level_group("Terrain");
        let source = host.add_top_level_group("Terrain Data");

        let result = TerrainCropEngine::new(TOLERANCE).crop(&mut host, source, target);
        assert!(matches!(result, Err(CropError::EmptyFootprint(_))));
    }

    #[test]
    fn test_empty_source_leaves_empty_viewport() {
        let mut host = MemoryHost::new();
        let target = host.add_top_level_group("Terrain");
        let source = host.add_top_level_group("Terrain Data");
        flat_square(&mut host, target, 5.0);

        let report = TerrainCropEngine::new(TOLERANCE)
            .crop(&mut host, source, target)
            .unwrap();

        assert_eq!(report.erased_edges, 0);
        assert!(host.content_bounds(target).unwrap().is_empty());
    }
}
