//! Per-group transform baselines.
//!
//! The tracker remembers the last transform it saw for a group in one of the
//! group's own attributes, so the baseline is saved and restored with the
//! model and rolled back with any aborted operation.

use glam::DAffine3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::host::{AttributeStore, GroupId, HostError, SceneHost};
use crate::math::{transform_from_array, transform_to_array, try_inverse, MathError};

/// Default attribute namespace.
pub const DEFAULT_NAMESPACE: &str = "geoframe";

/// Default attribute key.
pub const DEFAULT_KEY: &str = "transformation";

/// Errors from tracking.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Reading the transform or attribute failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The previous or current transform cannot be inverted.
    #[error(transparent)]
    Math(#[from] MathError),

    /// The stored baseline is not a valid transform.
    #[error("stored baseline on group {group} is corrupt: {reason}")]
    CorruptBaseline { group: GroupId, reason: String },

    /// The baseline could not be encoded.
    #[error("failed to encode baseline: {0}")]
    Encode(#[from] serde_json::Error),
}

/// On-disk shape of a baseline.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTransform {
    matrix: [f64; 16],
}

/// Stores baselines and computes transform deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformTracker {
    namespace: String,
    key: String,
}

impl Default for TransformTracker {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_KEY)
    }
}

impl TransformTracker {
    /// Create a tracker writing to `namespace`/`key`.
    pub fn new(namespace: &str, key: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    /// Attribute namespace in use.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Attribute key in use.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record the group's current transform as its baseline.
    pub fn init_tracking<H>(&self, host: &mut H, group: GroupId) -> Result<DAffine3, TrackerError>
    where
        H: SceneHost + AttributeStore + ?Sized,
    {
        let current = host.transform(group)?;
        try_inverse(&current)?;
        self.store(host, group, &current)?;
        debug!(group = %group, "Transform tracking initialized");
        Ok(current)
    }

    /// The stored baseline, if any.
    pub fn baseline<H>(&self, host: &H, group: GroupId) -> Result<Option<DAffine3>, TrackerError>
    where
        H: AttributeStore + ?Sized,
    {
        let Some(raw) = host.get_attribute(group, &self.namespace, &self.key) else {
            return Ok(None);
        };

        let stored: StoredTransform =
            serde_json::from_str(&raw).map_err(|e| TrackerError::CorruptBaseline {
                group,
                reason: e.to_string(),
            })?;
        let transform =
            transform_from_array(&stored.matrix).map_err(|e| TrackerError::CorruptBaseline {
                group,
                reason: e.to_string(),
            })?;
        Ok(Some(transform))
    }

    /// Transform that carries the baseline frame onto the current one.
    ///
    /// Returns `current · inverse(baseline)` and stores `current` as the new
    /// baseline. Without a stored baseline the current transform is used, so
    /// the first call returns the identity. Nothing is stored on error.
    pub fn delta<H>(&self, host: &mut H, group: GroupId) -> Result<DAffine3, TrackerError>
    where
        H: SceneHost + AttributeStore + ?Sized,
    {
        let current = host.transform(group)?;
        let previous = self.baseline(&*host, group)?.unwrap_or(current);

        let previous_inverse = try_inverse(&previous)?;
        try_inverse(&current)?;

        self.store(host, group, &current)?;
        let delta = current * previous_inverse;
        trace!(group = %group, ?delta, "Computed transform delta");
        Ok(delta)
    }

    fn store<H>(&self, host: &mut H, group: GroupId, transform: &DAffine3) -> Result<(), TrackerError>
    where
        H: AttributeStore + ?Sized,
    {
        let encoded = serde_json::to_string(&StoredTransform {
            matrix: transform_to_array(transform),
        })?;
        host.set_attribute(group, &self.namespace, &self.key, encoded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use glam::{DQuat, DVec3};

    fn tracked_group() -> (MemoryHost, GroupId) {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");
        (host, group)
    }

    #[test]
    fn test_first_delta_is_identity() {
        let (mut host, group) = tracked_group();
        host.set_transform(group, DAffine3::from_translation(DVec3::new(3.0, 0.0, 0.0)))
            .unwrap();

        let delta = TransformTracker::default().delta(&mut host, group).unwrap();
        assert!(delta.abs_diff_eq(DAffine3::IDENTITY, 1e-12));
    }

    #[test]
    fn test_second_delta_without_change_is_identity() {
        let (mut host, group) = tracked_group();
        let tracker = TransformTracker::default();
        tracker.init_tracking(&mut host, group).unwrap();

        host.set_transform(group, DAffine3::from_rotation_z(0.4)).unwrap();
        let first = tracker.delta(&mut host, group).unwrap();
        let second = tracker.delta(&mut host, group).unwrap();

        assert!(first.abs_diff_eq(DAffine3::from_rotation_z(0.4), 1e-12));
        assert!(second.abs_diff_eq(DAffine3::IDENTITY, 1e-12));
    }

    #[test]
    fn test_baseline_is_stored_as_json_matrix() {
        let (mut host, group) = tracked_group();
        let tracker = TransformTracker::default();
        tracker.init_tracking(&mut host, group).unwrap();

        let raw = host
            .get_attribute(group, DEFAULT_NAMESPACE, DEFAULT_KEY)
            .unwrap();
        assert!(raw.starts_with("{\"matrix\":["));
        assert_eq!(
            tracker.baseline(&host, group).unwrap(),
            Some(DAffine3::IDENTITY)
        );
    }

    #[test]
    fn test_corrupt_baseline_is_error_and_not_overwritten() {
        let (mut host, group) = tracked_group();
        host.set_attribute(group, DEFAULT_NAMESPACE, DEFAULT_KEY, "garbage".to_string())
            .unwrap();

        let result = TransformTracker::default().delta(&mut host, group);

        assert!(matches!(result, Err(TrackerError::CorruptBaseline { .. })));
        assert_eq!(
            host.get_attribute(group, DEFAULT_NAMESPACE, DEFAULT_KEY),
            Some("garbage".to_string())
        );
    }

    #[test]
    fn test_singular_current_transform_keeps_baseline() {
        let (mut host, group) = tracked_group();
        let tracker = TransformTracker::default();
        tracker.init_tracking(&mut host, group).unwrap();

        host.set_transform(group, DAffine3::from_scale(DVec3::new(1.0, 1.0, 0.0)))
            .unwrap();
        let result = tracker.delta(&mut host, group);

        assert!(matches!(result, Err(TrackerError::Math(_))));
        assert_eq!(
            tracker.baseline(&host, group).unwrap(),
            Some(DAffine3::IDENTITY)
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn edit() -> impl Strategy<Value = DAffine3> {
            (
                0.5..2.0_f64,
                -3.0..3.0_f64,
                -100.0..100.0_f64,
                -100.0..100.0_f64,
            )
                .prop_map(|(scale, angle, x, y)| {
                    DAffine3::from_scale_rotation_translation(
                        DVec3::new(scale, scale, 1.0),
                        DQuat::from_rotation_z(angle),
                        DVec3::new(x, y, 0.0),
                    )
                })
        }

        proptest! {
            #[test]
            fn test_delta_composes_baseline_onto_current(
                edits in prop::collection::vec(edit(), 1..6),
            ) {
                let (mut host, group) = tracked_group();
                let tracker = TransformTracker::default();
                tracker.init_tracking(&mut host, group)?;

                for edit in edits {
                    let previous = host.transform(group)?;
                    host.set_transform(group, edit * previous)?;

                    let delta = tracker.delta(&mut host, group)?;
                    let current = host.transform(group)?;
                    prop_assert!((delta * previous).abs_diff_eq(current, 1e-6));
                }
            }
        }
    }
}
