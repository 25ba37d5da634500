//! Transform classification and inverse composition.

use glam::{DAffine3, DMat4, DVec3};
use thiserror::Error;

/// Determinant magnitude below which a linear part is treated as singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-12;

/// Errors from transform math.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MathError {
    /// The transform collapses at least one axis and has no inverse.
    #[error("transform is singular (determinant {determinant:e})")]
    SingularTransform { determinant: f64 },

    /// The transform holds NaN or infinite coefficients.
    #[error("transform contains non-finite coefficients")]
    NonFinite,
}

/// What a transform delta does to the object it was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Nothing changed (within tolerance).
    Identity,
    /// At least one axis changed length. Wins over any rotation or translation
    /// in the same delta.
    Scaling,
    /// Rotation and/or translation only.
    RigidMotion,
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformKind::Identity => write!(f, "identity"),
            TransformKind::Scaling => write!(f, "scaling"),
            TransformKind::RigidMotion => write!(f, "rigid motion"),
        }
    }
}

/// Classifies transform deltas using a length tolerance.
///
/// Host edits round-trip transforms through their own float storage, so an
/// untouched object routinely reports coefficients like `0.9999999999998`.
/// The tolerance is expressed in host length units: it bounds both the
/// translation error and the axis length error that still count as "no
/// change".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformClassifier {
    tolerance: f64,
}

impl TransformClassifier {
    /// Create a classifier with the given length tolerance.
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// The length tolerance in host units.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// True if every coefficient of `transform` is within tolerance of the
    /// identity matrix.
    pub fn is_identity(&self, transform: &DAffine3) -> bool {
        let actual = DMat4::from(*transform).to_cols_array();
        let identity = DMat4::IDENTITY.to_cols_array();

        actual
            .iter()
            .zip(identity.iter())
            .all(|(a, b)| (a - b).abs() <= self.tolerance)
    }

    /// True if any unit axis changes length by more than the tolerance.
    ///
    /// Catches uniform, non-uniform and shear-with-scale transforms. Pure
    /// rotations and translations keep all three lengths at 1.
    pub fn is_scaling(&self, transform: &DAffine3) -> bool {
        [DVec3::X, DVec3::Y, DVec3::Z].iter().any(|axis| {
            let length = transform.transform_vector3(*axis).length();
            !((length - 1.0).abs() <= self.tolerance)
        })
    }

    /// Classify a transform delta. Identity is checked first, then scaling.
    pub fn classify(&self, transform: &DAffine3) -> TransformKind {
        if self.is_identity(transform) {
            TransformKind::Identity
        } else if self.is_scaling(transform) {
            TransformKind::Scaling
        } else {
            TransformKind::RigidMotion
        }
    }
}

/// Invert a transform, rejecting singular and non-finite ones.
pub fn try_inverse(transform: &DAffine3) -> Result<DAffine3, MathError> {
    if !transform.is_finite() {
        return Err(MathError::NonFinite);
    }

    let determinant = transform.matrix3.determinant();
    if !(determinant.abs() >= SINGULAR_DETERMINANT) {
        return Err(MathError::SingularTransform { determinant });
    }

    let inverse = transform.inverse();
    if !inverse.is_finite() {
        return Err(MathError::NonFinite);
    }
    Ok(inverse)
}

/// Counter-clockwise angle about `normal` that rotates `subtrahend` onto
/// `minuend`, in radians within `[-π, π]`.
///
/// Both vectors are measured in the plane perpendicular to `normal`; any
/// component along `normal` does not affect the sign. Parallel vectors give 0
/// and opposite vectors give ±π without special cases.
pub fn planar_angle(minuend: DVec3, subtrahend: DVec3, normal: DVec3) -> f64 {
    let normal = normal.normalize_or_zero();
    let minuend = minuend - normal * minuend.dot(normal);
    let subtrahend = subtrahend - normal * subtrahend.dot(normal);

    subtrahend
        .cross(minuend)
        .dot(normal)
        .atan2(subtrahend.dot(minuend))
}

/// Flatten a transform to the 16 column-major coefficients of its 4×4 matrix.
pub fn transform_to_array(transform: &DAffine3) -> [f64; 16] {
    DMat4::from(*transform).to_cols_array()
}

/// Rebuild a transform from 16 column-major 4×4 coefficients.
///
/// The projective row is ignored; hosts only store affine transforms.
pub fn transform_from_array(values: &[f64; 16]) -> Result<DAffine3, MathError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::NonFinite);
    }
    Ok(DAffine3::from_mat4(DMat4::from_cols_array(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, PI};

    const TOLERANCE: f64 = 0.001;

    fn classifier() -> TransformClassifier {
        TransformClassifier::new(TOLERANCE)
    }

    #[test]
    fn test_identity_accepts_round_off() {
        let mut transform = DAffine3::IDENTITY;
        transform.matrix3.x_axis.x = 1.0 + 1e-9;
        transform.translation.y = -4e-4;

        assert!(classifier().is_identity(&transform));
        assert_eq!(classifier().classify(&transform), TransformKind::Identity);
    }

    #[test]
    fn test_identity_rejects_small_translation_above_tolerance() {
        let transform = DAffine3::from_translation(DVec3::new(0.0, 0.002, 0.0));

        assert!(!classifier().is_identity(&transform));
        assert_eq!(
            classifier().classify(&transform),
            TransformKind::RigidMotion
        );
    }

    #[test]
    fn test_rotation_is_not_scaling() {
        let transform = DAffine3::from_rotation_z(FRAC_PI_6);

        assert!(!classifier().is_scaling(&transform));
        assert_eq!(
            classifier().classify(&transform),
            TransformKind::RigidMotion
        );
    }

    #[test]
    fn test_non_uniform_scale_is_scaling() {
        let transform = DAffine3::from_scale(DVec3::new(2.0, 1.0, 1.0));

        assert!(classifier().is_scaling(&transform));
    }

    #[test]
    fn test_scale_and_move_classifies_as_scaling() {
        let transform = DAffine3::from_scale_rotation_translation(
            DVec3::splat(1.5),
            glam::DQuat::from_rotation_z(0.3),
            DVec3::new(10.0, 0.0, 0.0),
        );

        assert_eq!(classifier().classify(&transform), TransformKind::Scaling);
    }

    #[test]
    fn test_nan_transform_is_neither_identity_nor_rigid() {
        let mut transform = DAffine3::IDENTITY;
        transform.matrix3.y_axis.y = f64::NAN;

        assert!(!classifier().is_identity(&transform));
        assert!(classifier().is_scaling(&transform));
    }

    #[test]
    fn test_try_inverse_rejects_flattened_transform() {
        let transform = DAffine3::from_scale(DVec3::new(1.0, 1.0, 0.0));

        let result = try_inverse(&transform);
        assert!(matches!(
            result,
            Err(MathError::SingularTransform { .. })
        ));
    }

    #[test]
    fn test_try_inverse_composes_to_identity() {
        let transform = DAffine3::from_scale_rotation_translation(
            DVec3::new(2.0, 3.0, 0.5),
            glam::DQuat::from_rotation_z(1.2),
            DVec3::new(-4.0, 7.0, 1.0),
        );

        let inverse = try_inverse(&transform).unwrap();
        assert!((transform * inverse).abs_diff_eq(DAffine3::IDENTITY, 1e-12));
    }

    #[test]
    fn test_planar_angle_signs() {
        let rotated = DAffine3::from_rotation_z(FRAC_PI_6).transform_vector3(DVec3::Y);

        assert!((planar_angle(rotated, DVec3::Y, DVec3::Z) - FRAC_PI_6).abs() < 1e-12);
        assert!((planar_angle(DVec3::Y, rotated, DVec3::Z) + FRAC_PI_6).abs() < 1e-12);
        assert!((planar_angle(DVec3::X, DVec3::Y, DVec3::Z) + FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_planar_angle_parallel_and_opposite() {
        assert_eq!(planar_angle(DVec3::Y, DVec3::Y, DVec3::Z), 0.0);
        assert!((planar_angle(-DVec3::Y, DVec3::Y, DVec3::Z).abs() - PI).abs() < 1e-12);
    }

    #[test]
    fn test_planar_angle_ignores_out_of_plane_component() {
        let tilted = DVec3::new(-1.0, 1.0, 5.0);

        let angle = planar_angle(tilted, DVec3::Y, DVec3::Z);
        assert!((angle - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_array_roundtrip_keeps_transform() {
        let transform = DAffine3::from_rotation_translation(
            glam::DQuat::from_rotation_z(0.7),
            DVec3::new(1.0, 2.0, 3.0),
        );

        let restored = transform_from_array(&transform_to_array(&transform)).unwrap();
        assert_eq!(restored, transform);
    }

    #[test]
    fn test_array_with_nan_is_rejected() {
        let mut values = transform_to_array(&DAffine3::IDENTITY);
        values[5] = f64::NAN;

        assert_eq!(transform_from_array(&values), Err(MathError::NonFinite));
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_rigid_motion_is_never_scaling(
                angle in -PI..PI,
                tx in -1000.0..1000.0_f64,
                ty in -1000.0..1000.0_f64,
                tz in -100.0..100.0_f64,
            ) {
                let transform = DAffine3::from_rotation_translation(
                    glam::DQuat::from_rotation_z(angle),
                    DVec3::new(tx, ty, tz),
                );

                prop_assert!(!classifier().is_scaling(&transform));
                prop_assert_ne!(classifier().classify(&transform), TransformKind::Scaling);
            }

            #[test]
            fn test_axis_length_change_is_scaling(
                factor in prop_oneof![0.1..0.99_f64, 1.01..10.0_f64],
                axis in 0usize..3,
                angle in -PI..PI,
            ) {
                let mut scale = DVec3::ONE;
                scale[axis] = factor;
                let transform = DAffine3::from_scale_rotation_translation(
                    scale,
                    glam::DQuat::from_rotation_z(angle),
                    DVec3::ZERO,
                );

                prop_assert!(classifier().is_scaling(&transform));
                prop_assert_eq!(classifier().classify(&transform), TransformKind::Scaling);
            }

            #[test]
            fn test_identity_iff_all_coefficients_within_tolerance(
                index in 0usize..12,
                offset in prop_oneof![-0.01..-0.0011_f64, -0.0009..0.0009_f64, 0.0011..0.01_f64],
            ) {
                let mut values = transform_to_array(&DAffine3::IDENTITY);
                // Skip the projective row (indices 3, 7, 11, 15).
                let index = index + index / 3;
                values[index] += offset;
                let transform = transform_from_array(&values).unwrap();

                prop_assert_eq!(
                    classifier().is_identity(&transform),
                    offset.abs() <= TOLERANCE
                );
            }
        }
    }
}
