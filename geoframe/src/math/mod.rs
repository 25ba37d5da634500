//! Transform and bounds math.
//!
//! Everything here is pure: no host access, no logging. The synchronization
//! cycle builds on three pieces:
//!
//! - [`TransformClassifier`] decides whether a transform delta is an identity,
//!   a scale or a rigid motion, using a length tolerance rather than exact
//!   float comparison.
//! - [`try_inverse`] and [`planar_angle`] provide the inverse-composition and
//!   angle math used by tracking and geo-reference updates.
//! - [`BoundingBox`] carries footprints through the crop algorithm.
//!
//! Transforms are [`glam::DAffine3`] values (3×3 linear part plus translation,
//! f64 precision).

mod bounds;
mod transform;

pub use bounds::BoundingBox;
pub use transform::{
    planar_angle, transform_from_array, transform_to_array, try_inverse, MathError,
    TransformClassifier, TransformKind, SINGULAR_DETERMINANT,
};
