//! North-angle handling around the host's native projection.
//!
//! Some hosts rotate local points by the north angle in the wrong direction
//! before projecting them to UTM. Rotating the point by twice the north angle
//! the other way first cancels that out. Everything that touches this
//! workaround goes through [`NorthCompensation`], so it can be switched off
//! once the host projection is fixed.

use glam::{DAffine3, DVec3};

/// How to prepare a local point before handing it to the host projection.
///
/// Angles are counter-clockwise about +Z. A correct host projection maps a
/// local point to grid coordinates by rotating it through `-north_angle`;
/// [`NorthCompensation::DoubleAngle`] assumes the host rotates through
/// `+north_angle` instead. A host with any other convention needs its own
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NorthCompensation {
    /// The host rotates by `+north_angle` instead of `-north_angle`; pre-rotate
    /// by `-2 × north_angle`.
    #[default]
    DoubleAngle,
    /// The host handles north correctly; pass points through untouched.
    None,
}

impl NorthCompensation {
    /// Point to pass to the host projection for the local `point`.
    pub fn prepare_point(&self, point: DVec3, north_angle: f64) -> DVec3 {
        match self {
            NorthCompensation::DoubleAngle => {
                DAffine3::from_rotation_z(-2.0 * north_angle).transform_point3(point)
            }
            NorthCompensation::None => point,
        }
    }

    /// Config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            NorthCompensation::DoubleAngle => "double_angle",
            NorthCompensation::None => "none",
        }
    }
}

impl std::str::FromStr for NorthCompensation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "double_angle" | "double" => Ok(NorthCompensation::DoubleAngle),
            "none" | "off" => Ok(NorthCompensation::None),
            other => Err(format!("unknown north compensation '{}'", other)),
        }
    }
}

impl std::fmt::Display for NorthCompensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
