//! Geo-reference model and projections.
//!
//! A model's geo-reference ties its local frame to the Earth: the local origin
//! sits at [`GeoReference::origin`] and [`GeoReference::origin_height`], and
//! true north points along the local Y axis rotated counter-clockwise by
//! [`GeoReference::north_angle`].
//!
//! - [`utm`]: WGS84 UTM forward/inverse projection
//! - [`NorthCompensation`]: adapter for the host projection's north handling
//! - [`GeoReferenceModel`]: accessors and the `move_earth` update

mod model;
mod projection;
pub mod utm;

pub use model::GeoReferenceModel;
pub use projection::NorthCompensation;
pub use utm::UtmCoord;

use thiserror::Error;

use crate::host::HostError;
use crate::math::MathError;

/// Errors from geo-reference math and projection.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Latitude outside the range the projection covers.
    #[error("latitude {0}° is outside the UTM range (-80° to 84°)")]
    LatitudeOutOfRange(f64),

    /// Longitude outside -180° to 180°.
    #[error("longitude {0}° is outside -180° to 180°")]
    LongitudeOutOfRange(f64),

    /// UTM zone number outside 1 to 60.
    #[error("invalid UTM zone {0}")]
    InvalidZone(u8),

    /// A computed value was NaN or infinite.
    #[error("geo-reference computation produced a non-finite value")]
    NonFinite,

    /// Transform math failed (for example a singular movement).
    #[error(transparent)]
    Math(#[from] MathError),

    /// The geo-reference store rejected a read or write.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLong {
    /// Degrees north of the equator (negative south).
    pub latitude: f64,
    /// Degrees east of Greenwich (negative west).
    pub longitude: f64,
}

impl LatLong {
    /// Create a new position.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl std::fmt::Display for LatLong {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lat_hem = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let lon_hem = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.6}°{}, {:.6}°{}",
            self.latitude.abs(),
            lat_hem,
            self.longitude.abs(),
            lon_hem
        )
    }
}

/// The complete geo-reference of a model.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoReference {
    /// Radians counter-clockwise from the local Y axis to true north.
    pub north_angle: f64,
    /// Height of the local origin along Z.
    pub origin_height: f64,
    /// Position of the local origin.
    pub origin: LatLong,
}

impl std::fmt::Display for GeoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "origin {} at height {:.3}, north {:.3}°",
            self.origin,
            self.origin_height,
            self.north_angle.to_degrees()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlong_display_uses_hemispheres() {
        let position = LatLong::new(-33.8688, -70.5);
        assert_eq!(position.to_string(), "33.868800°S, 70.500000°W");
    }

    #[test]
    fn test_geo_error_display() {
        let err = GeoError::LatitudeOutOfRange(88.0);
        assert!(err.to_string().contains("88"));
        assert!(err.to_string().contains("UTM"));
    }
}
