//! WGS84 Universal Transverse Mercator conversion.
//!
//! Forward and inverse mappings use Krüger's series in the third flattening,
//! carried to sixth order as given by Karney, "Transverse Mercator with an
//! accuracy of a few nanometers" (J. Geodesy 85, 2011). The conformal latitude
//! is inverted by Newton iteration, so a forward/inverse round trip returns
//! the input to within floating point noise.
//!
//! Zones are 6° wide; the Norway and Svalbard exceptions are not applied, so
//! zone numbers always follow the regular grid.

use std::f64::consts::PI;

use super::{GeoError, LatLong};

/// Scale factor on the central meridian.
const K0: f64 = 0.9996;
/// WGS84 semi-major axis in metres.
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// WGS84 flattening.
const FLATTENING: f64 = 1.0 / 298.257_223_563;
/// First eccentricity squared.
const ECC2: f64 = FLATTENING * (2.0 - FLATTENING);

/// Third flattening and its powers.
const N1: f64 = FLATTENING / (2.0 - FLATTENING);
const N2: f64 = N1 * N1;
const N3: f64 = N2 * N1;
const N4: f64 = N3 * N1;
const N5: f64 = N4 * N1;
const N6: f64 = N5 * N1;

/// Rectifying radius divided by the semi-major axis.
const RECTIFYING: f64 = (1.0 + N2 / 4.0 + N4 / 64.0 + N6 / 256.0) / (1.0 + N1);

/// Forward series coefficients, conformal to projected.
const ALPHA: [f64; 6] = [
    N1 / 2.0 - 2.0 * N2 / 3.0 + 5.0 * N3 / 16.0 + 41.0 * N4 / 180.0 - 127.0 * N5 / 288.0
        + 7891.0 * N6 / 37800.0,
    13.0 * N2 / 48.0 - 3.0 * N3 / 5.0 + 557.0 * N4 / 1440.0 + 281.0 * N5 / 630.0
        - 1_983_433.0 * N6 / 1_935_360.0,
    61.0 * N3 / 240.0 - 103.0 * N4 / 140.0 + 15061.0 * N5 / 26880.0
        + 167_603.0 * N6 / 181_440.0,
    49561.0 * N4 / 161_280.0 - 179.0 * N5 / 168.0 + 6_601_661.0 * N6 / 7_257_600.0,
    34729.0 * N5 / 80640.0 - 3_418_889.0 * N6 / 1_995_840.0,
    212_378_941.0 * N6 / 319_334_400.0,
];

/// Inverse series coefficients, projected to conformal.
const BETA: [f64; 6] = [
    N1 / 2.0 - 2.0 * N2 / 3.0 + 37.0 * N3 / 96.0 - N4 / 360.0 - 81.0 * N5 / 512.0
        + 96199.0 * N6 / 604_800.0,
    N2 / 48.0 + N3 / 15.0 - 437.0 * N4 / 1440.0 + 46.0 * N5 / 105.0
        - 1_118_711.0 * N6 / 3_870_720.0,
    17.0 * N3 / 480.0 - 37.0 * N4 / 840.0 - 209.0 * N5 / 4480.0 + 5569.0 * N6 / 90720.0,
    4397.0 * N4 / 161_280.0 - 11.0 * N5 / 504.0 - 830_251.0 * N6 / 7_257_600.0,
    4583.0 * N5 / 161_280.0 - 108_847.0 * N6 / 3_991_680.0,
    20_648_693.0 * N6 / 638_668_800.0,
];

/// Newton steps allowed when inverting the conformal latitude.
const MAX_NEWTON_STEPS: usize = 8;

/// False easting applied to every zone.
const FALSE_EASTING: f64 = 500_000.0;
/// False northing applied in the southern hemisphere.
const FALSE_NORTHING: f64 = 10_000_000.0;

/// Southern limit of the UTM system in degrees.
pub const MIN_UTM_LAT: f64 = -80.0;
/// Northern limit of the UTM system in degrees.
pub const MAX_UTM_LAT: f64 = 84.0;

/// A position in a UTM zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmCoord {
    /// Zone number, 1 to 60.
    pub zone: u8,
    /// Northern hemisphere flag.
    pub northern: bool,
    /// Metres east, including the 500 km false easting.
    pub easting: f64,
    /// Metres north, including the 10 000 km false northing in the south.
    pub northing: f64,
}

impl UtmCoord {
    /// Project a latitude/longitude into its UTM zone.
    pub fn from_latlong(position: LatLong) -> Result<Self, GeoError> {
        let LatLong {
            latitude,
            longitude,
        } = position;
        if !(MIN_UTM_LAT..=MAX_UTM_LAT).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }

        let zone = zone_number(longitude);
        let lambda = wrap_radians(longitude.to_radians() - central_meridian(zone));
        let tau_prime = conformal_tan(latitude.to_radians().tan());

        let xi_prime = tau_prime.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / tau_prime.hypot(lambda.cos())).asinh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in ALPHA.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let scale = K0 * SEMI_MAJOR_AXIS * RECTIFYING;
        let easting = FALSE_EASTING + scale * eta;
        let mut northing = scale * xi;

        let northern = latitude >= 0.0;
        if !northern {
            northing += FALSE_NORTHING;
        }

        Ok(Self {
            zone,
            northern,
            easting,
            northing,
        })
    }

    /// Convert back to latitude/longitude.
    pub fn to_latlong(&self) -> Result<LatLong, GeoError> {
        if !(1..=60).contains(&self.zone) {
            return Err(GeoError::InvalidZone(self.zone));
        }
        if !self.easting.is_finite() || !self.northing.is_finite() {
            return Err(GeoError::NonFinite);
        }

        let y = if self.northern {
            self.northing
        } else {
            self.northing - FALSE_NORTHING
        };

        let scale = K0 * SEMI_MAJOR_AXIS * RECTIFYING;
        let xi = y / scale;
        let eta = (self.easting - FALSE_EASTING) / scale;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in BETA.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let tau_prime = xi_prime.sin() / eta_prime.sinh().hypot(xi_prime.cos());
        let lambda = eta_prime.sinh().atan2(xi_prime.cos());
        let latitude = geographic_tan(tau_prime)?.atan();
        let longitude = wrap_radians(lambda + central_meridian(self.zone));

        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeoError::NonFinite);
        }
        Ok(LatLong::new(latitude.to_degrees(), longitude.to_degrees()))
    }

    /// The same zone, shifted by metres east and north.
    ///
    /// The result may fall outside the nominal zone width; the projection
    /// stays valid for a few hundred kilometres beyond it.
    pub fn offset(&self, east: f64, north: f64) -> Self {
        Self {
            easting: self.easting + east,
            northing: self.northing + north,
            ..*self
        }
    }
}

impl std::fmt::Display for UtmCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{} {:.3}mE {:.3}mN",
            self.zone,
            if self.northern { 'N' } else { 'S' },
            self.easting,
            self.northing
        )
    }
}

/// Regular UTM zone for a longitude in degrees.
pub fn zone_number(longitude: f64) -> u8 {
    if longitude >= 180.0 {
        return 60;
    }
    (((longitude + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8
}

/// Central meridian of a zone in radians.
fn central_meridian(zone: u8) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Wrap an angle into `[-π, π)`.
fn wrap_radians(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Tangent of the conformal latitude for the tangent of a geographic latitude.
fn conformal_tan(tau: f64) -> f64 {
    let ecc = ECC2.sqrt();
    let sigma = (ecc * (ecc * tau / tau.hypot(1.0)).atanh()).sinh();
    tau * sigma.hypot(1.0) - sigma * tau.hypot(1.0)
}

/// Invert [`conformal_tan`] by Newton iteration.
fn geographic_tan(tau_prime: f64) -> Result<f64, GeoError> {
    let tolerance = f64::EPSILON.sqrt() * 0.1 * tau_prime.abs().max(1.0);
    let mut tau = tau_prime / (1.0 - ECC2);
    for _ in 0..MAX_NEWTON_STEPS {
        let slope = (1.0 - ECC2) * conformal_tan(tau).hypot(1.0) * tau.hypot(1.0)
            / (1.0 + (1.0 - ECC2) * tau * tau);
        let step = (tau_prime - conformal_tan(tau)) / slope;
        tau += step;
        if step.abs() <= tolerance {
            return Ok(tau);
        }
    }
    if tau.is_finite() {
        Ok(tau)
    } else {
        Err(GeoError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian_on_equator() {
        let utm = UtmCoord::from_latlong(LatLong::new(0.0, 15.0)).unwrap();

        assert_eq!(utm.zone, 33);
        assert!(utm.northern);
        assert!((utm.easting - 500_000.0).abs() < 1e-6);
        assert!(utm.northing.abs() < 1e-6);
    }

    #[test]
    fn test_stockholm_reference_values() {
        // 59.3293°N 18.0686°E is 34V 333230mE 6580391mN.
        let utm = UtmCoord::from_latlong(LatLong::new(59.3293, 18.0686)).unwrap();

        assert_eq!(utm.zone, 34);
        assert!((utm.easting - 333_230.0).abs() < 1.0, "got {}", utm.easting);
        assert!(
            (utm.northing - 6_580_391.0).abs() < 1.0,
            "got {}",
            utm.northing
        );
    }

    #[test]
    fn test_southern_hemisphere_uses_false_northing() {
        let utm = UtmCoord::from_latlong(LatLong::new(-33.8688, 151.2093)).unwrap();

        assert_eq!(utm.zone, 56);
        assert!(!utm.northern);
        assert!(utm.northing > 6_000_000.0 && utm.northing < 6_300_000.0);
    }

    #[test]
    fn test_polar_latitude_is_rejected() {
        let result = UtmCoord::from_latlong(LatLong::new(88.0, 0.0));
        assert!(matches!(result, Err(GeoError::LatitudeOutOfRange(_))));
    }

    #[test]
    fn test_zone_number_edges() {
        assert_eq!(zone_number(-180.0), 1);
        assert_eq!(zone_number(-174.0001), 1);
        assert_eq!(zone_number(-174.0), 2);
        assert_eq!(zone_number(179.9999), 60);
        assert_eq!(zone_number(180.0), 60);
    }

    #[test]
    fn test_offset_moves_north() {
        let origin = LatLong::new(45.0, 9.0);
        let utm = UtmCoord::from_latlong(origin).unwrap();

        let moved = utm.offset(0.0, 1_000.0).to_latlong().unwrap();
        // One kilometre north is roughly 0.009 degrees of latitude.
        assert!((moved.latitude - origin.latitude - 0.009).abs() < 0.0005);
        assert!((moved.longitude - origin.longitude).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_roundtrip_is_stable() {
        let start = LatLong::new(59.3293, 18.0686);
        let mut position = start;
        for _ in 0..1000 {
            position = UtmCoord::from_latlong(position)
                .unwrap()
                .to_latlong()
                .unwrap();
        }

        assert!((position.latitude - start.latitude).abs() < 1e-10);
        assert!((position.longitude - start.longitude).abs() < 1e-10);
    }

    #[test]
    fn test_zone_edge_offsets_roundtrip() {
        // Three degrees off the central meridian at the equator.
        let edge = LatLong::new(0.5, 17.999);
        let back = UtmCoord::from_latlong(edge).unwrap().to_latlong().unwrap();

        assert!((back.latitude - edge.latitude).abs() < 1e-10);
        assert!((back.longitude - edge.longitude).abs() < 1e-10);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_roundtrip_property(
                lat in -79.9..83.9_f64,
                lon in -179.9..179.9_f64,
            ) {
                let utm = UtmCoord::from_latlong(LatLong::new(lat, lon))?;
                let back = utm.to_latlong()?;

                prop_assert!(
                    (back.latitude - lat).abs() < 1e-10,
                    "Latitude roundtrip failed: {} -> {}", lat, back.latitude
                );
                prop_assert!(
                    (back.longitude - lon).abs() < 1e-10,
                    "Longitude roundtrip failed: {} -> {}", lon, back.longitude
                );
            }
        }
    }
}
