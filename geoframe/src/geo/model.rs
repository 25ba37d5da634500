//! Reading and updating a model's geo-reference.

use std::f64::consts::TAU;

use glam::{DAffine3, DVec3};
use tracing::debug;

use super::{GeoError, GeoReference, LatLong, NorthCompensation, UtmCoord};
use crate::host::GeoStore;
use crate::math::{planar_angle, try_inverse};

/// Geo-reference accessors and the rigid-motion update.
///
/// The model holds no state of its own; every call reads from and writes to
/// the [`GeoStore`] it is given. North angles are radians here and degrees in
/// the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoReferenceModel {
    compensation: NorthCompensation,
}

impl GeoReferenceModel {
    /// Create a model using the given host projection adapter.
    pub fn new(compensation: NorthCompensation) -> Self {
        Self { compensation }
    }

    /// North angle in radians, counter-clockwise from local Y.
    pub fn north_angle<S: GeoStore + ?Sized>(&self, store: &S) -> f64 {
        store.north_angle_degrees().to_radians()
    }

    /// Set the north angle in radians. Stored normalized to `[0°, 360°)`.
    pub fn set_north_angle<S: GeoStore + ?Sized>(
        &self,
        store: &mut S,
        radians: f64,
    ) -> Result<(), GeoError> {
        if !radians.is_finite() {
            return Err(GeoError::NonFinite);
        }
        store.set_north_angle_degrees(normalize_angle(radians).to_degrees())?;
        Ok(())
    }

    /// Height of the local origin.
    pub fn height<S: GeoStore + ?Sized>(&self, store: &S) -> f64 {
        store.origin_height()
    }

    /// Set the height of the local origin.
    pub fn set_height<S: GeoStore + ?Sized>(
        &self,
        store: &mut S,
        height: f64,
    ) -> Result<(), GeoError> {
        if !height.is_finite() {
            return Err(GeoError::NonFinite);
        }
        store.set_origin_height(height)?;
        Ok(())
    }

    /// Latitude/longitude of the local origin.
    pub fn origin_latlong<S: GeoStore + ?Sized>(&self, store: &S) -> LatLong {
        store.origin_latlong()
    }

    /// Move the local origin to `position`.
    pub fn set_origin_latlong<S: GeoStore + ?Sized>(
        &self,
        store: &mut S,
        position: LatLong,
    ) -> Result<(), GeoError> {
        if !position.is_finite() {
            return Err(GeoError::NonFinite);
        }
        store.set_origin_latlong(position)?;
        Ok(())
    }

    /// All three fields at once.
    pub fn snapshot<S: GeoStore + ?Sized>(&self, store: &S) -> GeoReference {
        GeoReference {
            north_angle: self.north_angle(store),
            origin_height: self.height(store),
            origin: self.origin_latlong(store),
        }
    }

    /// UTM position of a local point.
    pub fn point_to_utm<S: GeoStore + ?Sized>(
        &self,
        store: &S,
        point: DVec3,
    ) -> Result<UtmCoord, GeoError> {
        let prepared = self
            .compensation
            .prepare_point(point, self.north_angle(store));
        Ok(store.native_point_to_utm(prepared)?)
    }

    /// Latitude/longitude of a local point.
    pub fn point_to_latlong<S: GeoStore + ?Sized>(
        &self,
        store: &S,
        point: DVec3,
    ) -> Result<LatLong, GeoError> {
        self.point_to_utm(store, point)?.to_latlong()
    }

    /// Height of a local point above the geo-reference datum.
    pub fn point_to_height<S: GeoStore + ?Sized>(&self, store: &S, point: DVec3) -> f64 {
        point.z + self.height(store)
    }

    /// Shift the geo-reference so the world stays put while the local frame
    /// moves by `movement`.
    ///
    /// After the update, the local point that used to sit at
    /// `inverse(movement) · 0` is the new origin, the height follows its Z and
    /// north turns with the movement's Y axis. All three values are computed
    /// before anything is written, so a failure leaves the store untouched.
    pub fn move_earth<S: GeoStore + ?Sized>(
        &self,
        store: &mut S,
        movement: &DAffine3,
    ) -> Result<GeoReference, GeoError> {
        let inverse = try_inverse(movement)?;
        let anchor = inverse.translation;
        let current = self.snapshot(store);

        let origin = self.point_to_latlong(store, anchor)?;
        let origin_height = current.origin_height + anchor.z;
        let turn = planar_angle(movement.matrix3.y_axis, DVec3::Y, DVec3::Z);
        let north_angle = normalize_angle(current.north_angle + turn);

        if !origin.is_finite() || !origin_height.is_finite() || !north_angle.is_finite() {
            return Err(GeoError::NonFinite);
        }

        let updated = GeoReference {
            north_angle,
            origin_height,
            origin,
        };
        debug!(
            from = %current,
            to = %updated,
            turn_deg = turn.to_degrees(),
            "Moving earth"
        );

        self.set_north_angle(store, north_angle)?;
        self.set_height(store, origin_height)?;
        self.set_origin_latlong(store, origin)?;
        Ok(updated)
    }
}

/// Wrap an angle into `[0, 2π)`.
fn normalize_angle(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}
