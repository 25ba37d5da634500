//! CLI subcommands.

pub mod config;
pub mod inspect;
pub mod simulate;

use geoframe::geo::NorthCompensation;
use geoframe::host::memory::NativeProjection;

/// The host projection a compensation setting is meant to correct.
pub fn projection_for(compensation: NorthCompensation) -> NativeProjection {
    match compensation {
        NorthCompensation::DoubleAngle => NativeProjection::ReversedNorth,
        NorthCompensation::None => NativeProjection::Correct,
    }
}
