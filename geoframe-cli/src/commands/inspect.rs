//! Point inspection: where on Earth is a local model point.

use clap::Args;
use glam::DVec3;
use geoframe::config::ConfigFile;
use geoframe::geo::{GeoReferenceModel, LatLong};
use geoframe::host::memory::MemoryHost;

use super::projection_for;
use crate::error::CliError;

/// Arguments for `geoframe inspect`.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Latitude of the model origin in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the model origin in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// North angle in degrees, counter-clockwise from the local Y axis
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub north: f64,

    /// Height of the model origin
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub height: f64,

    /// Local X of the inspected point
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub x: f64,

    /// Local Y of the inspected point
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub y: f64,

    /// Local Z of the inspected point
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub z: f64,
}

/// Print the geo-position of a local point.
pub fn run(args: InspectArgs, config: &ConfigFile) -> Result<(), CliError> {
    let origin = LatLong::new(args.lat, args.lon);
    let compensation = config.geo.north_compensation;
    let host = MemoryHost::new()
        .with_location(origin, args.height, args.north)
        .with_projection(projection_for(compensation));
    let model = GeoReferenceModel::new(compensation);

    let point = DVec3::new(args.x, args.y, args.z);
    let utm = model.point_to_utm(&host, point)?;
    let latlong = utm.to_latlong()?;
    let height = model.point_to_height(&host, point);

    println!("Position:  ({:.3}, {:.3}, {:.3})", point.x, point.y, point.z);
    println!("Lat/Long:  {}", latlong);
    println!("UTM:       {}", utm);
    println!("Height:    {:.3}", height);
    Ok(())
}
