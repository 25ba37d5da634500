//! Viewport and source terrain groups.
//!
//! - [`TerrainHandles`]: resolve-or-refresh lookup of the two groups by name
//! - [`TerrainCropEngine`]: regenerate the viewport content from the source

mod crop;
mod handles;

pub use crop::{CropError, CropReport, TerrainCropEngine};
pub use handles::{TerrainHandles, TerrainPair, TerrainRole};
