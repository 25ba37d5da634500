//! geoframe - Terrain viewport synchronization for geo-located 3D models
//!
//! A terrain model is split into two groups: a hidden *source* group holding
//! the full elevation dataset and a user-editable *viewport* group showing a
//! cropped window of it. When the user edits the viewport frame, the change
//! is classified from the transform delta and either relocates the model's
//! geo-reference (move/rotate) or re-crops the source to the new footprint
//! (resize).
//!
//! The host modeling application is abstracted behind the traits in
//! [`host`]; [`host::memory::MemoryHost`] is an in-memory implementation
//! used by the CLI and tests.

pub mod config;
pub mod geo;
pub mod host;
pub mod logging;
pub mod math;
pub mod sync;
pub mod terrain;
pub mod tracker;
