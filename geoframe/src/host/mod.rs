//! Host application interfaces.
//!
//! The synchronization core never owns geometry. Everything it reads or
//! changes goes through the traits in this module, which mirror what a
//! modelling application exposes to plugins:
//!
//! - [`SceneHost`]: groups, transforms, bounds, faces, solids, intersection
//! - [`GeoStore`]: the model's geo-location fields and native projection
//! - [`AttributeStore`]: per-group key/value persistence
//! - [`Transactions`]: undo-grouped edit scopes
//! - [`NotificationSource`]: change observers
//!
//! [`memory::MemoryHost`] implements all of them in memory.

pub mod memory;

use glam::{DAffine3, DVec3};
use thiserror::Error;

use crate::geo::{LatLong, UtmCoord};
use crate::math::BoundingBox;
use crate::sync::ChangeNotifier;

/// Handle to a group (or component instance) in the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

/// Handle to a face inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u64);

/// Handle to an edge inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u64);

/// Handle to a registered change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An edge with its endpoints in the owning group's frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSegment {
    /// Edge handle.
    pub id: EdgeId,
    /// First endpoint.
    pub start: DVec3,
    /// Second endpoint.
    pub end: DVec3,
}

impl EdgeSegment {
    /// Point halfway between the endpoints.
    pub fn midpoint(&self) -> DVec3 {
        self.start.lerp(self.end, 0.5)
    }
}

/// Errors reported by a host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The group was deleted or never existed.
    #[error("group {0} no longer exists")]
    InvalidGroup(GroupId),

    /// The face is not part of the group.
    #[error("face {face:?} not found in group {group}")]
    UnknownFace { group: GroupId, face: FaceId },

    /// Points do not describe a usable planar face.
    #[error("degenerate face: {0}")]
    DegenerateFace(String),

    /// Operation needs a group with a parent.
    #[error("group {0} has no parent")]
    NoParent(GroupId),

    /// Transaction calls out of order.
    #[error("no operation is open")]
    NoOpenOperation,

    /// A second operation was started before the first ended.
    #[error("operation '{0}' is already open")]
    OperationAlreadyOpen(String),

    /// The host's projection failed.
    #[error("projection failed: {0}")]
    Projection(String),

    /// The host refused the edit.
    #[error("host rejected the edit: {0}")]
    Rejected(String),
}

/// Scene graph primitives used by the synchronization cycle.
///
/// Transforms are expressed in the parent's frame; group content (faces and
/// edges) lives in the group's own frame.
pub trait SceneHost {
    /// Find a top-level group by name.
    fn find_group(&self, name: &str) -> Option<GroupId>;

    /// Whether a handle still refers to a live group.
    fn is_valid(&self, group: GroupId) -> bool;

    /// Current transform of a group.
    fn transform(&self, group: GroupId) -> Result<DAffine3, HostError>;

    /// Replace the transform of a group.
    fn set_transform(&mut self, group: GroupId, transform: DAffine3) -> Result<(), HostError>;

    /// Apply `transform` on top of the current one, in the parent's frame.
    fn transform_by(&mut self, group: GroupId, transform: DAffine3) -> Result<(), HostError> {
        let current = self.transform(group)?;
        self.set_transform(group, transform * current)
    }

    /// Bounds of the group's content in its own frame, nested groups included.
    fn content_bounds(&self, group: GroupId) -> Result<BoundingBox, HostError>;

    /// Erase everything inside the group.
    fn clear(&mut self, group: GroupId) -> Result<(), HostError>;

    /// Place a copy of `source`'s content inside `parent` as a nested instance.
    fn add_instance(
        &mut self,
        parent: GroupId,
        source: GroupId,
        transform: DAffine3,
    ) -> Result<GroupId, HostError>;

    /// Dissolve a nested instance into loose geometry of its parent.
    ///
    /// Groups nested inside the instance are dissolved as well, so no group
    /// from the instance survives under `parent`.
    fn explode(&mut self, instance: GroupId) -> Result<(), HostError>;

    /// Create an empty nested group.
    fn add_group(&mut self, parent: GroupId) -> Result<GroupId, HostError>;

    /// Create a planar face from a closed loop of points.
    fn add_face(&mut self, group: GroupId, points: &[DVec3]) -> Result<FaceId, HostError>;

    /// Unit normal of a face.
    fn face_normal(&self, group: GroupId, face: FaceId) -> Result<DVec3, HostError>;

    /// Flip a face's orientation.
    fn reverse_face(&mut self, group: GroupId, face: FaceId) -> Result<(), HostError>;

    /// Extrude a face along its normal into a closed solid.
    fn pushpull(&mut self, group: GroupId, face: FaceId, distance: f64) -> Result<(), HostError>;

    /// Intersect the loose geometry of `target` with the solid in `cutter`,
    /// in place.
    fn intersect_with(&mut self, target: GroupId, cutter: GroupId) -> Result<(), HostError>;

    /// Loose edges of a group.
    fn edges(&self, group: GroupId) -> Result<Vec<EdgeSegment>, HostError>;

    /// Erase edges, and the faces bounded by them.
    fn erase_edges(&mut self, group: GroupId, edges: &[EdgeId]) -> Result<(), HostError>;

    /// Erase a group and its content.
    fn erase(&mut self, group: GroupId) -> Result<(), HostError>;
}

/// The model's geo-location fields.
pub trait GeoStore {
    /// North angle in degrees, counter-clockwise from the local Y axis.
    fn north_angle_degrees(&self) -> f64;

    /// Set the north angle in degrees.
    fn set_north_angle_degrees(&mut self, degrees: f64) -> Result<(), HostError>;

    /// Height of the local origin.
    fn origin_height(&self) -> f64;

    /// Set the height of the local origin.
    fn set_origin_height(&mut self, height: f64) -> Result<(), HostError>;

    /// Position of the local origin.
    fn origin_latlong(&self) -> LatLong;

    /// Set the position of the local origin.
    fn set_origin_latlong(&mut self, position: LatLong) -> Result<(), HostError>;

    /// The host's own local point → UTM projection, quirks included.
    fn native_point_to_utm(&self, point: DVec3) -> Result<UtmCoord, HostError>;
}

/// Per-group named key/value storage that survives save and reload.
pub trait AttributeStore {
    /// Read a value.
    fn get_attribute(&self, group: GroupId, namespace: &str, key: &str) -> Option<String>;

    /// Write a value.
    fn set_attribute(
        &mut self,
        group: GroupId,
        namespace: &str,
        key: &str,
        value: String,
    ) -> Result<(), HostError>;
}

/// Undo-grouped edit scopes.
pub trait Transactions {
    /// Open an operation. A `transparent` operation merges into the previous
    /// undo step when committed.
    fn start_operation(&mut self, name: &str, transparent: bool) -> Result<(), HostError>;

    /// Close the open operation, keeping its changes.
    fn commit_operation(&mut self) -> Result<(), HostError>;

    /// Close the open operation, rolling back all of its changes.
    fn abort_operation(&mut self) -> Result<(), HostError>;
}

/// Delivery of "something changed" callbacks for a group.
pub trait NotificationSource {
    /// Call `notifier` whenever `group` changes.
    fn add_observer(
        &mut self,
        group: GroupId,
        notifier: ChangeNotifier,
    ) -> Result<ObserverId, HostError>;

    /// Stop notifying an observer.
    fn remove_observer(&mut self, observer: ObserverId) -> Result<(), HostError>;
}

/// Everything the synchronization cycle needs from a host.
pub trait Host: SceneHost + GeoStore + AttributeStore + Transactions {}

impl<T: SceneHost + GeoStore + AttributeStore + Transactions + ?Sized> Host for T {}
