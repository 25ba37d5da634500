//! In-memory reference host.
//!
//! [`MemoryHost`] implements every host trait over a small scene graph:
//! named top-level groups, nested groups, planar faces, edges, per-group
//! attributes and a geo-location. It behaves like a desktop modelling
//! application where the synchronization code depends on that behavior:
//!
//! - horizontal faces are created facing down
//! - transactions snapshot the model; abort restores it, commit pushes an
//!   undo step, and transparent operations merge into the previous step
//! - observers are told about every change to a group or its descendants
//! - the native projection can carry the reversed north rotation some hosts
//!   have, see [`NativeProjection`]
//!
//! Failures can be injected per call site with [`MemoryHost::fail_next`].

mod demo;
mod kernel;

pub use demo::{
    demo_scene, DemoScene, DEMO_HEIGHT, DEMO_ORIGIN, DEMO_SOURCE_HALF_EXTENT, DEMO_SOURCE_SPACING,
    DEMO_VIEWPORT_HALF_EXTENT,
};

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::{DAffine3, DVec3};
use tracing::{debug, trace};

use self::kernel::{EdgeKey, Plane};
use super::{
    AttributeStore, EdgeId, EdgeSegment, FaceId, GeoStore, GroupId, HostError, NotificationSource,
    ObserverId, SceneHost, Transactions,
};
use crate::geo::{LatLong, UtmCoord};
use crate::math::{try_inverse, BoundingBox};
use crate::sync::ChangeNotifier;

/// Largest vertex offset from the face plane accepted by `add_face`,
/// relative to the face size.
const PLANARITY_TOLERANCE: f64 = 1e-6;

/// How the host's own point → UTM projection handles the north angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NativeProjection {
    /// Rotates local points by `+north_angle` before projecting, the wrong
    /// way round.
    #[default]
    ReversedNorth,
    /// Rotates by `-north_angle`, which maps local Y onto true north.
    Correct,
}

/// Call sites where a failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `set_transform` and `transform_by`.
    SetTransform,
    /// Any geo-location write.
    GeoWrite,
    /// `add_instance`.
    AddInstance,
    /// `intersect_with`.
    Intersect,
    /// `erase_edges`.
    EraseEdges,
    /// `commit_operation`.
    Commit,
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Committed as its own undo step.
    Committed,
    /// Committed into the previous undo step.
    Merged,
    /// Rolled back.
    Aborted,
}

/// One finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// Name given at start.
    pub name: String,
    /// How it ended.
    pub status: OperationStatus,
}

#[derive(Debug, Clone)]
struct Face {
    points: Vec<DVec3>,
    edges: Vec<EdgeId>,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    start: DVec3,
    end: DVec3,
}

#[derive(Debug, Clone)]
struct Group {
    name: Option<String>,
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    transform: DAffine3,
    faces: BTreeMap<FaceId, Face>,
    edges: BTreeMap<EdgeId, Edge>,
    edge_index: HashMap<EdgeKey, EdgeId>,
    attributes: BTreeMap<(String, String), String>,
}

impl Group {
    fn new(name: Option<String>, parent: Option<GroupId>, transform: DAffine3) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            transform,
            faces: BTreeMap::new(),
            edges: BTreeMap::new(),
            edge_index: HashMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    fn insert_edge(&mut self, start: DVec3, end: DVec3, next_id: &mut u64) -> EdgeId {
        let key = kernel::edge_key(start, end);
        if let Some(id) = self.edge_index.get(&key) {
            return *id;
        }
        let id = EdgeId(take_id(next_id));
        self.edges.insert(id, Edge { start, end });
        self.edge_index.insert(key, id);
        id
    }

    fn insert_face(&mut self, points: Vec<DVec3>, next_id: &mut u64) -> FaceId {
        let edges = (0..points.len())
            .map(|i| {
                let j = (i + 1) % points.len();
                self.insert_edge(points[i], points[j], next_id)
            })
            .collect();
        let id = FaceId(take_id(next_id));
        self.faces.insert(id, Face { points, edges });
        id
    }

    fn clear_geometry(&mut self) {
        self.faces.clear();
        self.edges.clear();
        self.edge_index.clear();
    }

    /// Bounds of the group's own faces and edges.
    fn own_bounds(&self) -> BoundingBox {
        let face_points = self.faces.values().flat_map(|f| f.points.iter().copied());
        let edge_points = self.edges.values().flat_map(|e| [e.start, e.end]);
        BoundingBox::from_points(face_points.chain(edge_points))
    }

    /// Edges not bounding any face.
    fn loose_segments(&self) -> Vec<(DVec3, DVec3)> {
        let used: HashSet<EdgeId> = self
            .faces
            .values()
            .flat_map(|f| f.edges.iter().copied())
            .collect();
        self.edges
            .iter()
            .filter(|(id, _)| !used.contains(id))
            .map(|(_, e)| (e.start, e.end))
            .collect()
    }
}

fn take_id(next_id: &mut u64) -> u64 {
    let id = *next_id;
    *next_id += 1;
    id
}

/// A group and its descendants, detached from the arena.
struct GroupTemplate {
    group: Group,
    children: Vec<GroupTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GeoState {
    north_degrees: f64,
    height: f64,
    origin: LatLong,
}

/// Everything a transaction snapshots.
#[derive(Debug, Clone)]
struct Model {
    groups: BTreeMap<GroupId, Group>,
    geo: GeoState,
}

#[derive(Debug)]
struct OpenOperation {
    name: String,
    transparent: bool,
    before: Model,
}

#[derive(Debug)]
struct UndoStep {
    name: String,
    before: Model,
}

/// In-memory scene implementing every host trait.
#[derive(Debug)]
pub struct MemoryHost {
    model: Model,
    next_id: u64,
    projection: NativeProjection,
    open: Option<OpenOperation>,
    undo_stack: Vec<UndoStep>,
    log: Vec<OperationRecord>,
    observers: BTreeMap<ObserverId, (GroupId, ChangeNotifier)>,
    failures: HashSet<FailPoint>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Empty model located at 0°N 0°E, height 0, north along local Y.
    pub fn new() -> Self {
        Self {
            model: Model {
                groups: BTreeMap::new(),
                geo: GeoState {
                    north_degrees: 0.0,
                    height: 0.0,
                    origin: LatLong::default(),
                },
            },
            next_id: 1,
            projection: NativeProjection::default(),
            open: None,
            undo_stack: Vec::new(),
            log: Vec::new(),
            observers: BTreeMap::new(),
            failures: HashSet::new(),
        }
    }

    /// Set the initial geo-location.
    pub fn with_location(mut self, origin: LatLong, height: f64, north_degrees: f64) -> Self {
        self.model.geo = GeoState {
            north_degrees,
            height,
            origin,
        };
        self
    }

    /// Select the native projection behavior.
    pub fn with_projection(mut self, projection: NativeProjection) -> Self {
        self.projection = projection;
        self
    }

    /// Make the next call through `point` fail with [`HostError::Rejected`].
    pub fn fail_next(&mut self, point: FailPoint) {
        self.failures.insert(point);
    }

    /// Add an empty top-level group.
    pub fn add_top_level_group(&mut self, name: &str) -> GroupId {
        let id = GroupId(take_id(&mut self.next_id));
        self.model.groups.insert(
            id,
            Group::new(Some(name.to_string()), None, DAffine3::IDENTITY),
        );
        debug!(group = %id, name, "Group added");
        id
    }

    /// Fill `group` with a triangulated height field over
    /// `[-half_extent, half_extent]²`, sampled every `spacing` units.
    ///
    /// Returns the number of faces added.
    pub fn add_terrain_grid<F>(
        &mut self,
        group: GroupId,
        half_extent: f64,
        spacing: f64,
        height: F,
    ) -> Result<usize, HostError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !(spacing > 0.0) || !(half_extent > 0.0) {
            return Err(HostError::DegenerateFace(format!(
                "grid spacing {} over half extent {}",
                spacing, half_extent
            )));
        }
        let cells = (2.0 * half_extent / spacing).round().max(1.0) as usize;
        let vertex = |i: usize, j: usize| {
            let x = -half_extent + i as f64 * spacing;
            let y = -half_extent + j as f64 * spacing;
            DVec3::new(x, y, height(x, y))
        };

        let mut next_id = self.next_id;
        let mut count = 0;
        let target = self.group_mut(group)?;
        for i in 0..cells {
            for j in 0..cells {
                let (a, b) = (vertex(i, j), vertex(i + 1, j));
                let (c, d) = (vertex(i + 1, j + 1), vertex(i, j + 1));
                target.insert_face(vec![a, b, c], &mut next_id);
                target.insert_face(vec![a, c, d], &mut next_id);
                count += 2;
            }
        }
        self.next_id = next_id;
        self.touch(group);
        Ok(count)
    }

    /// Child groups of `group`.
    pub fn children(&self, group: GroupId) -> Result<Vec<GroupId>, HostError> {
        Ok(self.group(group)?.children.clone())
    }

    /// Number of faces directly in `group`.
    pub fn face_count(&self, group: GroupId) -> Result<usize, HostError> {
        Ok(self.group(group)?.faces.len())
    }

    /// Number of edges directly in `group`.
    pub fn edge_count(&self, group: GroupId) -> Result<usize, HostError> {
        Ok(self.group(group)?.edges.len())
    }

    /// Face loops directly in `group`.
    pub fn faces(&self, group: GroupId) -> Result<Vec<(FaceId, Vec<DVec3>)>, HostError> {
        Ok(self
            .group(group)?
            .faces
            .iter()
            .map(|(id, face)| (*id, face.points.clone()))
            .collect())
    }

    /// Transform from `group`'s frame to the model frame.
    pub fn world_transform(&self, group: GroupId) -> Result<DAffine3, HostError> {
        let mut transform = DAffine3::IDENTITY;
        let mut current = Some(group);
        while let Some(id) = current {
            let data = self.group(id)?;
            transform = data.transform * transform;
            current = data.parent;
        }
        Ok(transform)
    }

    /// Bounds of `group`'s content in the model frame.
    pub fn world_bounds(&self, group: GroupId) -> Result<BoundingBox, HostError> {
        let local = self.content_bounds(group)?;
        Ok(local.transformed(&self.world_transform(group)?))
    }

    /// Finished operations, oldest first.
    pub fn operation_log(&self) -> &[OperationRecord] {
        &self.log
    }

    /// Number of undo steps available.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Undo the most recent step, returning its name.
    ///
    /// Every observer is notified, as the whole model may have changed.
    pub fn undo(&mut self) -> Result<Option<String>, HostError> {
        if let Some(open) = &self.open {
            return Err(HostError::OperationAlreadyOpen(open.name.clone()));
        }
        let Some(step) = self.undo_stack.pop() else {
            return Ok(None);
        };

        self.model = step.before;
        debug!(operation = %step.name, "Undo");
        let notified: Vec<(GroupId, ChangeNotifier)> = self.observers.values().cloned().collect();
        for (group, notifier) in notified {
            notifier.notify(group);
        }
        Ok(Some(step.name))
    }

    fn group(&self, id: GroupId) -> Result<&Group, HostError> {
        self.model.groups.get(&id).ok_or(HostError::InvalidGroup(id))
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut Group, HostError> {
        self.model
            .groups
            .get_mut(&id)
            .ok_or(HostError::InvalidGroup(id))
    }

    fn face(&self, group: GroupId, face: FaceId) -> Result<&Face, HostError> {
        self.group(group)?
            .faces
            .get(&face)
            .ok_or(HostError::UnknownFace { group, face })
    }

    fn check(&mut self, point: FailPoint) -> Result<(), HostError> {
        if self.failures.remove(&point) {
            debug!(?point, "Injected failure");
            return Err(HostError::Rejected(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    /// Notify observers of `group` and of every ancestor.
    fn touch(&self, group: GroupId) {
        let mut chain = Vec::new();
        let mut current = Some(group);
        while let Some(id) = current {
            chain.push(id);
            current = self.model.groups.get(&id).and_then(|g| g.parent);
        }

        for (observed, notifier) in self.observers.values() {
            if chain.contains(observed) {
                trace!(group = %observed, "Notifying observer");
                notifier.notify(*observed);
            }
        }
    }

    /// Remove a group and its descendants from the arena.
    fn remove_subtree(&mut self, id: GroupId) {
        if let Some(group) = self.model.groups.remove(&id) {
            for child in group.children {
                self.remove_subtree(child);
            }
        }
    }

    fn template(&self, id: GroupId) -> Result<GroupTemplate, HostError> {
        let group = self.group(id)?;
        let children = group
            .children
            .iter()
            .map(|child| self.template(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroupTemplate {
            group: group.clone(),
            children,
        })
    }

    fn instantiate(
        &mut self,
        template: GroupTemplate,
        parent: GroupId,
        transform: DAffine3,
    ) -> Result<GroupId, HostError> {
        let id = GroupId(take_id(&mut self.next_id));
        let mut group = Group::new(None, Some(parent), transform);
        let mut next_id = self.next_id;
        for face in template.group.faces.values() {
            group.insert_face(face.points.clone(), &mut next_id);
        }
        for edge in template.group.edges.values() {
            group.insert_edge(edge.start, edge.end, &mut next_id);
        }
        self.next_id = next_id;

        self.model.groups.insert(id, group);
        self.group_mut(parent)?.children.push(id);
        for child in template.children {
            let child_transform = child.group.transform;
            self.instantiate(child, id, child_transform)?;
        }
        Ok(id)
    }

    /// Remove `id` and its descendants, collecting their geometry in the
    /// frame `to_outer` maps the group's parent into.
    fn take_flattened(
        &mut self,
        id: GroupId,
        to_outer: DAffine3,
        faces: &mut Vec<Vec<DVec3>>,
        edges: &mut Vec<(DVec3, DVec3)>,
    ) -> Result<(), HostError> {
        let Some(data) = self.model.groups.remove(&id) else {
            return Err(HostError::InvalidGroup(id));
        };
        let transform = to_outer * data.transform;
        let mirrored = transform.matrix3.determinant() < 0.0;

        for face in data.faces.values() {
            let mut points: Vec<DVec3> = face
                .points
                .iter()
                .map(|p| transform.transform_point3(*p))
                .collect();
            if mirrored {
                points.reverse();
            }
            faces.push(points);
        }
        edges.extend(data.edges.values().map(|edge| {
            (
                transform.transform_point3(edge.start),
                transform.transform_point3(edge.end),
            )
        }));

        for child in data.children {
            self.take_flattened(child, transform, faces, edges)?;
        }
        Ok(())
    }

    /// Face planes of `cutter` expressed in `target`'s frame.
    fn cutter_planes(&self, target: GroupId, cutter: GroupId) -> Result<Vec<Plane>, HostError> {
        let target_world = self.world_transform(target)?;
        let cutter_world = self.world_transform(cutter)?;
        let relative = try_inverse(&target_world)
            .map_err(|e| HostError::Rejected(e.to_string()))?
            * cutter_world;
        let mirrored = relative.matrix3.determinant() < 0.0;

        let mut planes: Vec<Plane> = Vec::new();
        for face in self.group(cutter)?.faces.values() {
            let mut points: Vec<DVec3> = face
                .points
                .iter()
                .map(|p| relative.transform_point3(*p))
                .collect();
            if mirrored {
                points.reverse();
            }
            if let Some(plane) = Plane::from_loop(&points) {
                if !planes.iter().any(|p| p.coincides(&plane)) {
                    planes.push(plane);
                }
            }
        }

        if planes.len() < 4 {
            return Err(HostError::Rejected(format!(
                "cutter {} is not a closed solid",
                cutter
            )));
        }
        Ok(planes)
    }
}

impl SceneHost for MemoryHost {
    fn find_group(&self, name: &str) -> Option<GroupId> {
        self.model
            .groups
            .iter()
            .find(|(_, g)| g.parent.is_none() && g.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    fn is_valid(&self, group: GroupId) -> bool {
        self.model.groups.contains_key(&group)
    }

    fn transform(&self, group: GroupId) -> Result<DAffine3, HostError> {
        Ok(self.group(group)?.transform)
    }

    fn set_transform(&mut self, group: GroupId, transform: DAffine3) -> Result<(), HostError> {
        self.check(FailPoint::SetTransform)?;
        if !transform.is_finite() {
            return Err(HostError::Rejected("transform is not finite".to_string()));
        }
        self.group_mut(group)?.transform = transform;
        self.touch(group);
        Ok(())
    }

    fn content_bounds(&self, group: GroupId) -> Result<BoundingBox, HostError> {
        let data = self.group(group)?;
        let mut bounds = data.own_bounds();
        for child in &data.children {
            let child_bounds = self.content_bounds(*child)?;
            let child_transform = self.group(*child)?.transform;
            bounds = bounds.union(&child_bounds.transformed(&child_transform));
        }
        Ok(bounds)
    }

    fn clear(&mut self, group: GroupId) -> Result<(), HostError> {
        let children = std::mem::take(&mut self.group_mut(group)?.children);
        for child in children {
            self.remove_subtree(child);
        }
        self.group_mut(group)?.clear_geometry();
        self.touch(group);
        Ok(())
    }

    fn add_instance(
        &mut self,
        parent: GroupId,
        source: GroupId,
        transform: DAffine3,
    ) -> Result<GroupId, HostError> {
        self.check(FailPoint::AddInstance)?;
        self.group(parent)?;
        let template = self.template(source)?;
        let id = self.instantiate(template, parent, transform)?;
        self.touch(parent);
        Ok(id)
    }

    fn explode(&mut self, instance: GroupId) -> Result<(), HostError> {
        let parent = self
            .group(instance)?
            .parent
            .ok_or(HostError::NoParent(instance))?;
        self.group_mut(parent)?
            .children
            .retain(|child| *child != instance);

        let mut faces = Vec::new();
        let mut edges = Vec::new();
        self.take_flattened(instance, DAffine3::IDENTITY, &mut faces, &mut edges)?;

        let mut next_id = self.next_id;
        {
            let target = self.group_mut(parent)?;
            for points in faces {
                target.insert_face(points, &mut next_id);
            }
            for (start, end) in edges {
                target.insert_edge(start, end, &mut next_id);
            }
        }
        self.next_id = next_id;
        self.touch(parent);
        Ok(())
    }

    fn add_group(&mut self, parent: GroupId) -> Result<GroupId, HostError> {
        self.group(parent)?;
        let id = GroupId(take_id(&mut self.next_id));
        self.model
            .groups
            .insert(id, Group::new(None, Some(parent), DAffine3::IDENTITY));
        self.group_mut(parent)?.children.push(id);
        self.touch(parent);
        Ok(id)
    }

    fn add_face(&mut self, group: GroupId, points: &[DVec3]) -> Result<FaceId, HostError> {
        self.group(group)?;
        if points.iter().any(|p| !p.is_finite()) {
            return Err(HostError::DegenerateFace("non-finite point".to_string()));
        }
        let Some(mut points) = kernel::clean_loop(points.to_vec()) else {
            return Err(HostError::DegenerateFace(format!(
                "{} points enclose no area",
                points.len()
            )));
        };

        let extent = BoundingBox::from_points(points.iter().copied());
        let size = extent.max.distance(extent.min);
        if kernel::planarity_error(&points) > PLANARITY_TOLERANCE * size.max(1.0) {
            return Err(HostError::DegenerateFace("points are not coplanar".to_string()));
        }

        let normal = kernel::newell_normal(&points).normalize();
        if normal.z > 1.0 - 1e-9 {
            points.reverse();
        }

        let mut next_id = self.next_id;
        let id = self.group_mut(group)?.insert_face(points, &mut next_id);
        self.next_id = next_id;
        self.touch(group);
        Ok(id)
    }

    fn face_normal(&self, group: GroupId, face: FaceId) -> Result<DVec3, HostError> {
        let face = self.face(group, face)?;
        Ok(kernel::newell_normal(&face.points).normalize())
    }

    fn reverse_face(&mut self, group: GroupId, face: FaceId) -> Result<(), HostError> {
        self.face(group, face)?;
        if let Some(data) = self.group_mut(group)?.faces.get_mut(&face) {
            data.points.reverse();
            data.edges.reverse();
        }
        self.touch(group);
        Ok(())
    }

    fn pushpull(&mut self, group: GroupId, face: FaceId, distance: f64) -> Result<(), HostError> {
        let base = self.face(group, face)?.points.clone();
        if !distance.is_finite() {
            return Err(HostError::Rejected("pushpull distance is not finite".to_string()));
        }
        if distance.abs() <= kernel::PLANE_EPSILON {
            return Ok(());
        }

        let offset = kernel::newell_normal(&base).normalize() * distance;
        let top: Vec<DVec3> = base.iter().map(|p| *p + offset).collect();

        let mut loops = vec![base.clone(), top.clone()];
        for i in 0..base.len() {
            let j = (i + 1) % base.len();
            loops.push(vec![base[i], base[j], top[j], top[i]]);
        }

        // Orient every face away from the prism's center.
        let center = kernel::centroid(&[base.as_slice(), top.as_slice()].concat());
        for points in &mut loops {
            let normal = kernel::newell_normal(points);
            if (kernel::centroid(points) - center).dot(normal) < 0.0 {
                points.reverse();
            }
        }

        let mut next_id = self.next_id;
        {
            let target = self.group_mut(group)?;
            target.faces.remove(&face);
            for points in loops {
                target.insert_face(points, &mut next_id);
            }
        }
        self.next_id = next_id;
        self.touch(group);
        Ok(())
    }

    fn intersect_with(&mut self, target: GroupId, cutter: GroupId) -> Result<(), HostError> {
        self.check(FailPoint::Intersect)?;
        let planes = self.cutter_planes(target, cutter)?;

        let (polygons, segments) = {
            let data = self.group(target)?;
            let polygons: Vec<Vec<DVec3>> = data.faces.values().map(|f| f.points.clone()).collect();
            (polygons, data.loose_segments())
        };
        let before = polygons.len();

        let polygons = kernel::split_polygons(polygons, &planes);
        let segments = kernel::split_segments(segments, &planes);
        debug!(
            target = %target,
            planes = planes.len(),
            faces_before = before,
            faces_after = polygons.len(),
            "Intersected with cutter"
        );

        let mut next_id = self.next_id;
        {
            let data = self.group_mut(target)?;
            data.clear_geometry();
            for points in polygons {
                data.insert_face(points, &mut next_id);
            }
            for (start, end) in segments {
                data.insert_edge(start, end, &mut next_id);
            }
        }
        self.next_id = next_id;
        self.touch(target);
        Ok(())
    }

    fn edges(&self, group: GroupId) -> Result<Vec<EdgeSegment>, HostError> {
        Ok(self
            .group(group)?
            .edges
            .iter()
            .map(|(id, e)| EdgeSegment {
                id: *id,
                start: e.start,
                end: e.end,
            })
            .collect())
    }

    fn erase_edges(&mut self, group: GroupId, edges: &[EdgeId]) -> Result<(), HostError> {
        self.check(FailPoint::EraseEdges)?;
        let doomed: HashSet<EdgeId> = edges.iter().copied().collect();
        {
            let data = self.group_mut(group)?;
            data.faces
                .retain(|_, face| !face.edges.iter().any(|e| doomed.contains(e)));
            data.edges.retain(|id, _| !doomed.contains(id));
            data.edge_index.retain(|_, id| !doomed.contains(id));
        }
        self.touch(group);
        Ok(())
    }

    fn erase(&mut self, group: GroupId) -> Result<(), HostError> {
        let parent = self.group(group)?.parent;
        self.touch(group);
        if let Some(parent) = parent {
            self.group_mut(parent)?.children.retain(|c| *c != group);
        }
        self.remove_subtree(group);
        Ok(())
    }
}

impl GeoStore for MemoryHost {
    fn north_angle_degrees(&self) -> f64 {
        self.model.geo.north_degrees
    }

    fn set_north_angle_degrees(&mut self, degrees: f64) -> Result<(), HostError> {
        self.check(FailPoint::GeoWrite)?;
        if !degrees.is_finite() {
            return Err(HostError::Rejected("north angle is not finite".to_string()));
        }
        self.model.geo.north_degrees = degrees;
        Ok(())
    }

    fn origin_height(&self) -> f64 {
        self.model.geo.height
    }

    fn set_origin_height(&mut self, height: f64) -> Result<(), HostError> {
        self.check(FailPoint::GeoWrite)?;
        if !height.is_finite() {
            return Err(HostError::Rejected("height is not finite".to_string()));
        }
        self.model.geo.height = height;
        Ok(())
    }

    fn origin_latlong(&self) -> LatLong {
        self.model.geo.origin
    }

    fn set_origin_latlong(&mut self, position: LatLong) -> Result<(), HostError> {
        self.check(FailPoint::GeoWrite)?;
        if !position.is_finite() {
            return Err(HostError::Rejected("position is not finite".to_string()));
        }
        self.model.geo.origin = position;
        Ok(())
    }

    fn native_point_to_utm(&self, point: DVec3) -> Result<UtmCoord, HostError> {
        let north = self.model.geo.north_degrees.to_radians();
        let angle = match self.projection {
            NativeProjection::ReversedNorth => north,
            NativeProjection::Correct => -north,
        };
        let offset = DAffine3::from_rotation_z(angle).transform_point3(point);
        let origin = UtmCoord::from_latlong(self.model.geo.origin)
            .map_err(|e| HostError::Projection(e.to_string()))?;
        Ok(origin.offset(offset.x, offset.y))
    }
}

impl AttributeStore for MemoryHost {
    fn get_attribute(&self, group: GroupId, namespace: &str, key: &str) -> Option<String> {
        self.model
            .groups
            .get(&group)?
            .attributes
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    fn set_attribute(
        &mut self,
        group: GroupId,
        namespace: &str,
        key: &str,
        value: String,
    ) -> Result<(), HostError> {
        self.group_mut(group)?
            .attributes
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}

impl Transactions for MemoryHost {
    fn start_operation(&mut self, name: &str, transparent: bool) -> Result<(), HostError> {
        if let Some(open) = &self.open {
            return Err(HostError::OperationAlreadyOpen(open.name.clone()));
        }
        trace!(operation = name, transparent, "Operation started");
        self.open = Some(OpenOperation {
            name: name.to_string(),
            transparent,
            before: self.model.clone(),
        });
        Ok(())
    }

    fn commit_operation(&mut self) -> Result<(), HostError> {
        if self.open.is_none() {
            return Err(HostError::NoOpenOperation);
        }
        self.check(FailPoint::Commit)?;
        let Some(open) = self.open.take() else {
            return Err(HostError::NoOpenOperation);
        };

        let status = if open.transparent && !self.undo_stack.is_empty() {
            OperationStatus::Merged
        } else {
            self.undo_stack.push(UndoStep {
                name: open.name.clone(),
                before: open.before,
            });
            OperationStatus::Committed
        };
        trace!(operation = %open.name, ?status, "Operation committed");
        self.log.push(OperationRecord {
            name: open.name,
            status,
        });
        Ok(())
    }

    fn abort_operation(&mut self) -> Result<(), HostError> {
        let Some(open) = self.open.take() else {
            return Err(HostError::NoOpenOperation);
        };
        self.model = open.before;
        debug!(operation = %open.name, "Operation aborted");
        self.log.push(OperationRecord {
            name: open.name,
            status: OperationStatus::Aborted,
        });
        Ok(())
    }
}

impl NotificationSource for MemoryHost {
    fn add_observer(
        &mut self,
        group: GroupId,
        notifier: ChangeNotifier,
    ) -> Result<ObserverId, HostError> {
        self.group(group)?;
        let id = ObserverId(take_id(&mut self.next_id));
        self.observers.insert(id, (group, notifier));
        Ok(id)
    }

    fn remove_observer(&mut self, observer: ObserverId) -> Result<(), HostError> {
        self.observers.remove(&observer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::sync::{ChangeCoordinator, ObserverBridge};

    fn square(half: f64, z: f64) -> Vec<DVec3> {
        vec![
            DVec3::new(-half, -half, z),
            DVec3::new(half, -half, z),
            DVec3::new(half, half, z),
            DVec3::new(-half, half, z),
        ]
    }

    #[test]
    fn test_horizontal_faces_face_down() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");

        let face = host.add_face(group, &square(1.0, 0.0)).unwrap();
        assert!(host
            .face_normal(group, face)
            .unwrap()
            .abs_diff_eq(-DVec3::Z, 1e-12));

        host.reverse_face(group, face).unwrap();
        assert!(host
            .face_normal(group, face)
            .unwrap()
            .abs_diff_eq(DVec3::Z, 1e-12));
    }

    #[test]
    fn test_add_face_rejects_degenerate_loops() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");

        let collinear = [DVec3::ZERO, DVec3::X, DVec3::X * 2.0];
        assert!(matches!(
            host.add_face(group, &collinear),
            Err(HostError::DegenerateFace(_))
        ));

        let mut warped = square(1.0, 0.0);
        warped[2].z = 0.5;
        assert!(host.add_face(group, &warped).is_err());
    }

    #[test]
    fn test_pushpull_builds_closed_box() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Box");
        let face = host.add_face(group, &square(1.0, 0.0)).unwrap();
        host.reverse_face(group, face).unwrap();

        host.pushpull(group, face, 3.0).unwrap();

        assert_eq!(host.face_count(group).unwrap(), 6);
        assert_eq!(host.edge_count(group).unwrap(), 12);
        let bounds = host.content_bounds(group).unwrap();
        assert_eq!(bounds.min.z, 0.0);
        assert_eq!(bounds.max.z, 3.0);
        // Every face points away from the middle of the box.
        for (_, points) in host.faces(group).unwrap() {
            let normal = kernel::newell_normal(&points);
            let out = kernel::centroid(&points) - DVec3::new(0.0, 0.0, 1.5);
            assert!(normal.dot(out) > 0.0);
        }
    }

    #[test]
    fn test_shared_edges_are_reused() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");

        host.add_terrain_grid(group, 1.0, 1.0, |_, _| 0.0).unwrap();

        // 2×2 cells: 8 triangles, 9 vertices, 16 distinct edges.
        assert_eq!(host.face_count(group).unwrap(), 8);
        assert_eq!(host.edge_count(group).unwrap(), 16);
    }

    #[test]
    fn test_instance_and_explode_keep_world_position() {
        let mut host = MemoryHost::new();
        let target = host.add_top_level_group("Terrain");
        let source = host.add_top_level_group("Terrain Data");
        host.add_terrain_grid(source, 2.0, 1.0, |x, _| x).unwrap();
        host.set_transform(source, DAffine3::from_translation(DVec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        host.set_transform(target, DAffine3::from_scale(DVec3::splat(2.0)))
            .unwrap();

        let placement =
            try_inverse(&host.transform(target).unwrap()).unwrap() * host.transform(source).unwrap();
        let instance = host.add_instance(target, source, placement).unwrap();
        host.explode(instance).unwrap();

        assert!(!host.is_valid(instance));
        assert_eq!(host.face_count(target).unwrap(), 32);
        let world = host.world_bounds(target).unwrap();
        let expected = host.world_bounds(source).unwrap();
        assert!(world.min.abs_diff_eq(expected.min, 1e-9));
        assert!(world.max.abs_diff_eq(expected.max, 1e-9));
    }

    #[test]
    fn test_explode_dissolves_nested_groups() {
        let mut host = MemoryHost::new();
        let target = host.add_top_level_group("Terrain");
        let source = host.add_top_level_group("Terrain Data");
        host.add_terrain_grid(source, 2.0, 1.0, |_, _| 0.0).unwrap();
        let nested = host.add_group(source).unwrap();
        host.add_face(nested, &square(1.0, 0.0)).unwrap();
        host.set_transform(nested, DAffine3::from_translation(DVec3::new(0.0, 0.0, 3.0)))
            .unwrap();
        let inner = host.add_group(nested).unwrap();
        host.add_face(inner, &square(1.0, 0.0)).unwrap();
        host.set_transform(inner, DAffine3::from_scale(DVec3::new(4.0, 4.0, 1.0)))
            .unwrap();

        let instance = host.add_instance(target, source, DAffine3::IDENTITY).unwrap();
        host.explode(instance).unwrap();

        assert!(host.children(target).unwrap().is_empty());
        assert_eq!(host.face_count(target).unwrap(), 32 + 2);
        let bounds = host.content_bounds(target).unwrap();
        assert!(bounds.min.abs_diff_eq(DVec3::new(-4.0, -4.0, 0.0), 1e-12));
        assert!(bounds.max.abs_diff_eq(DVec3::new(4.0, 4.0, 3.0), 1e-12));
        assert!(host.is_valid(nested));
    }

    #[test]
    fn test_abort_restores_model() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");

        host.start_operation("Edit", false).unwrap();
        host.set_transform(group, DAffine3::from_rotation_z(1.0)).unwrap();
        host.set_origin_height(42.0).unwrap();
        host.abort_operation().unwrap();

        assert_eq!(host.transform(group).unwrap(), DAffine3::IDENTITY);
        assert_eq!(host.origin_height(), 0.0);
        assert_eq!(host.operation_log()[0].status, OperationStatus::Aborted);
        assert_eq!(host.undo_depth(), 0);
    }

    #[test]
    fn test_transparent_commit_merges_into_previous_step() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");

        host.start_operation("Scale", false).unwrap();
        host.set_transform(group, DAffine3::from_scale(DVec3::splat(2.0)))
            .unwrap();
        host.commit_operation().unwrap();
        host.start_operation("Sync", true).unwrap();
        host.set_origin_height(5.0).unwrap();
        host.commit_operation().unwrap();

        assert_eq!(host.undo_depth(), 1);
        assert_eq!(host.undo().unwrap(), Some("Scale".to_string()));
        assert_eq!(host.transform(group).unwrap(), DAffine3::IDENTITY);
        assert_eq!(host.origin_height(), 0.0);
    }

    #[test]
    fn test_nested_operation_is_rejected() {
        let mut host = MemoryHost::new();
        host.start_operation("Outer", false).unwrap();

        assert_eq!(
            host.start_operation("Inner", true),
            Err(HostError::OperationAlreadyOpen("Outer".to_string()))
        );
        assert_eq!(host.undo(), Err(HostError::OperationAlreadyOpen("Outer".to_string())));
    }

    #[test]
    fn test_observers_hear_about_nested_changes() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");
        let bridge = ObserverBridge::new(ChangeCoordinator::new(&ConfigFile::default()));
        host.add_observer(group, bridge.notifier()).unwrap();

        let child = host.add_group(group).unwrap();
        host.add_face(child, &square(1.0, 0.0)).unwrap();

        let stats = bridge.stats();
        assert_eq!(stats.received, 2);
        assert!(bridge.has_pending());
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let mut host = MemoryHost::new();
        let group = host.add_top_level_group("Terrain");
        host.fail_next(FailPoint::SetTransform);

        assert!(matches!(
            host.set_transform(group, DAffine3::IDENTITY),
            Err(HostError::Rejected(_))
        ));
        assert!(host.set_transform(group, DAffine3::IDENTITY).is_ok());
    }

    #[test]
    fn test_reversed_north_projection() {
        let host = MemoryHost::new()
            .with_location(LatLong::new(45.0, 9.0), 0.0, 90.0)
            .with_projection(NativeProjection::ReversedNorth);
        let origin = UtmCoord::from_latlong(LatLong::new(45.0, 9.0)).unwrap();

        // +90° rotation carries local X onto +Y.
        let utm = host.native_point_to_utm(DVec3::X * 10.0).unwrap();
        assert!((utm.easting - origin.easting).abs() < 1e-9);
        assert!((utm.northing - origin.northing - 10.0).abs() < 1e-9);
    }
}
