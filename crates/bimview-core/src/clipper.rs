// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clipping planes
//!
//! Planes are created on double-click at a picked surface point and cut away
//! everything on the side the surface normal points to (the viewer side),
//! producing a cutaway into the picked element.

use crate::events::{EventSource, Subscription};
use crate::picking::SurfaceHit;
use crate::world::{Ray, World};
use nalgebra::{Point3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Radius around a plane origin that counts as clicking the plane
pub const PLANE_HANDLE_RADIUS: f32 = 5.0;

/// Clipping plane identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct PlaneId(pub u32);

/// Plane through `origin` with unit `normal`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClippingPlane {
    pub id: PlaneId,
    pub origin: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
}

impl ClippingPlane {
    /// Plane equation (normal.xyz, distance)
    pub fn equation(&self) -> [f32; 4] {
        let n = self.normal.into_inner();
        [n.x, n.y, n.z, n.dot(&self.origin.coords)]
    }

    /// Positive on the clipped side
    pub fn signed_distance(&self, point: &Point3<f32>) -> f32 {
        self.normal.dot(&(point - self.origin))
    }

    pub fn clips(&self, point: &Point3<f32>) -> bool {
        self.signed_distance(point) > 0.0
    }

    /// Distance along `ray` to the plane's handle disc
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let normal = self.normal.into_inner();
        let denom = ray.direction.dot(&normal);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (self.origin - ray.origin).dot(&normal) / denom;
        if t < 0.0 {
            return None;
        }
        let offset = ray.at(t) - self.origin;
        (offset.norm() <= PLANE_HANDLE_RADIUS).then_some(t)
    }
}

#[derive(Debug)]
struct ClipperState {
    planes: Vec<ClippingPlane>,
    next_id: u32,
    enabled: bool,
    visible: bool,
    target: Option<PlaneId>,
}

/// Clipping tool state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipperSummary {
    pub count: usize,
    pub enabled: bool,
    pub visible: bool,
}

/// Creates, deletes and shows/hides clipping planes
pub struct Clipper {
    world: Rc<World>,
    state: RefCell<ClipperState>,
    changed: EventSource<ClipperSummary>,
}

impl Clipper {
    pub fn new(world: Rc<World>) -> Self {
        Self {
            world,
            state: RefCell::new(ClipperState {
                planes: Vec::new(),
                next_id: 1,
                enabled: true,
                visible: true,
                target: None,
            }),
            changed: EventSource::new(),
        }
    }

    /// Create a plane at a picked surface point
    ///
    /// Returns `None` while the tool is disabled.
    pub fn create_at(&self, hit: &SurfaceHit) -> Option<PlaneId> {
        if !self.state.borrow().enabled {
            return None;
        }
        Some(self.create(hit.point, hit.normal))
    }

    /// Create a plane from an origin and a unit normal
    pub fn create(&self, origin: Point3<f32>, normal: Unit<Vector3<f32>>) -> PlaneId {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = PlaneId(state.next_id);
            state.next_id += 1;
            state.planes.push(ClippingPlane { id, origin, normal });
            id
        };
        log::debug!("Created clipping plane {:?} at {:?}", id, origin);
        self.sync();
        id
    }

    /// Mark the plane the next delete acts on
    pub fn set_target(&self, id: Option<PlaneId>) {
        let mut state = self.state.borrow_mut();
        state.target = id.filter(|id| state.planes.iter().any(|p| p.id == *id));
    }

    pub fn target(&self) -> Option<PlaneId> {
        self.state.borrow().target
    }

    /// Nearest visible plane whose handle `ray` passes through
    pub fn pick(&self, ray: &Ray) -> Option<PlaneId> {
        let state = self.state.borrow();
        if !state.visible {
            return None;
        }
        state
            .planes
            .iter()
            .filter_map(|p| p.intersect(ray).map(|t| (t, p.id)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id)
    }

    /// Delete `id`, or the targeted plane, or the most recent one
    pub fn delete(&self, id: Option<PlaneId>) -> Option<ClippingPlane> {
        let removed = {
            let mut state = self.state.borrow_mut();
            let wanted = id.or(state.target).or_else(|| state.planes.last().map(|p| p.id))?;
            let pos = state.planes.iter().position(|p| p.id == wanted)?;
            if state.target == Some(wanted) {
                state.target = None;
            }
            state.planes.remove(pos)
        };
        self.sync();
        Some(removed)
    }

    /// Delete every plane; returns how many were removed
    pub fn delete_all(&self) -> usize {
        let count = {
            let mut state = self.state.borrow_mut();
            state.target = None;
            std::mem::take(&mut state.planes).len()
        };
        if count > 0 {
            self.sync();
        }
        count
    }

    /// Flip global visibility of all planes without deleting them
    pub fn toggle_visibility(&self) -> bool {
        let visible = {
            let mut state = self.state.borrow_mut();
            state.visible = !state.visible;
            state.visible
        };
        self.sync();
        visible
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
        self.changed.emit(&self.summary());
    }

    pub fn planes(&self) -> Vec<ClippingPlane> {
        self.state.borrow().planes.clone()
    }

    pub fn summary(&self) -> ClipperSummary {
        let state = self.state.borrow();
        ClipperSummary {
            count: state.planes.len(),
            enabled: state.enabled,
            visible: state.visible,
        }
    }

    /// Whether visible planes cut `point` away
    pub fn is_clipped(&self, point: &Point3<f32>) -> bool {
        let state = self.state.borrow();
        state.visible && state.planes.iter().any(|p| p.clips(point))
    }

    pub fn on_change(&self, handler: impl Fn(&ClipperSummary) + 'static) -> Subscription {
        self.changed.subscribe(handler)
    }

    fn sync(&self) {
        {
            let state = self.state.borrow();
            self.world
                .with_renderer(|r| r.set_clipping_planes(&state.planes, state.visible));
        }
        self.changed.emit(&self.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{headless_world, HeadlessBackend};

    fn clipper() -> (Clipper, HeadlessBackend) {
        let (world, backend) = headless_world();
        (Clipper::new(world), backend)
    }

    #[test]
    fn test_create_then_delete_restores_plane_set() {
        let (clipper, _) = clipper();
        let existing = clipper.create(Point3::origin(), Vector3::x_axis());
        let before = clipper.planes();

        let id = clipper.create(Point3::new(1.0, 2.0, 3.0), Vector3::y_axis());
        assert_eq!(clipper.planes().len(), 2);
        assert_eq!(clipper.delete(Some(id)).map(|p| p.id), Some(id));

        assert_eq!(clipper.planes(), before);
        assert_eq!(clipper.planes()[0].id, existing);
    }

    #[test]
    fn test_delete_prefers_target_then_latest() {
        let (clipper, _) = clipper();
        let a = clipper.create(Point3::origin(), Vector3::x_axis());
        let b = clipper.create(Point3::origin(), Vector3::y_axis());
        let c = clipper.create(Point3::origin(), Vector3::z_axis());

        clipper.set_target(Some(a));
        assert_eq!(clipper.delete(None).unwrap().id, a);
        assert_eq!(clipper.delete(None).unwrap().id, c);
        assert_eq!(clipper.delete(None).unwrap().id, b);
        assert!(clipper.delete(None).is_none());
    }

    #[test]
    fn test_pick_nearest_plane_handle() {
        let (clipper, _) = clipper();
        let low = clipper.create(Point3::origin(), Vector3::z_axis());
        let high = clipper.create(Point3::new(0.0, 0.0, 4.0), Vector3::z_axis());
        let down = Ray::new(Point3::new(1.0, 1.0, 10.0), -Vector3::z());
        assert_eq!(clipper.pick(&down), Some(high));

        // Outside the handle disc, or pointing away
        let far = Ray::new(Point3::new(20.0, 0.0, 10.0), -Vector3::z());
        assert_eq!(clipper.pick(&far), None);
        let up = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::z());
        assert_eq!(clipper.pick(&up), None);

        clipper.delete(Some(high));
        assert_eq!(clipper.pick(&down), Some(low));
        clipper.toggle_visibility();
        assert_eq!(clipper.pick(&down), None);
    }

    #[test]
    fn test_toggle_with_no_planes() {
        let (clipper, backend) = clipper();
        assert!(!clipper.toggle_visibility());
        assert!(clipper.planes().is_empty());
        assert_eq!(backend.clipping(), (0, false));
        assert!(clipper.toggle_visibility());
    }

    #[test]
    fn test_hidden_planes_do_not_clip() {
        let (clipper, _) = clipper();
        clipper.create(Point3::origin(), Vector3::z_axis());

        let front = Point3::new(0.0, 0.0, 1.0);
        let back = Point3::new(0.0, 0.0, -1.0);
        assert!(clipper.is_clipped(&front));
        assert!(!clipper.is_clipped(&back));

        clipper.toggle_visibility();
        assert!(!clipper.is_clipped(&front));
        assert_eq!(clipper.planes().len(), 1);
    }

    #[test]
    fn test_disabled_tool_ignores_hits() {
        let (clipper, _) = clipper();
        clipper.set_enabled(false);
        let hit = SurfaceHit {
            model: crate::model::ModelId(1),
            element: 1,
            point: Point3::origin(),
            normal: Vector3::z_axis(),
            distance: 1.0,
        };
        assert!(clipper.create_at(&hit).is_none());
        assert_eq!(clipper.summary().count, 0);
    }

    #[test]
    fn test_equation() {
        let plane = ClippingPlane {
            id: PlaneId(1),
            origin: Point3::new(0.0, 5.0, 0.0),
            normal: Vector3::y_axis(),
        };
        assert_eq!(plane.equation(), [0.0, 1.0, 0.0, 5.0]);
    }
}
