// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Picking and selection
//!
//! Pointer rays are tested against element bounding boxes first (slab
//! method) and only the surviving meshes are intersected triangle by
//! triangle.

use crate::events::{EventSource, Subscription};
use crate::model::{Bounds, Element, Model, ModelId, ModelIdMap};
use crate::registry::ModelRegistry;
use crate::world::{Ray, World};
use nalgebra::{Point3, Unit, Vector3};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Nearest surface point hit by a ray
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub model: ModelId,
    pub element: u32,
    pub point: Point3<f32>,
    /// Face normal, oriented towards the ray origin
    pub normal: Unit<Vector3<f32>>,
    pub distance: f32,
}

/// Ray-AABB intersection (slab method)
///
/// Returns the entry distance, clamped to 0 when the origin is inside.
pub fn ray_aabb(ray: &Ray, bounds: &Bounds) -> Option<f32> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        let (origin, dir) = (ray.origin[axis], ray.direction[axis]);
        if dir == 0.0 {
            // Parallel to this slab
            if origin < bounds.min[axis] || origin > bounds.max[axis] {
                return None;
            }
            continue;
        }

        let inv_dir = 1.0 / dir;
        let t1 = (bounds.min[axis] - origin) * inv_dir;
        let t2 = (bounds.max[axis] - origin) * inv_dir;
        t_enter = t_enter.max(t1.min(t2));
        t_exit = t_exit.min(t1.max(t2));
    }

    if t_enter <= t_exit && t_exit >= 0.0 {
        Some(t_enter.max(0.0))
    } else {
        None
    }
}

/// Ray-triangle intersection (Möller-Trumbore)
pub fn ray_triangle(ray: &Ray, a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = b - a;
    let edge2 = c - a;
    let h = ray.direction.cross(&edge2);
    let det = edge1.dot(&h);
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = inv_det * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = inv_det * ray.direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = inv_det * edge2.dot(&q);
    (t > EPSILON).then_some(t)
}

fn vertex(positions: &[f32], index: u32) -> Option<Point3<f32>> {
    let i = index as usize * 3;
    let p = positions.get(i..i + 3)?;
    Some(Point3::new(p[0], p[1], p[2]))
}

/// Cast `ray` against all models, returning the nearest accepted hit
///
/// `accept` filters candidate hits (hidden elements, clipped points).
pub fn raycast(
    models: &[Rc<Model>],
    ray: &Ray,
    accept: impl Fn(ModelId, u32, &Point3<f32>) -> bool,
) -> Option<SurfaceHit> {
    let mut closest: Option<SurfaceHit> = None;

    for model in models {
        for (mesh, bounds) in model.meshes_with_bounds() {
            let Some(bounds) = bounds else { continue };
            let Some(entry) = ray_aabb(ray, bounds) else { continue };
            if closest.is_some_and(|hit| entry > hit.distance) {
                continue;
            }

            for tri in mesh.indices.chunks_exact(3) {
                let (Some(a), Some(b), Some(c)) = (
                    vertex(&mesh.positions, tri[0]),
                    vertex(&mesh.positions, tri[1]),
                    vertex(&mesh.positions, tri[2]),
                ) else {
                    continue;
                };
                let Some(t) = ray_triangle(ray, &a, &b, &c) else { continue };
                if closest.is_some_and(|hit| t >= hit.distance) {
                    continue;
                }

                let point = ray.at(t);
                if !accept(model.id(), mesh.element, &point) {
                    continue;
                }

                let mut normal = (b - a).cross(&(c - a));
                if ray.direction.dot(&normal) > 0.0 {
                    normal = -normal;
                }
                let Some(normal) = Unit::try_new(normal, f32::EPSILON) else { continue };

                closest = Some(SurfaceHit {
                    model: model.id(),
                    element: mesh.element,
                    point,
                    normal,
                    distance: t,
                });
            }
        }
    }

    closest
}

/// Currently selected element
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub model: ModelId,
    pub element: u32,
    pub label: String,
    /// Filled when property fetching is enabled
    pub properties: Vec<(String, String)>,
}

/// Single-element selection with backend highlighting
pub struct Highlighter {
    world: Rc<World>,
    selection: RefCell<Option<Selection>>,
    fetch_properties: Cell<bool>,
    changed: EventSource<Option<Selection>>,
}

impl Highlighter {
    pub fn new(world: Rc<World>) -> Self {
        Self {
            world,
            selection: RefCell::new(None),
            fetch_properties: Cell::new(true),
            changed: EventSource::new(),
        }
    }

    pub fn set_fetch_properties(&self, enabled: bool) {
        self.fetch_properties.set(enabled);
    }

    /// Select the hit element, or clear the selection on a miss
    pub fn select(&self, hit: Option<&SurfaceHit>, registry: &ModelRegistry) {
        let selection = hit.and_then(|hit| {
            let model = registry.get(hit.model)?;
            let element = model.element(hit.element);
            Some(Selection {
                model: hit.model,
                element: hit.element,
                label: element
                    .map(Element::display_label)
                    .unwrap_or_else(|| format!("#{}", hit.element)),
                properties: match (self.fetch_properties.get(), element) {
                    (true, Some(element)) => element_properties(element),
                    _ => Vec::new(),
                },
            })
        });

        if *self.selection.borrow() == selection {
            return;
        }
        match &selection {
            Some(s) => log::debug!("Selected {} in {}", s.label, s.model),
            None => log::debug!("Selection cleared"),
        }

        *self.selection.borrow_mut() = selection.clone();
        let ids = self.selected_ids();
        self.world.with_renderer(|r| r.set_highlight(&ids));
        self.changed.emit(&selection);
    }

    pub fn clear(&self) {
        if self.selection.borrow().is_none() {
            return;
        }
        *self.selection.borrow_mut() = None;
        self.world.with_renderer(|r| r.set_highlight(&ModelIdMap::new()));
        self.changed.emit(&None);
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.borrow().clone()
    }

    pub fn selected_ids(&self) -> ModelIdMap {
        let mut map = ModelIdMap::new();
        if let Some(s) = self.selection.borrow().as_ref() {
            map.entry(s.model).or_default().insert(s.element);
        }
        map
    }

    pub fn on_change(&self, handler: impl Fn(&Option<Selection>) + 'static) -> Subscription {
        self.changed.subscribe(handler)
    }
}

fn element_properties(element: &Element) -> Vec<(String, String)> {
    let mut props = vec![
        ("Express ID".to_string(), format!("#{}", element.id)),
        ("Category".to_string(), element.category.clone()),
    ];
    if let Some(name) = &element.name {
        props.push(("Name".to_string(), name.clone()));
    }
    if let Some(global_id) = &element.global_id {
        props.push(("GlobalId".to_string(), global_id.clone()));
    }
    if let Some(level) = &element.level {
        props.push(("Level".to_string(), level.clone()));
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{headless_world, sample_model, BackendCall};
    use approx::assert_relative_eq;

    fn down_ray(x: f32, y: f32) -> Ray {
        Ray::new(Point3::new(x, y, 10.0), -Vector3::z())
    }

    #[test]
    fn test_ray_aabb() {
        let bounds = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        assert_relative_eq!(ray_aabb(&down_ray(0.5, 0.5), &bounds).unwrap(), 9.0);
        assert!(ray_aabb(&down_ray(2.0, 0.5), &bounds).is_none());

        // Axis-parallel ray on the box face
        assert!(ray_aabb(&down_ray(0.0, 0.5), &bounds).is_some());

        // Origin inside
        let inside = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::x());
        assert_eq!(ray_aabb(&inside, &bounds), Some(0.0));
    }

    #[test]
    fn test_ray_triangle() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(ray_triangle(&down_ray(0.25, 0.25), &a, &b, &c).unwrap(), 10.0);
        assert!(ray_triangle(&down_ray(0.75, 0.75), &a, &b, &c).is_none());

        // Parallel
        let side = Ray::new(Point3::new(-1.0, 0.2, 0.0), Vector3::x());
        assert!(ray_triangle(&side, &a, &b, &c).is_none());
    }

    #[test]
    fn test_raycast_picks_nearest_accepted() {
        let registry = ModelRegistry::new();
        let model = registry.insert(sample_model("example"));
        let models = registry.models();

        // Slab (id 3) at z = 0, walls at z = 3 and z = 6 in the sample
        let hit = raycast(&models, &down_ray(0.25, 0.25), |_, _, _| true).unwrap();
        assert_eq!(hit.model, model.id());
        assert_eq!(hit.element, 2);
        assert_relative_eq!(hit.normal.z, 1.0);

        let hit = raycast(&models, &down_ray(0.25, 0.25), |_, id, _| id != 2).unwrap();
        assert_eq!(hit.element, 1);

        assert!(raycast(&models, &down_ray(50.0, 50.0), |_, _, _| true).is_none());
        assert!(raycast(&[], &down_ray(0.25, 0.25), |_, _, _| true).is_none());
    }

    #[test]
    fn test_select_and_clear() {
        let (world, backend) = headless_world();
        let registry = ModelRegistry::new();
        registry.insert(sample_model("example"));
        let highlighter = Highlighter::new(world);

        let hit = raycast(&registry.models(), &down_ray(0.25, 0.25), |_, _, _| true);
        highlighter.select(hit.as_ref(), &registry);
        let selection = highlighter.selection().unwrap();
        assert_eq!(selection.label, "Wall B");
        assert!(selection.properties.iter().any(|(k, v)| k == "Level" && v == "Level 1"));

        highlighter.select(None, &registry);
        assert!(highlighter.selection().is_none());
        assert!(highlighter.selected_ids().is_empty());

        let highlights = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::SetHighlight(_)))
            .count();
        assert_eq!(highlights, 2);
    }
}
