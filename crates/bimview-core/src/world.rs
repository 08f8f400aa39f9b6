// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewport environment: scene, camera and renderer
//!
//! The renderer itself is an external collaborator reached through
//! [`RenderBackend`]; this module only keeps the bookkeeping the rest of the
//! viewer needs (which models are in the scene, where the camera is).

use crate::clipper::ClippingPlane;
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::events::{EventSource, Subscription};
use crate::model::{Model, ModelId, ModelIdMap};
use nalgebra::{Point3, Unit, Vector3};
use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Call surface of the external 3D toolkit
pub trait RenderBackend {
    /// Attach to a DOM container and start the render loop
    fn attach(&mut self, container: &str, worker_url: &str) -> Result<()>;

    fn set_camera(&mut self, camera: &Camera);

    /// Show or hide the ground grid
    fn set_grid(&mut self, visible: bool);

    /// Add a model's renderable object to the scene graph, bound to `camera`
    fn add_model(&mut self, model: &Model, camera: &Camera);

    fn remove_model(&mut self, model: ModelId);

    /// Show or hide a batch of elements of one model in a single call
    fn set_visibility(&mut self, model: ModelId, elements: &BTreeSet<u32>, visible: bool);

    fn set_clipping_planes(&mut self, planes: &[ClippingPlane], visible: bool);

    fn set_highlight(&mut self, selection: &ModelIdMap);

    /// Force a scene / spatial index update
    fn update(&mut self);
}

/// Ray in world space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: Unit::new_normalize(direction),
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction.into_inner() * t
    }
}

/// Perspective camera
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Viewport width / height
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::new(10.0, 10.0, 10.0),
            target: Point3::origin(),
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    pub fn look_at(position: [f32; 3], target: [f32; 3]) -> Self {
        Self {
            position: Point3::from(position),
            target: Point3::from(target),
            ..Default::default()
        }
    }

    pub fn forward(&self) -> Unit<Vector3<f32>> {
        let dir = self.target - self.position;
        if dir.norm_squared() <= f32::EPSILON {
            Unit::new_unchecked(-Vector3::z())
        } else {
            Unit::new_normalize(dir)
        }
    }

    /// Ray through a point in normalized device coordinates (-1..1, y up)
    pub fn ray_through(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let forward = self.forward().into_inner();
        let world_up = if forward.cross(&Vector3::y()).norm_squared() < 1e-6 {
            Vector3::z()
        } else {
            Vector3::y()
        };
        let right = forward.cross(&world_up).normalize();
        let up = right.cross(&forward);

        let half_h = (self.fov_y * 0.5).tan();
        let half_w = half_h * self.aspect;

        let direction = forward + right * (ndc_x * half_w) + up * (ndc_y * half_h);
        Ray::new(self.position, direction)
    }
}

/// Scene graph bookkeeping
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    updates: u64,
}

/// A model placed in the scene (non-owning)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneObject {
    pub model: ModelId,
    pub camera_bound: bool,
}

impl Scene {
    pub fn contains(&self, model: ModelId) -> bool {
        self.objects.iter().any(|o| o.model == model)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Number of forced scene updates so far
    pub fn update_count(&self) -> u64 {
        self.updates
    }
}

/// Scene, camera and renderer of one viewport
pub struct World {
    scene: RefCell<Scene>,
    camera: RefCell<Camera>,
    renderer: RefCell<Box<dyn RenderBackend>>,
    camera_rest: EventSource<()>,
}

impl World {
    /// Build the world and attach the renderer to `container`
    ///
    /// `container` is the id of an element that exists in the page; `None`
    /// means the lookup failed and is reported as a configuration error.
    pub fn initialize(
        config: &ViewerConfig,
        container: Option<&str>,
        mut renderer: Box<dyn RenderBackend>,
    ) -> Result<Rc<World>> {
        config.validate()?;
        let container = container.ok_or_else(|| {
            ViewerError::config(format!("container element '#{}' not found", config.container))
        })?;

        renderer.attach(container, &config.worker_url)?;

        let camera = Camera::look_at(config.camera.position, config.camera.target);
        renderer.set_camera(&camera);
        renderer.set_grid(config.grid);

        log::info!("Viewport attached to #{}", container);

        Ok(Rc::new(World {
            scene: RefCell::new(Scene::default()),
            camera: RefCell::new(camera),
            renderer: RefCell::new(renderer),
            camera_rest: EventSource::new(),
        }))
    }

    pub fn scene(&self) -> Ref<'_, Scene> {
        self.scene.borrow()
    }

    pub fn camera(&self) -> Camera {
        self.camera.borrow().clone()
    }

    pub fn set_camera(&self, camera: Camera) {
        self.renderer.borrow_mut().set_camera(&camera);
        *self.camera.borrow_mut() = camera;
    }

    /// Run `f` against the renderer
    pub fn with_renderer<R>(&self, f: impl FnOnce(&mut dyn RenderBackend) -> R) -> R {
        let mut renderer = self.renderer.borrow_mut();
        f(renderer.as_mut())
    }

    /// Add a model to the scene bound to the active camera
    ///
    /// Returns `false` when the model is already in the scene.
    pub fn add_model(&self, model: &Model) -> bool {
        let mut scene = self.scene.borrow_mut();
        if scene.contains(model.id()) {
            return false;
        }
        scene.objects.push(SceneObject {
            model: model.id(),
            camera_bound: true,
        });
        drop(scene);

        let camera = self.camera();
        self.renderer.borrow_mut().add_model(model, &camera);
        true
    }

    pub fn remove_model(&self, model: ModelId) -> bool {
        let mut scene = self.scene.borrow_mut();
        let before = scene.objects.len();
        scene.objects.retain(|o| o.model != model);
        let removed = scene.objects.len() != before;
        drop(scene);

        if removed {
            self.renderer.borrow_mut().remove_model(model);
        }
        removed
    }

    /// Force a scene / spatial index update
    pub fn update(&self) {
        self.scene.borrow_mut().updates += 1;
        self.renderer.borrow_mut().update();
    }

    /// Announce that camera motion stopped
    pub fn notify_camera_rest(&self) {
        self.camera_rest.emit(&());
    }

    pub fn on_camera_rest(&self, handler: impl Fn(&()) + 'static) -> Subscription {
        self.camera_rest.subscribe(handler)
    }
}
