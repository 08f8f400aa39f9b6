// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry to scene synchronization

use crate::events::Subscription;
use crate::registry::ModelRegistry;
use crate::world::World;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Keeps the scene in step with the registry
///
/// Holds the single insertion handler that binds new models to the camera,
/// adds them to the scene and forces a scene update, plus the removal and
/// camera-rest handlers.
pub struct SceneSync {
    world: Rc<World>,
    registry: Rc<ModelRegistry>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl SceneSync {
    pub fn new(world: Rc<World>, registry: Rc<ModelRegistry>) -> Self {
        Self {
            world,
            registry,
            subscriptions: RefCell::new(Vec::new()),
        }
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.borrow().is_empty()
    }

    /// Register the handlers; a second call is a no-op
    ///
    /// Models already in the registry are synced immediately.
    pub fn attach(&self) -> bool {
        if self.is_attached() {
            log::debug!("Scene sync already attached");
            return false;
        }

        let weak: Weak<World> = Rc::downgrade(&self.world);
        let on_added = self.registry.on_added(move |model| {
            let Some(world) = weak.upgrade() else { return };
            if world.add_model(model) {
                world.update();
            }
        });

        let weak: Weak<World> = Rc::downgrade(&self.world);
        let on_removed = self.registry.on_removed(move |id| {
            let Some(world) = weak.upgrade() else { return };
            if world.remove_model(*id) {
                world.update();
            }
        });

        let weak: Weak<World> = Rc::downgrade(&self.world);
        let on_rest = self.world.on_camera_rest(move |_| {
            if let Some(world) = weak.upgrade() {
                world.update();
            }
        });

        self.subscriptions
            .borrow_mut()
            .extend([on_added, on_removed, on_rest]);

        let mut synced = false;
        for model in self.registry.models() {
            synced |= self.world.add_model(&model);
        }
        if synced {
            self.world.update();
        }
        true
    }

    /// Drop every handler
    pub fn detach(&self) {
        self.subscriptions.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelData;
    use crate::testing::{headless_world, BackendCall};

    #[test]
    fn test_attach_twice_adds_once() {
        let (world, backend) = headless_world();
        let registry = Rc::new(ModelRegistry::new());
        let sync = SceneSync::new(Rc::clone(&world), Rc::clone(&registry));

        assert!(sync.attach());
        assert!(!sync.attach());

        let model = registry.insert(ModelData::new("m"));
        let adds = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::AddModel(id) if *id == model.id()))
            .count();
        assert_eq!(adds, 1);
        assert_eq!(world.scene().objects().len(), 1);
        assert!(world.scene().objects()[0].camera_bound);
        assert_eq!(world.scene().update_count(), 1);
    }

    #[test]
    fn test_camera_rest_forces_update() {
        let (world, _) = headless_world();
        let registry = Rc::new(ModelRegistry::new());
        let sync = SceneSync::new(Rc::clone(&world), registry);
        sync.attach();

        world.notify_camera_rest();
        world.notify_camera_rest();
        assert_eq!(world.scene().update_count(), 2);

        sync.detach();
        world.notify_camera_rest();
        assert_eq!(world.scene().update_count(), 2);
    }

    #[test]
    fn test_late_attach_syncs_existing_models() {
        let (world, _) = headless_world();
        let registry = Rc::new(ModelRegistry::new());
        let model = registry.insert(ModelData::new("early"));

        let sync = SceneSync::new(Rc::clone(&world), Rc::clone(&registry));
        sync.attach();
        assert!(world.scene().contains(model.id()));

        registry.remove(model.id());
        assert!(!world.scene().contains(model.id()));
    }
}
