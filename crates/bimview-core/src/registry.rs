// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live collection of loaded models

use crate::events::{EventSource, Subscription};
use crate::model::{Model, ModelData, ModelId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Owner of every loaded model in a viewer session
///
/// Insertion order is preserved; [`ModelRegistry::first`] is the oldest
/// model still loaded. Events fire after the collection has been updated,
/// so handlers observe the new state.
pub struct ModelRegistry {
    models: RefCell<Vec<Rc<Model>>>,
    next_id: Cell<u32>,
    added: EventSource<Rc<Model>>,
    removed: EventSource<ModelId>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            added: EventSource::new(),
            removed: EventSource::new(),
        }
    }

    /// Take ownership of parsed data and announce the new model
    pub fn insert(&self, data: ModelData) -> Rc<Model> {
        let id = ModelId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let model = Rc::new(Model::new(id, data));
        self.models.borrow_mut().push(Rc::clone(&model));

        log::debug!(
            "Registered {} '{}' ({} elements, {} meshes)",
            id,
            model.name(),
            model.elements().len(),
            model.meshes().len()
        );
        self.added.emit(&model);
        model
    }

    /// Unload a model
    pub fn remove(&self, id: ModelId) -> Option<Rc<Model>> {
        let removed = {
            let mut models = self.models.borrow_mut();
            let pos = models.iter().position(|m| m.id() == id)?;
            models.remove(pos)
        };
        self.removed.emit(&id);
        Some(removed)
    }

    pub fn get(&self, id: ModelId) -> Option<Rc<Model>> {
        self.models.borrow().iter().find(|m| m.id() == id).cloned()
    }

    pub fn first(&self) -> Option<Rc<Model>> {
        self.models.borrow().first().cloned()
    }

    /// Snapshot of the loaded models in insertion order
    pub fn models(&self) -> Vec<Rc<Model>> {
        self.models.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.models.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.borrow().is_empty()
    }

    /// Subscribe to model insertion
    pub fn on_added(&self, handler: impl Fn(&Rc<Model>) + 'static) -> Subscription {
        self.added.subscribe(handler)
    }

    /// Subscribe to model removal
    pub fn on_removed(&self, handler: impl Fn(&ModelId) + 'static) -> Subscription {
        self.removed.subscribe(handler)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
