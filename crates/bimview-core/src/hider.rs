// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element visibility
//!
//! An element is visible unless it was hidden explicitly with
//! [`Hider::set`] or belongs to a hidden classification group. Group hides
//! are kept as separate layers, so showing a group again only reveals the
//! members no other layer still hides.

use crate::classifier::GroupKey;
use crate::events::{EventSource, Subscription};
use crate::model::{merge_id_maps, ModelId, ModelIdMap};
use crate::world::World;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

#[derive(Default)]
struct HiderState {
    explicit: ModelIdMap,
    groups: BTreeMap<GroupKey, ModelIdMap>,
}

impl HiderState {
    fn is_hidden(&self, model: ModelId, id: u32) -> bool {
        let contains = |map: &ModelIdMap| map.get(&model).is_some_and(|ids| ids.contains(&id));
        contains(&self.explicit) || self.groups.values().any(contains)
    }
}

/// Batched visibility control over loaded models
pub struct Hider {
    world: Rc<World>,
    state: RefCell<HiderState>,
    changed: EventSource<()>,
}

impl Hider {
    pub fn new(world: Rc<World>) -> Self {
        Self {
            world,
            state: RefCell::new(HiderState::default()),
            changed: EventSource::new(),
        }
    }

    /// Show or hide `items`
    ///
    /// Returns the elements whose effective visibility changed. The backend
    /// receives at most one call per model.
    pub fn set(&self, visible: bool, items: &ModelIdMap) -> ModelIdMap {
        self.apply(items, |state| {
            for (model, ids) in items {
                let hidden = state.explicit.entry(*model).or_default();
                if visible {
                    hidden.retain(|id| !ids.contains(id));
                } else {
                    hidden.extend(ids.iter().copied());
                }
            }
            state.explicit.retain(|_, ids| !ids.is_empty());
        })
    }

    /// Hide or show every member of a classification group
    pub fn set_group(&self, key: &GroupKey, members: &ModelIdMap, visible: bool) -> ModelIdMap {
        let mut touched = members.clone();
        if let Some(layer) = self.state.borrow().groups.get(key) {
            merge_id_maps(&mut touched, layer);
        }

        let key = key.clone();
        self.apply(&touched, move |state| {
            if visible {
                state.groups.remove(&key);
            } else {
                state.groups.insert(key, members.clone());
            }
        })
    }

    /// Keys of the group layers currently hiding elements
    pub fn hidden_groups(&self) -> Vec<GroupKey> {
        self.state.borrow().groups.keys().cloned().collect()
    }

    /// Grow hidden group layers with new members, e.g. of a model loaded later
    ///
    /// Entries for groups that are not hidden are ignored. The backend
    /// receives at most one call per model.
    pub fn extend_hidden_groups(&self, additions: &BTreeMap<GroupKey, ModelIdMap>) -> ModelIdMap {
        let mut touched = ModelIdMap::new();
        {
            let state = self.state.borrow();
            for (key, members) in additions {
                if state.groups.contains_key(key) {
                    merge_id_maps(&mut touched, members);
                }
            }
        }

        self.apply(&touched, |state| {
            for (key, members) in additions {
                if let Some(layer) = state.groups.get_mut(key) {
                    merge_id_maps(layer, members);
                }
            }
        })
    }

    pub fn is_group_hidden(&self, key: &GroupKey) -> bool {
        self.state.borrow().groups.contains_key(key)
    }

    pub fn is_visible(&self, model: ModelId, id: u32) -> bool {
        !self.state.borrow().is_hidden(model, id)
    }

    /// Currently hidden elements of `model`
    pub fn hidden(&self, model: ModelId) -> BTreeSet<u32> {
        let state = self.state.borrow();
        let mut hidden = state.explicit.get(&model).cloned().unwrap_or_default();
        for group in state.groups.values() {
            if let Some(ids) = group.get(&model) {
                hidden.extend(ids.iter().copied());
            }
        }
        hidden
    }

    /// Drop all visibility state of an unloaded model
    pub fn forget_model(&self, model: ModelId) {
        let mut state = self.state.borrow_mut();
        state.explicit.remove(&model);
        for members in state.groups.values_mut() {
            members.remove(&model);
        }
        state.groups.retain(|_, members| !members.is_empty());
    }

    pub fn on_change(&self, handler: impl Fn(&()) + 'static) -> Subscription {
        self.changed.subscribe(handler)
    }

    fn apply(&self, touched: &ModelIdMap, mutate: impl FnOnce(&mut HiderState)) -> ModelIdMap {
        let mut state = self.state.borrow_mut();
        let before: Vec<(ModelId, u32, bool)> = touched
            .iter()
            .flat_map(|(model, ids)| ids.iter().map(move |id| (*model, *id)))
            .map(|(model, id)| (model, id, state.is_hidden(model, id)))
            .collect();

        mutate(&mut *state);

        let mut shown = ModelIdMap::new();
        let mut hidden = ModelIdMap::new();
        for (model, id, was_hidden) in before {
            match (was_hidden, state.is_hidden(model, id)) {
                (true, false) => {
                    shown.entry(model).or_default().insert(id);
                }
                (false, true) => {
                    hidden.entry(model).or_default().insert(id);
                }
                _ => {}
            }
        }
        drop(state);

        if shown.is_empty() && hidden.is_empty() {
            return ModelIdMap::new();
        }

        self.world.with_renderer(|r| {
            for (model, ids) in &shown {
                r.set_visibility(*model, ids, true);
            }
            for (model, ids) in &hidden {
                r.set_visibility(*model, ids, false);
            }
        });
        log::debug!(
            "Visibility changed: {} shown, {} hidden",
            crate::model::id_map_len(&shown),
            crate::model::id_map_len(&hidden)
        );

        merge_id_maps(&mut shown, &hidden);
        self.changed.emit(&());
        shown
    }
}
