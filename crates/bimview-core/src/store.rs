// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observable viewer state
//!
//! Adapters never talk to the panel directly; they mutate the store and the
//! store notifies once per effective change.

use crate::action::ActionId;
use crate::clipper::ClipperSummary;
use crate::events::{EventSource, Subscription};
use crate::model::ModelId;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// A loaded model as shown in the panel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSummary {
    pub id: ModelId,
    pub name: String,
    pub elements: usize,
}

/// One classification group checkbox
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub count: usize,
    pub visible: bool,
}

/// Everything the panel renders from
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewerSnapshot {
    pub models: Vec<ModelSummary>,
    pub categories: Vec<GroupEntry>,
    pub levels: Vec<GroupEntry>,
    pub clipping: ClipperSummary,
    pub busy: BTreeSet<ActionId>,
    /// Label of the selected element
    pub selection: Option<String>,
    /// Property rows of the selected element
    pub properties: Vec<(String, String)>,
    pub last_error: Option<String>,
}

impl ViewerSnapshot {
    pub fn is_busy(&self, action: &ActionId) -> bool {
        self.busy.contains(action)
    }
}

/// Holder of the current [`ViewerSnapshot`]
pub struct ViewerStore {
    state: RefCell<ViewerSnapshot>,
    changed: EventSource<ViewerSnapshot>,
}

impl ViewerStore {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(ViewerSnapshot::default()),
            changed: EventSource::new(),
        })
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        self.state.borrow().clone()
    }

    /// Apply `f`; subscribers are notified once if anything changed
    pub fn mutate(&self, f: impl FnOnce(&mut ViewerSnapshot)) -> bool {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            let before = state.clone();
            f(&mut *state);
            if *state == before {
                return false;
            }
            state.clone()
        };
        self.changed.emit(&snapshot);
        true
    }

    pub fn is_busy(&self, action: &ActionId) -> bool {
        self.state.borrow().is_busy(action)
    }

    /// Mark `action` busy until the returned token is dropped
    ///
    /// Returns `None` if the action is already running.
    pub fn try_begin(self: &Rc<Self>, action: ActionId) -> Option<BusyToken> {
        if self.is_busy(&action) {
            return None;
        }
        self.mutate(|s| {
            s.busy.insert(action.clone());
        });
        Some(BusyToken {
            store: Rc::clone(self),
            action,
        })
    }

    pub fn subscribe(&self, handler: impl Fn(&ViewerSnapshot) + 'static) -> Subscription {
        self.changed.subscribe(handler)
    }
}

/// Clears a busy flag on drop, whatever way the action ended
#[must_use = "the action is only busy while the token is alive"]
pub struct BusyToken {
    store: Rc<ViewerStore>,
    action: ActionId,
}

impl BusyToken {
    pub fn action(&self) -> &ActionId {
        &self.action
    }
}

impl Drop for BusyToken {
    fn drop(&mut self) {
        let action = &self.action;
        self.store.mutate(|s| {
            s.busy.remove(action);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::GroupKey;
    use std::cell::Cell;

    #[test]
    fn test_mutate_notifies_once_per_change() {
        let store = ViewerStore::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = store.subscribe(move |_| c.set(c.get() + 1));

        assert!(store.mutate(|s| s.last_error = Some("boom".into())));
        assert!(!store.mutate(|s| s.last_error = Some("boom".into())));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_busy_token_is_exclusive_and_released() {
        let store = ViewerStore::new();
        let token = store.try_begin(ActionId::LoadIfc).unwrap();
        assert!(store.is_busy(&ActionId::LoadIfc));
        assert!(store.try_begin(ActionId::LoadIfc).is_none());
        assert!(store.try_begin(ActionId::DownloadFragments).is_some());

        drop(token);
        assert!(!store.is_busy(&ActionId::LoadIfc));
        assert!(store.try_begin(ActionId::LoadIfc).is_some());
    }

    #[test]
    fn test_group_busy_flags_are_per_group() {
        let store = ViewerStore::new();
        let walls = ActionId::ToggleGroup(GroupKey::new("Categories", "IFCWALL"));
        let slabs = ActionId::ToggleGroup(GroupKey::new("Categories", "IFCSLAB"));

        let token = store.try_begin(walls.clone()).unwrap();
        assert_eq!(token.action(), &walls);
        assert!(store.try_begin(walls.clone()).is_none());
        let other = store.try_begin(slabs.clone());
        assert!(other.is_some());
        assert!(store.is_busy(&slabs));

        drop(token);
        drop(other);
        assert!(store.snapshot().busy.is_empty());
    }
}
