// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed event sources with explicit subscription handles
//!
//! Every collaborator that announces changes (registry, camera, store)
//! exposes an [`EventSource`]. Subscribing returns a [`Subscription`] that
//! detaches the handler when dropped, so attach/detach is visible in the
//! owner's lifetime instead of hidden in a global callback list.
//!
//! Handlers run in subscription order. The listener list is not borrowed
//! while handlers execute, so a handler may subscribe, unsubscribe or emit
//! on other sources.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<dyn Fn(&T)>;

struct Listeners<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

/// Single-threaded event source
pub struct EventSource<T> {
    listeners: Rc<RefCell<Listeners<T>>>,
}

impl<T: 'static> EventSource<T> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Register a handler; it stays registered while the handle lives
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.handlers.push((id, Rc::new(handler)));
            id
        };

        let weak: Weak<RefCell<Listeners<T>>> = Rc::downgrade(&self.listeners);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners.borrow_mut().handlers.retain(|(h, _)| *h != id);
                }
            })),
        }
    }

    /// Call every handler with `event`
    pub fn emit(&self, event: &T) {
        let handlers: Vec<Handler<T>> = self
            .listeners
            .borrow()
            .handlers
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    /// Number of live handlers
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().handlers.len()
    }
}

impl<T: 'static> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`EventSource::subscribe`]
#[must_use = "dropping a Subscription detaches its handler"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Detach the handler now
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Keep the handler registered for the lifetime of the source
    pub fn forget(mut self) {
        self.detach = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}
