// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Leptos rendering of the side panel tree

use bimview_core::{Action, ActionStatus, PanelHost, UiNode, Viewer};
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

/// Panel host writing each tree into a signal
pub struct SignalHost {
    tree: RwSignal<Option<UiNode>>,
}

impl SignalHost {
    pub fn new(tree: RwSignal<Option<UiNode>>) -> Self {
        Self { tree }
    }
}

impl PanelHost for SignalHost {
    fn replace(&mut self, tree: UiNode) {
        self.tree.set(Some(tree));
    }
}

/// Viewer handle usable from event handlers
pub type ViewerHandle = StoredValue<Viewer, LocalStorage>;

fn dispatch(viewer: ViewerHandle, action: Action) {
    let Some(viewer) = viewer.try_get_value() else {
        return;
    };
    spawn_local(async move {
        if let ActionStatus::Failed(message) = viewer.dispatch(action).await {
            log::debug!("Panel action failed: {}", message);
        }
    });
}

fn render_children(children: Vec<UiNode>, viewer: ViewerHandle) -> impl IntoView {
    children
        .into_iter()
        .map(|child| render_node(child, viewer))
        .collect_view()
}

fn render_node(node: UiNode, viewer: ViewerHandle) -> AnyView {
    match node {
        UiNode::Panel { title, children } => view! {
            <div class="side-panel">
                <div class="panel-header">
                    <h2>{title}</h2>
                </div>
                {render_children(children, viewer)}
            </div>
        }
        .into_any(),
        UiNode::Section { title, children } => view! {
            <section class="panel-section">
                <h3 class="section-title">{title}</h3>
                <div class="section-content">{render_children(children, viewer)}</div>
            </section>
        }
        .into_any(),
        UiNode::Button {
            label,
            action,
            loading,
        } => view! {
            <button
                class="panel-btn"
                class:loading=loading
                disabled=loading
                on:click=move |_| dispatch(viewer, action.clone())
            >
                {label}
            </button>
        }
        .into_any(),
        UiNode::Checkbox {
            label,
            checked,
            action,
            busy,
        } => view! {
            <label class="panel-checkbox" class:loading=busy>
                <input
                    type="checkbox"
                    prop:checked=checked
                    disabled=busy
                    on:change=move |_| dispatch(viewer, action.clone())
                />
                <span>{label}</span>
            </label>
        }
        .into_any(),
        UiNode::Label(text) => view! { <p class="panel-label">{text}</p> }.into_any(),
    }
}

/// Side panel re-rendered whenever the store hands over a new tree
#[component]
pub fn SidePanel(tree: RwSignal<Option<UiNode>>, viewer: ViewerHandle) -> impl IntoView {
    view! {
        <aside class="panel-container">
            {move || tree.get().map(|node| render_node(node, viewer))}
        </aside>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimview_core::testing::test_viewer;
    use bimview_core::{Panel, PANEL_TITLE};

    #[test]
    fn test_signal_host_receives_viewer_trees() {
        let t = test_viewer();
        let tree = RwSignal::new(None);
        let mut host = SignalHost::new(tree);

        let node = Panel::render(&t.viewer.store().snapshot());
        host.replace(node.clone());
        assert_eq!(tree.get_untracked(), Some(node));
        assert!(matches!(
            tree.get_untracked(),
            Some(UiNode::Panel { title, .. }) if title == PANEL_TITLE
        ));
    }
}
