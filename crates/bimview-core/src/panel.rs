// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative side panel
//!
//! [`Panel::render`] is a pure function from a [`ViewerSnapshot`] to a
//! [`UiNode`] tree. The host (Leptos on the web, a recorder in tests) only
//! ever receives whole trees through [`PanelHost::replace`].

use crate::action::{Action, ActionId};
use crate::classifier::{GroupKey, CATEGORIES, LEVELS};
use crate::events::Subscription;
use crate::store::{GroupEntry, ViewerSnapshot, ViewerStore};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const PANEL_TITLE: &str = "IFC Viewer";

/// Panel element tree
#[derive(Clone, Debug, PartialEq)]
pub enum UiNode {
    Panel {
        title: String,
        children: Vec<UiNode>,
    },
    Section {
        title: String,
        children: Vec<UiNode>,
    },
    Button {
        label: String,
        action: Action,
        /// Shows a spinner and ignores clicks
        loading: bool,
    },
    Checkbox {
        label: String,
        checked: bool,
        action: Action,
        /// Ignores clicks while the bound action runs
        busy: bool,
    },
    Label(String),
}

impl UiNode {
    /// Depth-first search for a section by title
    pub fn section(&self, title: &str) -> Option<&UiNode> {
        match self {
            UiNode::Section { title: t, .. } if t == title => Some(self),
            UiNode::Panel { children, .. } | UiNode::Section { children, .. } => {
                children.iter().find_map(|c| c.section(title))
            }
            _ => None,
        }
    }

    pub fn children(&self) -> &[UiNode] {
        match self {
            UiNode::Panel { children, .. } | UiNode::Section { children, .. } => children.as_slice(),
            _ => &[],
        }
    }

    /// First button bound to `action`
    pub fn button(&self, action: &Action) -> Option<&UiNode> {
        match self {
            UiNode::Button { action: a, .. } if a == action => Some(self),
            _ => self.children().iter().find_map(|c| c.button(action)),
        }
    }
}

/// Receiver of rendered trees
pub trait PanelHost {
    /// Replace whatever is currently displayed with `tree`
    fn replace(&mut self, tree: UiNode);
}

/// Store-driven panel
pub struct Panel {
    store: Rc<ViewerStore>,
    host: RefCell<Box<dyn PanelHost>>,
    renders: Cell<u64>,
    subscription: RefCell<Option<Subscription>>,
}

impl Panel {
    /// Render once and re-render on every store change
    pub fn attach(store: Rc<ViewerStore>, host: Box<dyn PanelHost>) -> Rc<Self> {
        let panel = Rc::new(Self {
            store: Rc::clone(&store),
            host: RefCell::new(host),
            renders: Cell::new(0),
            subscription: RefCell::new(None),
        });

        let weak = Rc::downgrade(&panel);
        let subscription = store.subscribe(move |snapshot| {
            if let Some(panel) = weak.upgrade() {
                panel.show(Panel::render(snapshot));
            }
        });
        *panel.subscription.borrow_mut() = Some(subscription);

        panel.invalidate();
        panel
    }

    /// Rebuild from the current store state and hand the tree to the host
    pub fn invalidate(&self) {
        let tree = Panel::render(&self.store.snapshot());
        self.show(tree);
    }

    /// Number of trees handed to the host so far
    pub fn render_count(&self) -> u64 {
        self.renders.get()
    }

    fn show(&self, tree: UiNode) {
        self.renders.set(self.renders.get() + 1);
        self.host.borrow_mut().replace(tree);
    }

    pub fn render(snapshot: &ViewerSnapshot) -> UiNode {
        UiNode::Panel {
            title: PANEL_TITLE.to_string(),
            children: vec![
                controls_section(snapshot),
                groups_section(
                    snapshot,
                    CATEGORIES,
                    &snapshot.categories,
                    "No categories: load a model first",
                ),
                groups_section(
                    snapshot,
                    LEVELS,
                    &snapshot.levels,
                    "No levels: load a model first",
                ),
                clipping_section(snapshot),
            ],
        }
    }
}

fn controls_section(snapshot: &ViewerSnapshot) -> UiNode {
    let mut children = vec![
        UiNode::Button {
            label: "Load IFC".to_string(),
            action: Action::LoadIfc,
            loading: snapshot.is_busy(&ActionId::LoadIfc),
        },
        UiNode::Button {
            label: "Load Fragments".to_string(),
            action: Action::LoadFragments,
            loading: snapshot.is_busy(&ActionId::LoadFragments),
        },
        UiNode::Button {
            label: "Download Fragments".to_string(),
            action: Action::DownloadFragments,
            loading: snapshot.is_busy(&ActionId::DownloadFragments),
        },
    ];

    if snapshot.models.is_empty() {
        children.push(UiNode::Label("No model loaded".to_string()));
    }
    for model in &snapshot.models {
        children.push(UiNode::Label(format!(
            "{} ({} elements)",
            model.name, model.elements
        )));
    }
    if let Some(selection) = &snapshot.selection {
        children.push(UiNode::Label(format!("Selected: {}", selection)));
        children.extend(
            snapshot
                .properties
                .iter()
                .map(|(key, value)| UiNode::Label(format!("{}: {}", key, value))),
        );
    }
    if let Some(error) = &snapshot.last_error {
        children.push(UiNode::Label(format!("Error: {}", error)));
    }

    UiNode::Section {
        title: "Controls".to_string(),
        children,
    }
}

fn groups_section(
    snapshot: &ViewerSnapshot,
    classification: &str,
    groups: &[GroupEntry],
    placeholder: &str,
) -> UiNode {
    let children = if groups.is_empty() {
        vec![UiNode::Label(placeholder.to_string())]
    } else {
        groups
            .iter()
            .map(|group| {
                let key = GroupKey::new(classification, group.name.clone());
                UiNode::Checkbox {
                    label: format!("{} ({})", group.name, group.count),
                    checked: group.visible,
                    busy: snapshot.is_busy(&ActionId::ToggleGroup(key.clone())),
                    action: Action::ToggleGroup(key),
                }
            })
            .collect()
    };

    UiNode::Section {
        title: classification.to_string(),
        children,
    }
}

fn clipping_section(snapshot: &ViewerSnapshot) -> UiNode {
    let clipping = &snapshot.clipping;
    let mut children = vec![
        UiNode::Checkbox {
            label: "Double-click creates planes".to_string(),
            checked: clipping.enabled,
            action: Action::ToggleClipper,
            busy: false,
        },
        UiNode::Button {
            label: "Toggle Clippings".to_string(),
            action: Action::ToggleClippings,
            loading: false,
        },
        UiNode::Button {
            label: "Delete All Clippings".to_string(),
            action: Action::DeleteAllClippings,
            loading: false,
        },
    ];

    children.push(UiNode::Label(match (clipping.count, clipping.visible) {
        (0, _) => "No clipping planes".to_string(),
        (n, true) => format!("{} clipping plane(s)", n),
        (n, false) => format!("{} clipping plane(s), hidden", n),
    }));

    UiNode::Section {
        title: "Clipping".to_string(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHost;

    fn group(name: &str) -> GroupEntry {
        GroupEntry {
            name: name.to_string(),
            count: 3,
            visible: true,
        }
    }

    #[test]
    fn test_empty_sections_render_placeholders() {
        let tree = Panel::render(&ViewerSnapshot::default());
        for title in [CATEGORIES, LEVELS] {
            let section = tree.section(title).unwrap();
            assert!(matches!(section.children(), [UiNode::Label(_)]), "{}", title);
        }
        assert!(tree.section("Controls").is_some());
        assert!(tree.section("Clipping").is_some());
    }

    #[test]
    fn test_groups_render_checkboxes() {
        let snapshot = ViewerSnapshot {
            categories: vec![group("IFCSLAB"), group("IFCWALL")],
            ..Default::default()
        };
        let tree = Panel::render(&snapshot);
        let categories = tree.section(CATEGORIES).unwrap();
        assert_eq!(categories.children().len(), 2);
        assert!(categories
            .children()
            .iter()
            .all(|c| matches!(c, UiNode::Checkbox { checked: true, .. })));

        // Levels stay independent
        let levels = tree.section(LEVELS).unwrap();
        assert!(matches!(levels.children(), [UiNode::Label(_)]));
    }

    #[test]
    fn test_busy_action_renders_loading() {
        let mut snapshot = ViewerSnapshot::default();
        snapshot.busy.insert(ActionId::LoadIfc);
        snapshot.busy.insert(ActionId::ToggleGroup(GroupKey::new(CATEGORIES, "IFCWALL")));
        snapshot.categories = vec![group("IFCSLAB"), group("IFCWALL")];
        let tree = Panel::render(&snapshot);

        assert!(matches!(
            tree.button(&Action::LoadIfc),
            Some(UiNode::Button { loading: true, .. })
        ));
        for action in [Action::LoadFragments, Action::DownloadFragments] {
            assert!(matches!(
                tree.button(&action),
                Some(UiNode::Button { loading: false, .. })
            ));
        }

        let busy: Vec<bool> = tree
            .section(CATEGORIES)
            .unwrap()
            .children()
            .iter()
            .map(|c| matches!(c, UiNode::Checkbox { busy: true, .. }))
            .collect();
        assert_eq!(busy, [false, true]);
    }

    #[test]
    fn test_selection_lists_properties() {
        let snapshot = ViewerSnapshot {
            selection: Some("Wall A".to_string()),
            properties: vec![
                ("Category".to_string(), "IFCWALL".to_string()),
                ("Level".to_string(), "Ground Floor".to_string()),
            ],
            ..Default::default()
        };
        let tree = Panel::render(&snapshot);
        let labels: Vec<&str> = tree
            .section("Controls")
            .unwrap()
            .children()
            .iter()
            .filter_map(|c| match c {
                UiNode::Label(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            labels,
            [
                "No model loaded",
                "Selected: Wall A",
                "Category: IFCWALL",
                "Level: Ground Floor"
            ]
        );
    }

    #[test]
    fn test_store_change_replaces_tree() {
        let store = ViewerStore::new();
        let host = RecordingHost::new();
        let panel = Panel::attach(Rc::clone(&store), Box::new(host.clone()));
        assert_eq!(panel.render_count(), 1);

        store.mutate(|s| s.levels.push(group("Level 1")));
        assert_eq!(panel.render_count(), 2);

        let tree = host.last().unwrap();
        assert!(matches!(
            tree.section(LEVELS).unwrap().children(),
            [UiNode::Checkbox { .. }]
        ));

        panel.invalidate();
        assert_eq!(host.trees().len(), 3);
    }
}
