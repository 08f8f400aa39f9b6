// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application context
//!
//! [`Viewer`] owns one viewport and every tool attached to it. Nothing is
//! global: two viewers in one page (or one test) never share state.
//!
//! All user input enters through [`Viewer::dispatch`] or the pointer and key
//! handlers. Dispatch is the action boundary: it rejects a second run of a
//! busy action, catches and records errors, and always releases the busy
//! flag.

use crate::action::{Action, ActionStatus};
use crate::classifier::{Classifier, GroupKey, CATEGORIES, LEVELS};
use crate::clipper::{Clipper, PlaneId};
use crate::config::ViewerConfig;
use crate::download::DownloadSink;
use crate::error::Result;
use crate::events::Subscription;
use crate::hider::Hider;
use crate::loader::{ByteSource, IfcLoader, LoadOptions, ModelParser};
use crate::model::Model;
use crate::panel::{Panel, PanelHost};
use crate::picking::{raycast, Highlighter, SurfaceHit};
use crate::registry::ModelRegistry;
use crate::store::{GroupEntry, ModelSummary, ViewerStore};
use crate::sync::SceneSync;
use crate::world::{RenderBackend, World};
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// External collaborators a viewer is wired to
pub struct ViewerServices {
    /// Id of the container element, `None` if the page lookup failed
    pub container: Option<String>,
    pub renderer: Box<dyn RenderBackend>,
    pub source: Rc<dyn ByteSource>,
    pub parser: Rc<dyn ModelParser>,
    pub sink: Rc<dyn DownloadSink>,
    pub host: Box<dyn PanelHost>,
}

struct ViewerInner {
    config: ViewerConfig,
    world: Rc<World>,
    registry: Rc<ModelRegistry>,
    sync: SceneSync,
    loader: IfcLoader,
    classifier: Rc<Classifier>,
    hider: Rc<Hider>,
    clipper: Rc<Clipper>,
    highlighter: Rc<Highlighter>,
    store: Rc<ViewerStore>,
    panel: Rc<Panel>,
    sink: Rc<dyn DownloadSink>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Handle to a viewer instance; clones share the same viewer
#[derive(Clone)]
pub struct Viewer {
    inner: Rc<ViewerInner>,
}

impl Viewer {
    /// Initialize the viewport and wire every tool
    pub fn new(config: ViewerConfig, services: ViewerServices) -> Result<Self> {
        let ViewerServices {
            container,
            renderer,
            source,
            parser,
            sink,
            host,
        } = services;

        let world = World::initialize(&config, container.as_deref(), renderer)?;
        let registry = Rc::new(ModelRegistry::new());

        // Scene sync must be the first insertion handler
        let sync = SceneSync::new(Rc::clone(&world), Rc::clone(&registry));
        sync.attach();

        let hider = Rc::new(Hider::new(Rc::clone(&world)));
        let forget = {
            let hider = Rc::downgrade(&hider);
            registry.on_removed(move |id| {
                if let Some(hider) = hider.upgrade() {
                    hider.forget_model(*id);
                }
            })
        };

        // Runs after the classifier has rebuilt for the new model
        let classifier = Classifier::attach(Rc::clone(&registry));
        let extend = {
            let hider = Rc::downgrade(&hider);
            let classifier = Rc::downgrade(&classifier);
            registry.on_added(move |model| {
                if let (Some(hider), Some(classifier)) = (hider.upgrade(), classifier.upgrade()) {
                    hide_new_group_members(&hider, &classifier, model);
                }
            })
        };

        let clipper = Rc::new(Clipper::new(Rc::clone(&world)));
        let highlighter = Rc::new(Highlighter::new(Rc::clone(&world)));
        highlighter.set_fetch_properties(config.show_properties);
        let store = ViewerStore::new();

        let loader = IfcLoader::new(
            source,
            parser,
            Rc::clone(&registry),
            LoadOptions {
                coordinate: config.coordinate,
                name: config.model_name.clone(),
            },
        );

        let panel = Panel::attach(Rc::clone(&store), host);

        let inner = Rc::new(ViewerInner {
            config,
            world,
            registry,
            sync,
            loader,
            classifier,
            hider,
            clipper,
            highlighter,
            store,
            panel,
            sink,
            subscriptions: RefCell::new(vec![forget, extend]),
        });

        let viewer = Viewer { inner };
        viewer.wire_store();
        viewer.refresh();
        log::info!("Viewer ready");
        Ok(viewer)
    }

    /// Mirror tool state changes into the store
    fn wire_store(&self) {
        let inner = &self.inner;
        let weak = Rc::downgrade(inner);
        let subs = vec![
            inner.classifier.on_change(refresh_handler(weak.clone())),
            inner.hider.on_change(refresh_handler(weak.clone())),
            inner.clipper.on_change(refresh_handler(weak.clone())),
            inner.highlighter.on_change(refresh_handler(weak)),
        ];
        inner.subscriptions.borrow_mut().extend(subs);
    }

    /// Recompute the store snapshot from the current tool state
    pub fn refresh(&self) {
        refresh(&self.inner);
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    pub fn world(&self) -> &Rc<World> {
        &self.inner.world
    }

    pub fn registry(&self) -> &Rc<ModelRegistry> {
        &self.inner.registry
    }

    pub fn sync(&self) -> &SceneSync {
        &self.inner.sync
    }

    pub fn loader(&self) -> &IfcLoader {
        &self.inner.loader
    }

    pub fn classifier(&self) -> &Rc<Classifier> {
        &self.inner.classifier
    }

    pub fn hider(&self) -> &Rc<Hider> {
        &self.inner.hider
    }

    pub fn clipper(&self) -> &Rc<Clipper> {
        &self.inner.clipper
    }

    pub fn highlighter(&self) -> &Rc<Highlighter> {
        &self.inner.highlighter
    }

    pub fn store(&self) -> &Rc<ViewerStore> {
        &self.inner.store
    }

    pub fn panel(&self) -> &Rc<Panel> {
        &self.inner.panel
    }

    /// Run `action` at the action boundary
    ///
    /// The busy flag of a long-running action is taken before this returns,
    /// so a second dispatch issued before the first future completes is
    /// answered with [`ActionStatus::Ignored`].
    pub fn dispatch(&self, action: Action) -> LocalBoxFuture<'static, ActionStatus> {
        let token = match action.busy_id() {
            Some(id) => match self.inner.store.try_begin(id.clone()) {
                Some(token) => Some(token),
                None => {
                    log::warn!("{:?} is already running, ignoring", id);
                    return Box::pin(async { ActionStatus::Ignored });
                }
            },
            None => None,
        };

        let viewer = self.clone();
        Box::pin(async move {
            let _busy = token;
            match viewer.run(&action).await {
                Ok(()) => {
                    viewer.inner.store.mutate(|s| s.last_error = None);
                    ActionStatus::Completed
                }
                Err(e) => {
                    log::error!("{:?} failed: {}", action, e);
                    let message = e.to_string();
                    viewer
                        .inner
                        .store
                        .mutate(|s| s.last_error = Some(message.clone()));
                    ActionStatus::Failed(message)
                }
            }
        })
    }

    async fn run(&self, action: &Action) -> Result<()> {
        match action {
            Action::LoadIfc => self.load_ifc().await.map(|_| ()),
            Action::LoadFragments => self.load_fragments_file().await.map(|_| ()),
            Action::DownloadFragments => self.download_fragments().map(|_| ()),
            Action::ToggleClippings => {
                self.inner.clipper.toggle_visibility();
                Ok(())
            }
            Action::DeleteAllClippings => {
                self.inner.clipper.delete_all();
                Ok(())
            }
            Action::ToggleClipper => {
                let enabled = self.inner.clipper.summary().enabled;
                self.inner.clipper.set_enabled(!enabled);
                Ok(())
            }
            Action::ToggleGroup(key) => {
                self.toggle_group(key).await;
                Ok(())
            }
        }
    }

    /// Load the configured IFC file
    pub async fn load_ifc(&self) -> Result<Rc<Model>> {
        let path = self.inner.config.ifc_path.clone();
        self.inner.loader.load_ifc(&path).await
    }

    pub fn load_fragments(&self, bytes: &[u8]) -> Result<Rc<Model>> {
        self.inner.loader.load_fragments(bytes)
    }

    /// Load the configured fragment file
    pub async fn load_fragments_file(&self) -> Result<Rc<Model>> {
        let path = self.inner.config.fragments_path.clone();
        self.inner.loader.load_fragments_from(&path).await
    }

    /// Deliver the fragment file of the first loaded model
    ///
    /// With nothing loaded this does nothing and returns `Ok(None)`.
    pub fn download_fragments(&self) -> Result<Option<String>> {
        let Some(model) = self.inner.registry.first() else {
            log::debug!("No model loaded, nothing to download");
            return Ok(None);
        };

        let bytes = model.buffer();
        let file_name = self.inner.config.download_name.clone();
        self.inner.sink.save(&file_name, &bytes)?;
        log::info!("Downloaded {} ({} bytes)", file_name, bytes.len());
        Ok(Some(file_name))
    }

    /// Flip the visibility of one classification group
    ///
    /// Unknown groups (e.g. before any load) are ignored. Dispatched toggles
    /// keep the group busy until the members resolve.
    pub async fn toggle_group(&self, key: &GroupKey) -> bool {
        let Some(group) = self.inner.classifier.group(key) else {
            log::debug!("No group {}/{}", key.classification, key.group);
            return false;
        };
        let members = group.get().await;
        let show = self.inner.hider.is_group_hidden(key);
        self.inner.hider.set_group(key, &members, show);
        true
    }

    /// Nearest visible, unclipped surface under a viewport point
    pub fn pick(&self, ndc_x: f32, ndc_y: f32) -> Option<SurfaceHit> {
        let ray = self.inner.world.camera().ray_through(ndc_x, ndc_y);
        let hider = &self.inner.hider;
        let clipper = &self.inner.clipper;
        raycast(&self.inner.registry.models(), &ray, |model, id, point| {
            hider.is_visible(model, id) && !clipper.is_clipped(point)
        })
    }

    /// Target the clipping plane under the pointer, then select on hit and
    /// clear on miss
    pub fn on_click(&self, ndc_x: f32, ndc_y: f32) {
        let ray = self.inner.world.camera().ray_through(ndc_x, ndc_y);
        let clipper = &self.inner.clipper;
        clipper.set_target(clipper.pick(&ray));

        let hit = self.pick(ndc_x, ndc_y);
        self.inner.highlighter.select(hit.as_ref(), &self.inner.registry);
    }

    /// Create a clipping plane at the surface under the pointer
    pub fn on_double_click(&self, ndc_x: f32, ndc_y: f32) -> Option<PlaneId> {
        let hit = self.pick(ndc_x, ndc_y)?;
        self.inner.clipper.create_at(&hit)
    }

    /// Keyboard shortcuts; returns whether the key was handled
    pub fn on_key(&self, key: &str) -> bool {
        match key {
            "Delete" | "Backspace" => self.inner.clipper.delete(None).is_some(),
            "Escape" => {
                self.inner.highlighter.clear();
                true
            }
            _ => false,
        }
    }

    pub fn on_camera_rest(&self) {
        self.inner.world.notify_camera_rest();
    }
}

/// Hide the members of a new model that belong to already hidden groups
fn hide_new_group_members(hider: &Hider, classifier: &Classifier, model: &Model) {
    let additions: BTreeMap<GroupKey, _> = hider
        .hidden_groups()
        .into_iter()
        .filter_map(|key| {
            let members = classifier.group(&key)?.members_of(model.id())?;
            Some((key, members))
        })
        .collect();
    if !additions.is_empty() {
        hider.extend_hidden_groups(&additions);
    }
}

fn refresh_handler<T: 'static>(weak: Weak<ViewerInner>) -> impl Fn(&T) + 'static {
    move |_: &T| {
        if let Some(inner) = weak.upgrade() {
            refresh(&inner);
        }
    }
}

fn refresh(inner: &ViewerInner) {
    let models: Vec<ModelSummary> = inner
        .registry
        .models()
        .iter()
        .map(|m| ModelSummary {
            id: m.id(),
            name: m.name().to_string(),
            elements: m.elements().len(),
        })
        .collect();

    let entries = |name: &str| -> Vec<GroupEntry> {
        inner
            .classifier
            .classification(name)
            .map(|c| {
                c.groups
                    .iter()
                    .map(|g| GroupEntry {
                        name: g.name.clone(),
                        count: g.len(),
                        visible: !inner.hider.is_group_hidden(&GroupKey::new(name, g.name.clone())),
                    })
                    .collect()
            })
            .unwrap_or_default()
    };
    let categories = entries(CATEGORIES);
    let levels = entries(LEVELS);

    let clipping = inner.clipper.summary();
    let (selection, properties) = match inner.highlighter.selection() {
        Some(s) => (Some(s.label), s.properties),
        None => (None, Vec::new()),
    };

    inner.store.mutate(move |s| {
        s.models = models;
        s.categories = categories;
        s.levels = levels;
        s.clipping = clipping;
        s.selection = selection;
        s.properties = properties;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionId;
    use crate::model::ModelId;
    use crate::panel::UiNode;
    use crate::testing::{test_viewer, BackendCall};
    use crate::world::Camera;
    use nalgebra::{Point3, Vector3};

    fn look_down(viewer: &Viewer) {
        viewer
            .world()
            .set_camera(Camera::look_at([0.25, 0.25, 10.0], [0.25, 0.25, 0.0]));
    }

    #[test]
    fn test_missing_container_is_configuration_error() {
        let t = test_viewer();
        let services = t.services(None);
        let err = Viewer::new(ViewerConfig::default(), services).err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_load_populates_categories() {
        let t = test_viewer();
        assert!(t.viewer.registry().is_empty());

        let status = t.viewer.dispatch(Action::LoadIfc).await;
        assert_eq!(status, ActionStatus::Completed);
        assert_eq!(t.viewer.registry().len(), 1);

        let tree = t.host.last().unwrap();
        let categories = tree.section(CATEGORIES).unwrap();
        assert!(categories
            .children()
            .iter()
            .any(|c| matches!(c, UiNode::Checkbox { .. })));

        // Scene attachment ran before the panel saw the model
        let model = t.viewer.registry().first().unwrap();
        assert!(t.viewer.world().scene().contains(model.id()));
    }

    #[tokio::test]
    async fn test_second_load_while_pending_is_ignored() {
        let t = test_viewer();
        let release = t.source.hold("small.ifc");

        let mut first = t.viewer.dispatch(Action::LoadIfc);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(matches!(
            t.host.last().unwrap().button(&Action::LoadIfc),
            Some(UiNode::Button { loading: true, .. })
        ));

        let second = t.viewer.dispatch(Action::LoadIfc).await;
        assert_eq!(second, ActionStatus::Ignored);

        release.send(()).unwrap();
        assert_eq!(first.await, ActionStatus::Completed);
        assert_eq!(t.viewer.registry().len(), 1);
        assert_eq!(t.source.requests().len(), 1);
        assert!(!t.viewer.store().is_busy(&ActionId::LoadIfc));
    }

    #[tokio::test]
    async fn test_failed_load_releases_busy_state() {
        let t = test_viewer();
        t.source.remove("small.ifc");

        let status = t.viewer.dispatch(Action::LoadIfc).await;
        assert!(matches!(status, ActionStatus::Failed(_)));

        let snapshot = t.viewer.store().snapshot();
        assert!(snapshot.busy.is_empty());
        assert!(snapshot.last_error.unwrap().contains("small.ifc"));
        assert!(t.viewer.registry().is_empty());

        // Still usable afterwards
        t.source.insert("small.ifc", crate::testing::SAMPLE_IFC.as_bytes().to_vec());
        assert_eq!(t.viewer.dispatch(Action::LoadIfc).await, ActionStatus::Completed);
        assert!(t.viewer.store().snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_download_with_empty_registry_is_a_no_op() {
        let t = test_viewer();
        let calls = t.backend.calls().len();
        let renders = t.viewer.panel().render_count();

        assert_eq!(t.viewer.download_fragments().unwrap(), None);
        let status = t.viewer.dispatch(Action::DownloadFragments).await;
        assert_eq!(status, ActionStatus::Completed);

        assert!(t.sink.files().is_empty());
        assert_eq!(t.backend.calls().len(), calls);
        assert!(t.viewer.store().snapshot().last_error.is_none());
        // Busy on, busy off
        assert_eq!(t.viewer.panel().render_count(), renders + 2);
    }

    #[tokio::test]
    async fn test_download_writes_first_model() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;

        assert_eq!(
            t.viewer.dispatch(Action::DownloadFragments).await,
            ActionStatus::Completed
        );
        let files = t.sink.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "small.frag");

        // The download reloads into an equal model
        let reloaded = t.viewer.load_fragments(&files[0].1).unwrap();
        assert_eq!(reloaded.data(), t.viewer.registry().first().unwrap().data());
    }

    #[tokio::test]
    async fn test_group_toggle_round_trip() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;
        let model = t.viewer.registry().first().unwrap();
        let ids: Vec<u32> = model.elements().iter().map(|e| e.id).collect();

        // One element already hidden on its own
        t.viewer.hider().set(false, &model_ids(model.id(), &[ids[0]]));
        let visibility = || -> Vec<bool> {
            ids.iter()
                .map(|id| t.viewer.hider().is_visible(model.id(), *id))
                .collect()
        };
        let before = visibility();

        let walls = Action::ToggleGroup(GroupKey::new(CATEGORIES, "IFCWALL"));
        t.viewer.dispatch(walls.clone()).await;
        let categories = t.viewer.store().snapshot().categories;
        let entry = categories.iter().find(|g| g.name == "IFCWALL").unwrap();
        assert!(!entry.visible);

        t.viewer.dispatch(walls).await;
        assert_eq!(visibility(), before);
    }

    #[tokio::test]
    async fn test_hidden_group_covers_later_models() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;
        let walls = Action::ToggleGroup(GroupKey::new(CATEGORIES, "IFCWALL"));
        t.viewer.dispatch(walls.clone()).await;

        let calls = t.backend.calls().len();
        t.viewer.dispatch(Action::LoadIfc).await;
        let second = t.viewer.registry().models()[1].id();

        let hider = t.viewer.hider();
        assert!(!hider.is_visible(second, 1));
        assert!(!hider.is_visible(second, 2));
        assert!(hider.is_visible(second, 3));

        let categories = t.viewer.store().snapshot().categories;
        let entry = categories.iter().find(|g| g.name == "IFCWALL").unwrap();
        assert!(!entry.visible);
        assert_eq!(entry.count, 4);

        let visibility_calls: Vec<_> = t.backend.calls()[calls..]
            .iter()
            .filter(|c| matches!(c, BackendCall::SetVisibility { .. }))
            .cloned()
            .collect();
        assert_eq!(
            visibility_calls,
            [BackendCall::SetVisibility {
                model: second,
                elements: [1, 2].into_iter().collect(),
                visible: false,
            }]
        );

        // Showing the group reveals both models
        t.viewer.dispatch(walls).await;
        for model in t.viewer.registry().models() {
            assert!(hider.hidden(model.id()).is_empty());
        }
    }

    #[tokio::test]
    async fn test_group_toggle_is_busy_until_resolved() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;
        let key = GroupKey::new(CATEGORIES, "IFCWALL");
        let walls = Action::ToggleGroup(key.clone());

        let pending = t.viewer.dispatch(walls.clone());
        assert!(t.viewer.store().is_busy(&ActionId::ToggleGroup(key.clone())));
        let checkbox = t
            .host
            .last()
            .unwrap()
            .section(CATEGORIES)
            .unwrap()
            .children()
            .iter()
            .find(|c| matches!(c, UiNode::Checkbox { action, .. } if *action == walls))
            .cloned();
        assert!(matches!(checkbox, Some(UiNode::Checkbox { busy: true, .. })));

        // A repeated click while pending would undo the first toggle
        assert_eq!(t.viewer.dispatch(walls.clone()).await, ActionStatus::Ignored);
        let slabs = Action::ToggleGroup(GroupKey::new(CATEGORIES, "IFCSLAB"));
        assert_eq!(t.viewer.dispatch(slabs).await, ActionStatus::Completed);

        assert_eq!(pending.await, ActionStatus::Completed);
        assert!(!t.viewer.store().is_busy(&ActionId::ToggleGroup(key.clone())));
        assert!(t.viewer.hider().is_group_hidden(&key));
    }

    #[tokio::test]
    async fn test_load_fragments_action() {
        let t = test_viewer();
        assert!(t.host.last().unwrap().button(&Action::LoadFragments).is_some());

        let status = t.viewer.dispatch(Action::LoadFragments).await;
        assert!(matches!(status, ActionStatus::Failed(_)));
        assert!(!t.viewer.store().is_busy(&ActionId::LoadFragments));

        let data = crate::testing::sample_model("cached");
        t.source.insert("small.frag", crate::fragments::encode(&data));
        assert_eq!(
            t.viewer.dispatch(Action::LoadFragments).await,
            ActionStatus::Completed
        );
        let model = t.viewer.registry().first().unwrap();
        assert_eq!(model.data(), &data);
        assert!(t.viewer.world().scene().contains(model.id()));
        assert_eq!(t.viewer.store().snapshot().models[0].name, "cached");
    }

    #[tokio::test]
    async fn test_tools_are_no_ops_before_load() {
        let t = test_viewer();

        let status = t
            .viewer
            .dispatch(Action::ToggleGroup(GroupKey::new(CATEGORIES, "IFCWALL")))
            .await;
        assert_eq!(status, ActionStatus::Completed);
        assert_eq!(t.viewer.dispatch(Action::ToggleClippings).await, ActionStatus::Completed);
        assert_eq!(t.viewer.dispatch(Action::DeleteAllClippings).await, ActionStatus::Completed);

        assert_eq!(t.viewer.clipper().summary().count, 0);
        assert!(!t.viewer.on_key("Delete"));
        assert!(t.viewer.on_double_click(0.0, 0.0).is_none());
        t.viewer.on_click(0.0, 0.0);
        assert!(t.viewer.highlighter().selection().is_none());
    }

    #[tokio::test]
    async fn test_pointer_selection_and_clipping() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;
        look_down(&t.viewer);

        t.viewer.on_click(0.0, 0.0);
        assert_eq!(t.viewer.store().snapshot().selection.as_deref(), Some("Wall B"));

        // A plane above the lower wall cuts the upper one away
        t.viewer
            .clipper()
            .create(Point3::new(0.0, 0.0, 4.0), Vector3::z_axis());
        t.viewer.on_click(0.0, 0.0);
        assert_eq!(t.viewer.store().snapshot().selection.as_deref(), Some("Wall A"));

        let plane = t.viewer.on_double_click(0.0, 0.0).unwrap();
        assert_eq!(t.viewer.store().snapshot().clipping.count, 2);
        assert!(t.viewer.clipper().planes().iter().any(|p| p.id == plane));

        assert!(t.viewer.on_key("Backspace"));
        assert!(t.viewer.on_key("Delete"));
        assert!(!t.viewer.on_key("Delete"));
        assert_eq!(t.viewer.store().snapshot().clipping.count, 0);

        assert!(t.viewer.on_key("Escape"));
        assert!(t.viewer.store().snapshot().selection.is_none());
    }

    #[tokio::test]
    async fn test_click_targets_plane_for_delete() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;
        look_down(&t.viewer);

        let clipper = t.viewer.clipper();
        let under_pointer = clipper.create(Point3::new(0.0, 0.0, 4.0), Vector3::z_axis());
        let elsewhere = clipper.create(Point3::new(50.0, 50.0, 0.0), Vector3::x_axis());

        t.viewer.on_click(0.0, 0.0);
        assert_eq!(clipper.target(), Some(under_pointer));

        // Delete removes the targeted plane, not the latest one
        assert!(t.viewer.on_key("Delete"));
        let left: Vec<PlaneId> = clipper.planes().iter().map(|p| p.id).collect();
        assert_eq!(left, [elsewhere]);

        // Clicking away from every plane clears the target
        t.viewer.on_click(0.9, 0.9);
        assert_eq!(clipper.target(), None);
    }

    #[tokio::test]
    async fn test_selection_properties_reach_panel() {
        let t = test_viewer();
        t.viewer.dispatch(Action::LoadIfc).await;
        look_down(&t.viewer);

        t.viewer.on_click(0.0, 0.0);
        let snapshot = t.viewer.store().snapshot();
        assert!(snapshot
            .properties
            .contains(&("Category".to_string(), "IFCWALL".to_string())));
        let controls = t.host.last().unwrap();
        let controls = controls.section("Controls").unwrap();
        assert!(controls
            .children()
            .contains(&UiNode::Label("Category: IFCWALL".to_string())));

        t.viewer.on_key("Escape");
        assert!(t.viewer.store().snapshot().properties.is_empty());
    }

    #[tokio::test]
    async fn test_properties_can_be_turned_off() {
        let t = test_viewer();
        let config = ViewerConfig {
            show_properties: false,
            ..Default::default()
        };
        let viewer = Viewer::new(config, t.services(Some("container"))).unwrap();
        viewer.dispatch(Action::LoadIfc).await;
        look_down(&viewer);

        viewer.on_click(0.0, 0.0);
        let snapshot = viewer.store().snapshot();
        assert!(snapshot.selection.is_some());
        assert!(snapshot.properties.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_clippings_without_planes() {
        let t = test_viewer();
        let before = t.viewer.clipper().planes();
        assert_eq!(t.viewer.dispatch(Action::ToggleClippings).await, ActionStatus::Completed);
        assert_eq!(t.viewer.clipper().planes(), before);
        assert!(t.viewer.store().snapshot().last_error.is_none());
    }

    #[test]
    fn test_camera_rest_updates_scene() {
        let t = test_viewer();
        let updates = t
            .backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Update))
            .count();
        t.viewer.on_camera_rest();
        let after = t
            .backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Update))
            .count();
        assert_eq!(after, updates + 1);
    }

    fn model_ids(model: ModelId, ids: &[u32]) -> crate::model::ModelIdMap {
        let mut map = crate::model::ModelIdMap::new();
        map.insert(model, ids.iter().copied().collect());
        map
    }
}
