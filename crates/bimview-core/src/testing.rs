// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory collaborators for tests
//!
//! Everything here stands in for something the browser provides: a render
//! backend that records calls, a byte source backed by a map, a download sink
//! and a panel host that keep what they receive.

use crate::app::{Viewer, ViewerServices};
use crate::clipper::ClippingPlane;
use crate::config::ViewerConfig;
use crate::download::DownloadSink;
use crate::error::{Result, ViewerError};
use crate::ifc::category_color;
use crate::loader::{ByteSource, LoadOptions, ModelParser};
use crate::model::{Element, ElementMesh, Model, ModelData, ModelId, ModelIdMap};
use crate::panel::{PanelHost, UiNode};
use crate::world::{Camera, RenderBackend, World};
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Small IFC4 file: two walls and a slab on two storeys, in millimetres
pub const SAMPLE_IFC: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('small.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#10=IFCBUILDINGSTOREY('1xS3BCk291UvhgP2dvNMQJ',$,'Ground Floor',$,$,$,$,$,.ELEMENT.,0.);
#11=IFCBUILDINGSTOREY('1xS3BCk291UvhgP2dvNMQK',$,'Level 1',$,$,$,$,$,.ELEMENT.,3000.);
#20=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall A',$,$,$,$,$,$);
#21=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOI',$,'Wall B',$,$,$,$,$,$);
#22=IFCSLAB('2O2Fr$t4X7Zf8NOew3FLOJ',$,'Slab',$,$,$,$,$,$);
#30=IFCRELCONTAINEDINSPATIALSTRUCTURE('3Sa3dTJGn0H8TQIGiuGQd5',$,$,$,(#20,#22),#10);
#31=IFCRELCONTAINEDINSPATIALSTRUCTURE('3Sa3dTJGn0H8TQIGiuGQd6',$,$,$,(#21),#11);
ENDSEC;
END-ISO-10303-21;
";

/// Unit quad over x, y in [0, 1] at height `z`, facing +z
fn quad(element: u32, z: f32, category: &str) -> ElementMesh {
    ElementMesh {
        element,
        positions: vec![
            0.0, 0.0, z, //
            1.0, 0.0, z, //
            0.0, 1.0, z, //
            1.0, 1.0, z,
        ],
        normals: [0.0, 0.0, 1.0].repeat(4),
        indices: vec![0, 1, 2, 1, 3, 2],
        color: category_color(category),
    }
}

fn element(id: u32, category: &str, name: &str, level: &str, elevation: f32) -> Element {
    Element {
        id,
        category: category.to_string(),
        name: Some(name.to_string()),
        global_id: Some(format!("2O2Fr$t4X7Zf8NOew3FLO{}", id)),
        level: Some(level.to_string()),
        level_elevation: Some(elevation),
    }
}

/// Parsed form of a model like [`SAMPLE_IFC`] with stacked, pickable quads
///
/// Slab `3` lies at z = 0, wall `1` at z = 3 and wall `2` at z = 6.
pub fn sample_model(name: &str) -> ModelData {
    ModelData {
        name: name.to_string(),
        elements: vec![
            element(1, "IFCWALL", "Wall A", "Ground Floor", 0.0),
            element(2, "IFCWALL", "Wall B", "Level 1", 3.0),
            element(3, "IFCSLAB", "Slab", "Ground Floor", 0.0),
        ],
        meshes: vec![
            quad(3, 0.0, "IFCSLAB"),
            quad(1, 3.0, "IFCWALL"),
            quad(2, 6.0, "IFCWALL"),
        ],
    }
}

/// A call received by [`HeadlessBackend`]
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Attach { container: String, worker: String },
    SetCamera(Camera),
    SetGrid(bool),
    AddModel(ModelId),
    RemoveModel(ModelId),
    SetVisibility {
        model: ModelId,
        elements: BTreeSet<u32>,
        visible: bool,
    },
    SetClipping { count: usize, visible: bool },
    SetHighlight(ModelIdMap),
    Update,
}

/// Render backend that only records what it is asked to do
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    calls: Rc<RefCell<Vec<BackendCall>>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    /// Container of the last attach call
    pub fn attached_to(&self) -> Option<String> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            BackendCall::Attach { container, .. } => Some(container.clone()),
            _ => None,
        })
    }

    /// Plane count and visibility last pushed to the renderer
    pub fn clipping(&self) -> (usize, bool) {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find_map(|c| match c {
                BackendCall::SetClipping { count, visible } => Some((*count, *visible)),
                _ => None,
            })
            .unwrap_or((0, true))
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl RenderBackend for HeadlessBackend {
    fn attach(&mut self, container: &str, worker_url: &str) -> Result<()> {
        self.record(BackendCall::Attach {
            container: container.to_string(),
            worker: worker_url.to_string(),
        });
        Ok(())
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.record(BackendCall::SetCamera(camera.clone()));
    }

    fn set_grid(&mut self, visible: bool) {
        self.record(BackendCall::SetGrid(visible));
    }

    fn add_model(&mut self, model: &Model, _camera: &Camera) {
        self.record(BackendCall::AddModel(model.id()));
    }

    fn remove_model(&mut self, model: ModelId) {
        self.record(BackendCall::RemoveModel(model));
    }

    fn set_visibility(&mut self, model: ModelId, elements: &BTreeSet<u32>, visible: bool) {
        self.record(BackendCall::SetVisibility {
            model,
            elements: elements.clone(),
            visible,
        });
    }

    fn set_clipping_planes(&mut self, planes: &[ClippingPlane], visible: bool) {
        self.record(BackendCall::SetClipping {
            count: planes.len(),
            visible,
        });
    }

    fn set_highlight(&mut self, selection: &ModelIdMap) {
        self.record(BackendCall::SetHighlight(selection.clone()));
    }

    fn update(&mut self) {
        self.record(BackendCall::Update);
    }
}

/// World attached to a [`HeadlessBackend`] with default settings
pub fn headless_world() -> (Rc<World>, HeadlessBackend) {
    let backend = HeadlessBackend::new();
    let world = World::initialize(
        &ViewerConfig::default(),
        Some("container"),
        Box::new(backend.clone()),
    )
    .expect("default config is valid");
    (world, backend)
}

/// Byte source serving files from memory
#[derive(Default)]
pub struct MemorySource {
    files: RefCell<FxHashMap<String, Vec<u8>>>,
    gates: RefCell<FxHashMap<String, oneshot::Receiver<()>>>,
    requests: RefCell<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(url.into(), bytes);
    }

    pub fn remove(&self, url: &str) {
        self.files.borrow_mut().remove(url);
    }

    /// Keep the next fetch of `url` pending until the sender fires
    pub fn hold(&self, url: impl Into<String>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(url.into(), rx);
        tx
    }

    /// Every url fetched so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ByteSource for MemorySource {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>>> {
        self.requests.borrow_mut().push(url.to_string());
        let gate = self.gates.borrow_mut().remove(url);
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.files
                .borrow()
                .get(url)
                .cloned()
                .ok_or_else(|| ViewerError::network(url, "404 Not Found"))
        })
    }
}

/// Parser that accepts any STEP header and returns [`sample_model`]
#[derive(Clone, Copy, Debug, Default)]
pub struct StubParser;

impl StubParser {
    pub fn new() -> Self {
        StubParser
    }
}

impl ModelParser for StubParser {
    fn parse<'a>(
        &'a self,
        bytes: Vec<u8>,
        options: &'a LoadOptions,
        progress: &'a dyn Fn(f32),
    ) -> LocalBoxFuture<'a, Result<ModelData>> {
        Box::pin(async move {
            if !bytes.starts_with(b"ISO-10303-21") {
                return Err(ViewerError::parse("missing ISO-10303-21 header"));
            }
            progress(0.0);
            let data = sample_model(&options.name);
            progress(100.0);
            Ok(data)
        })
    }
}

/// Download sink keeping files in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    files: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.borrow().clone()
    }
}

impl DownloadSink for MemorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .borrow_mut()
            .push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Panel host keeping every tree it was given
#[derive(Clone, Default)]
pub struct RecordingHost {
    trees: Rc<RefCell<Vec<UiNode>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trees(&self) -> Vec<UiNode> {
        self.trees.borrow().clone()
    }

    pub fn last(&self) -> Option<UiNode> {
        self.trees.borrow().last().cloned()
    }
}

impl PanelHost for RecordingHost {
    fn replace(&mut self, tree: UiNode) {
        self.trees.borrow_mut().push(tree);
    }
}

/// A viewer wired to in-memory collaborators
pub struct TestViewer {
    pub viewer: Viewer,
    pub backend: HeadlessBackend,
    pub source: Rc<MemorySource>,
    pub sink: MemorySink,
    pub host: RecordingHost,
}

impl TestViewer {
    /// Fresh services sharing this harness's byte source
    pub fn services(&self, container: Option<&str>) -> ViewerServices {
        ViewerServices {
            container: container.map(str::to_string),
            renderer: Box::new(HeadlessBackend::new()),
            source: self.source.clone(),
            parser: Rc::new(StubParser::new()),
            sink: Rc::new(MemorySink::new()),
            host: Box::new(RecordingHost::new()),
        }
    }
}

/// Viewer with default config serving [`SAMPLE_IFC`] as `small.ifc`
pub fn test_viewer() -> TestViewer {
    let backend = HeadlessBackend::new();
    let source = Rc::new(MemorySource::new());
    source.insert("small.ifc", SAMPLE_IFC.as_bytes().to_vec());
    let sink = MemorySink::new();
    let host = RecordingHost::new();

    let services = ViewerServices {
        container: Some("container".to_string()),
        renderer: Box::new(backend.clone()),
        source: source.clone(),
        parser: Rc::new(StubParser::new()),
        sink: Rc::new(sink.clone()),
        host: Box::new(host.clone()),
    };
    let viewer = Viewer::new(ViewerConfig::default(), services).expect("default config is valid");

    TestViewer {
        viewer,
        backend,
        source,
        sink,
        host,
    }
}
