// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! bimview core - application logic of a browser IFC viewer
//!
//! Everything here is independent of the browser so it can be tested
//! natively. The web front-end supplies the collaborators behind the seams:
//!
//! - [`RenderBackend`] - the 3D toolkit (scene graph, camera, renderer)
//! - [`ByteSource`] - HTTP fetch of the IFC file
//! - [`ModelParser`] - IFC to geometry conversion ([`IfcLiteParser`] by default)
//! - [`DownloadSink`] - client-side file delivery
//! - [`PanelHost`] - whatever displays the rendered [`UiNode`] tree
//!
//! # Example
//!
//! ```ignore
//! use bimview_core::{Action, Viewer, ViewerConfig, ViewerServices};
//!
//! let viewer = Viewer::new(ViewerConfig::default(), services)?;
//! viewer.dispatch(Action::LoadIfc).await;
//! ```

pub mod action;
pub mod app;
pub mod classifier;
pub mod clipper;
pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod fragments;
pub mod hider;
pub mod ifc;
pub mod loader;
pub mod model;
pub mod panel;
pub mod picking;
pub mod registry;
pub mod store;
pub mod sync;
pub mod world;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use action::{Action, ActionId, ActionStatus};
pub use app::{Viewer, ViewerServices};
pub use classifier::{Classification, ClassificationGroup, Classifier, GroupKey, CATEGORIES, LEVELS};
pub use clipper::{Clipper, ClipperSummary, ClippingPlane, PlaneId};
pub use config::{CameraPose, ViewerConfig};
pub use download::{DownloadSink, FileSink};
pub use error::{Result, ViewerError};
pub use events::{EventSource, Subscription};
pub use hider::Hider;
pub use ifc::IfcLiteParser;
pub use loader::{ByteSource, IfcLoader, LoadOptions, ModelParser};
pub use model::{Bounds, Element, ElementMesh, Model, ModelData, ModelId, ModelIdMap};
pub use panel::{Panel, PanelHost, UiNode, PANEL_TITLE};
pub use picking::{Highlighter, Selection, SurfaceHit};
pub use registry::ModelRegistry;
pub use store::{GroupEntry, ModelSummary, ViewerSnapshot, ViewerStore};
pub use sync::SceneSync;
pub use world::{Camera, Ray, RenderBackend, Scene, World};
