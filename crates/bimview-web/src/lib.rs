// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! bimview web viewer
//!
//! Wires [`bimview_core::Viewer`] to the browser: window.fetch for IFC
//! files, blob downloads, a JS render toolkit and a Leptos side panel.

pub mod bridge;
pub mod download;
pub mod fetch;
pub mod input;
pub mod panel;

use bimview_core::{IfcLiteParser, Viewer, ViewerConfig, ViewerServices};
use leptos::prelude::*;
use panel::{SidePanel, SignalHost};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// Id of an optional `<script type="application/json">` holding the config
pub const CONFIG_ELEMENT: &str = "bimview-config";

fn load_config(document: Option<&web_sys::Document>) -> bimview_core::Result<ViewerConfig> {
    let json = document
        .and_then(|d| d.get_element_by_id(CONFIG_ELEMENT))
        .and_then(|el| el.text_content());
    let config = match json {
        Some(json) => ViewerConfig::from_json(&json)?,
        None => ViewerConfig::default(),
    };
    Ok(match fetch::get_file_param() {
        Some(file) => config.with_ifc_path(file),
        None => config,
    })
}

fn start() -> bimview_core::Result<()> {
    let document = web_sys::window().and_then(|w| w.document());
    let config = load_config(document.as_ref())?;

    let container = document
        .as_ref()
        .and_then(|d| d.get_element_by_id(&config.container));

    let tree = RwSignal::new(None);
    let services = ViewerServices {
        container: container.as_ref().map(|el| el.id()),
        renderer: Box::new(bridge::JsRenderer::new()),
        source: Rc::new(fetch::FetchSource::new()),
        parser: Rc::new(IfcLiteParser::new()),
        sink: Rc::new(download::BlobSink::new()),
        host: Box::new(SignalHost::new(tree)),
    };
    let viewer = Viewer::new(config, services)?;

    if let Some(container) = &container {
        input::attach(container, &viewer);
    }

    let handle = StoredValue::new_local(viewer);
    leptos::mount::mount_to_body(move || view! { <SidePanel tree=tree viewer=handle /> });
    Ok(())
}

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    bridge::init_logging();

    if let Err(e) = start() {
        log::error!("Viewer failed to start: {}", e);
    }
}
