// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge to the JavaScript 3D toolkit and the browser console
//!
//! The page loads a module exposing `window.bimviewRenderer`; every
//! [`RenderBackend`] call is forwarded to it as flat typed arrays.

use bimview_core::{Camera, ClippingPlane, Model, ModelId, ModelIdMap, RenderBackend, ViewerError};
use log::Level;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use wasm_bindgen::prelude::*;

/// Global debug mode flag (set from URL parameter ?debug=1)
static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

pub fn is_debug() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Whether a location search string turns on debug logging
pub fn debug_requested(search: &str) -> bool {
    search.contains("debug=1") || search.contains("debug=true")
}

/// Console log level for a debug flag
pub fn log_level(debug: bool) -> Level {
    if debug {
        Level::Debug
    } else {
        Level::Info
    }
}

/// Route `log` records to the browser console; call once at startup
pub fn init_logging() {
    let search = web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default();
    if debug_requested(&search) {
        DEBUG_MODE.store(true, Ordering::Relaxed);
    }

    if console_log::init_with_level(log_level(is_debug())).is_err() {
        return;
    }
    log::debug!("Debug mode enabled via URL");
}

// JavaScript FFI functions of the render toolkit
#[wasm_bindgen]
extern "C" {
    /// Create the renderer inside a container and start the fragments worker
    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = attach, catch)]
    fn js_attach(container: &str, worker_url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = setCamera)]
    fn js_set_camera(position: &[f32], target: &[f32], fov_y: f32);

    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = setGrid)]
    fn js_set_grid(visible: bool);

    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = addMesh)]
    fn js_add_mesh(
        model: u32,
        element: u32,
        positions: &[f32],
        normals: &[f32],
        indices: &[u32],
        color: &[f32],
    );

    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = removeModel)]
    fn js_remove_model(model: u32);

    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = setVisibility)]
    fn js_set_visibility(model: u32, elements: &[u32], visible: bool);

    /// Plane equations packed as (nx, ny, nz, d) quadruples
    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = setClippingPlanes)]
    fn js_set_clipping_planes(equations: &[f32], visible: bool);

    /// Highlighted elements packed as (model, element) pairs
    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = setHighlight)]
    fn js_set_highlight(pairs: &[u32]);

    #[wasm_bindgen(js_namespace = bimviewRenderer, js_name = update)]
    fn js_update();
}

/// [`RenderBackend`] backed by `window.bimviewRenderer`
#[derive(Default)]
pub struct JsRenderer;

impl JsRenderer {
    pub fn new() -> Self {
        JsRenderer
    }
}

/// Flatten plane equations for the JS side
pub fn pack_planes(planes: &[ClippingPlane]) -> Vec<f32> {
    planes.iter().flat_map(|p| p.equation()).collect()
}

/// Flatten a selection into (model, element) pairs
pub fn pack_selection(selection: &ModelIdMap) -> Vec<u32> {
    selection
        .iter()
        .flat_map(|(model, ids)| ids.iter().flat_map(move |id| [model.0, *id]))
        .collect()
}

impl RenderBackend for JsRenderer {
    fn attach(&mut self, container: &str, worker_url: &str) -> bimview_core::Result<()> {
        js_attach(container, worker_url)
            .map_err(|e| ViewerError::config(format!("renderer failed to start: {:?}", e)))
    }

    fn set_camera(&mut self, camera: &Camera) {
        js_set_camera(
            camera.position.coords.as_slice(),
            camera.target.coords.as_slice(),
            camera.fov_y,
        );
    }

    fn set_grid(&mut self, visible: bool) {
        js_set_grid(visible);
    }

    fn add_model(&mut self, model: &Model, _camera: &Camera) {
        for mesh in model.meshes() {
            js_add_mesh(
                model.id().0,
                mesh.element,
                &mesh.positions,
                &mesh.normals,
                &mesh.indices,
                &mesh.color,
            );
        }
        log::debug!("Sent {} meshes of {} to renderer", model.meshes().len(), model.id());
    }

    fn remove_model(&mut self, model: ModelId) {
        js_remove_model(model.0);
    }

    fn set_visibility(&mut self, model: ModelId, elements: &BTreeSet<u32>, visible: bool) {
        let ids: Vec<u32> = elements.iter().copied().collect();
        js_set_visibility(model.0, &ids, visible);
    }

    fn set_clipping_planes(&mut self, planes: &[ClippingPlane], visible: bool) {
        js_set_clipping_planes(&pack_planes(planes), visible);
    }

    fn set_highlight(&mut self, selection: &ModelIdMap) {
        js_set_highlight(&pack_selection(selection));
    }

    fn update(&mut self) {
        js_update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_from_search() {
        assert!(debug_requested("?debug=1"));
        assert!(debug_requested("?file=a.ifc&debug=true"));
        assert!(!debug_requested("?file=a.ifc"));
        assert_eq!(log_level(true), Level::Debug);
        assert_eq!(log_level(false), Level::Info);
    }

    #[test]
    fn test_selection_packs_pairs() {
        let mut selection = ModelIdMap::new();
        selection.insert(ModelId(2), [5, 7].into_iter().collect());
        selection.insert(ModelId(3), [1].into_iter().collect());
        assert_eq!(pack_selection(&selection), vec![2, 5, 2, 7, 3, 1]);
    }
}
