// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pointer, keyboard and camera-rest wiring

use bimview_core::Viewer;
use gloo::events::EventListener;
use wasm_bindgen::JsCast;

/// Event the render toolkit dispatches on the container when the camera stops
pub const CAMERA_REST_EVENT: &str = "camerarest";

/// Normalized device coordinates of a client point inside `rect`
///
/// `rect` is (left, top, width, height); y points up.
pub fn to_ndc(client_x: f64, client_y: f64, rect: (f64, f64, f64, f64)) -> Option<(f32, f32)> {
    let (left, top, width, height) = rect;
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let x = (client_x - left) / width * 2.0 - 1.0;
    let y = 1.0 - (client_y - top) / height * 2.0;
    Some((x as f32, y as f32))
}

fn pointer_ndc(container: &web_sys::Element, event: &web_sys::Event) -> Option<(f32, f32)> {
    let mouse = event.dyn_ref::<web_sys::MouseEvent>()?;
    let rect = container.get_bounding_client_rect();
    to_ndc(
        mouse.client_x() as f64,
        mouse.client_y() as f64,
        (rect.left(), rect.top(), rect.width(), rect.height()),
    )
}

/// Attach viewer input handlers; they live as long as the page
pub fn attach(container: &web_sys::Element, viewer: &Viewer) {
    let mut listeners = Vec::new();

    let (el, v) = (container.clone(), viewer.clone());
    listeners.push(EventListener::new(container, "click", move |event| {
        if let Some((x, y)) = pointer_ndc(&el, event) {
            v.on_click(x, y);
        }
    }));

    let (el, v) = (container.clone(), viewer.clone());
    listeners.push(EventListener::new(container, "dblclick", move |event| {
        if let Some((x, y)) = pointer_ndc(&el, event) {
            if let Some(plane) = v.on_double_click(x, y) {
                log::debug!("Created clipping plane {:?}", plane);
            }
        }
    }));

    let v = viewer.clone();
    listeners.push(EventListener::new(container, CAMERA_REST_EVENT, move |_| {
        v.on_camera_rest();
    }));

    if let Some(window) = web_sys::window() {
        let v = viewer.clone();
        listeners.push(EventListener::new(&window, "keydown", move |event| {
            let Some(key) = event.dyn_ref::<web_sys::KeyboardEvent>().map(|k| k.key()) else {
                return;
            };
            // Leave text fields alone
            let editing = event
                .target()
                .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                .map(|el| matches!(el.tag_name().as_str(), "INPUT" | "TEXTAREA"))
                .unwrap_or(false);
            if !editing && v.on_key(&key) {
                event.prevent_default();
            }
        }));
    }

    for listener in listeners {
        listener.forget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndc_corners_and_center() {
        let rect = (10.0, 20.0, 200.0, 100.0);
        assert_eq!(to_ndc(10.0, 20.0, rect), Some((-1.0, 1.0)));
        assert_eq!(to_ndc(210.0, 120.0, rect), Some((1.0, -1.0)));
        assert_eq!(to_ndc(110.0, 70.0, rect), Some((0.0, 0.0)));
        assert_eq!(to_ndc(0.0, 0.0, (0.0, 0.0, 0.0, 10.0)), None);
    }
}
