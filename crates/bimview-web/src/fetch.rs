// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP byte source on `window.fetch`

use bimview_core::{ByteSource, Result, ViewerError};
use futures::future::{FutureExt, LocalBoxFuture};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Get the `file` URL query parameter if present.
/// Example: `?file=house.ifc` returns `Some("house.ifc")`
pub fn get_file_param() -> Option<String> {
    let window = web_sys::window()?;
    let search = window.location().search().ok()?;
    if search.is_empty() {
        return None;
    }
    let params = web_sys::UrlSearchParams::new_with_str(&search).ok()?;
    params.get("file").filter(|f| !f.trim().is_empty())
}

/// Fetches files relative to the page
#[derive(Default)]
pub struct FetchSource;

impl FetchSource {
    pub fn new() -> Self {
        FetchSource
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let network = |msg: String| ViewerError::network(url, msg);

    let window = web_sys::window().ok_or_else(|| network("No window object".into()))?;
    let request = web_sys::Request::new_with_str(url)
        .map_err(|e| network(format!("Failed to create request: {:?}", e)))?;

    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| network(format!("Fetch failed: {:?}", e)))?;
    let resp: web_sys::Response = resp_value
        .dyn_into()
        .map_err(|_| network("Response is not a Response object".into()))?;

    if !resp.ok() {
        return Err(network(format!(
            "HTTP error: {} {}",
            resp.status(),
            resp.status_text()
        )));
    }

    let buffer_promise = resp
        .array_buffer()
        .map_err(|e| network(format!("Failed to read body: {:?}", e)))?;
    let buffer = JsFuture::from(buffer_promise)
        .await
        .map_err(|e| network(format!("Failed to read response: {:?}", e)))?;

    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

impl ByteSource for FetchSource {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>>> {
        fetch_bytes(url).boxed_local()
    }
}
