// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-side downloads via a blob URL and a synthetic anchor click

use bimview_core::{DownloadSink, Result, ViewerError};
use gloo::timers::callback::Timeout;
use wasm_bindgen::{JsCast, JsValue};

/// Delay before the blob URL of a download is released
pub const REVOKE_DELAY_MS: u32 = 1_000;

fn io_error(context: &str, e: JsValue) -> ViewerError {
    ViewerError::Io(std::io::Error::other(format!("{}: {:?}", context, e)))
}

#[derive(Default)]
pub struct BlobSink;

impl BlobSink {
    pub fn new() -> Self {
        BlobSink
    }
}

impl DownloadSink for BlobSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| io_error("no document", JsValue::NULL))?;

        let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
        let options = web_sys::BlobPropertyBag::new();
        options.set_type("application/octet-stream");
        let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|e| io_error("failed to create blob", e))?;
        let url = web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|e| io_error("failed to create object URL", e))?;

        let anchor: web_sys::HtmlAnchorElement = document
            .create_element("a")
            .map_err(|e| io_error("failed to create anchor", e))?
            .unchecked_into();
        anchor.set_href(&url);
        anchor.set_download(file_name);

        // Firefox only follows clicks on attached anchors
        let body = document.body();
        if let Some(body) = &body {
            body.append_child(&anchor)
                .map_err(|e| io_error("failed to attach anchor", e))?;
        }
        anchor.click();
        if let Some(body) = &body {
            if let Err(e) = body.remove_child(&anchor) {
                log::warn!("Download anchor not removed: {:?}", e);
            }
        }

        // The download reads the blob after this returns
        Timeout::new(REVOKE_DELAY_MS, move || {
            if let Err(e) = web_sys::Url::revoke_object_url(&url) {
                log::warn!("Failed to revoke object URL: {:?}", e);
            }
        })
        .forget();
        Ok(())
    }
}
