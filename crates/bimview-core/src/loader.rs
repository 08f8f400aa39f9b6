// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading
//!
//! [`IfcLoader`] fetches raw bytes through a [`ByteSource`], hands them to a
//! [`ModelParser`] and inserts the result into the registry. It does not
//! inspect the bytes and does not de-duplicate concurrent requests; the
//! action boundary in [`crate::app::Viewer`] owns that.

use crate::error::Result;
use crate::fragments;
use crate::model::{Model, ModelData};
use crate::registry::ModelRegistry;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Where model bytes come from (HTTP on the web, memory in tests)
pub trait ByteSource {
    /// Fetch the whole resource at `url`
    ///
    /// Rejections and non-success statuses are `ViewerError::Network`.
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>>>;
}

/// Options passed through to the parser
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Recenter geometry around the origin
    pub coordinate: bool,
    /// Name given to the resulting model
    pub name: String,
}

/// Turns IFC bytes into model data
pub trait ModelParser {
    /// Parse `bytes`, reporting progress as a 0-100 percentage
    fn parse<'a>(
        &'a self,
        bytes: Vec<u8>,
        options: &'a LoadOptions,
        progress: &'a dyn Fn(f32),
    ) -> LocalBoxFuture<'a, Result<ModelData>>;
}

/// Fetch + parse + register
pub struct IfcLoader {
    source: Rc<dyn ByteSource>,
    parser: Rc<dyn ModelParser>,
    registry: Rc<ModelRegistry>,
    options: LoadOptions,
}

impl IfcLoader {
    pub fn new(
        source: Rc<dyn ByteSource>,
        parser: Rc<dyn ModelParser>,
        registry: Rc<ModelRegistry>,
        options: LoadOptions,
    ) -> Self {
        Self {
            source,
            parser,
            registry,
            options,
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load an IFC file and insert it into the registry
    ///
    /// Either resolves with a model that was inserted exactly once, or fails
    /// without touching the registry.
    pub async fn load_ifc(&self, path: &str) -> Result<Rc<Model>> {
        log::info!("Loading IFC from {}", path);

        let bytes = self.source.fetch(path).await?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), path);

        let name = self.options.name.as_str();
        let progress = move |percent: f32| {
            log::debug!("Parsing '{}': {:.0}%", name, percent);
        };
        let data = self.parser.parse(bytes, &self.options, &progress).await?;

        let model = self.registry.insert(data);
        log::info!(
            "Loaded '{}' as {} ({} elements)",
            model.name(),
            model.id(),
            model.elements().len()
        );
        Ok(model)
    }

    /// Re-open a previously downloaded fragment file without parsing
    pub fn load_fragments(&self, bytes: &[u8]) -> Result<Rc<Model>> {
        let data = fragments::decode(bytes)?;
        let model = self.registry.insert(data);
        log::info!("Loaded fragments '{}' as {}", model.name(), model.id());
        Ok(model)
    }

    /// Fetch a fragment file and load it
    pub async fn load_fragments_from(&self, path: &str) -> Result<Rc<Model>> {
        log::info!("Loading fragments from {}", path);
        let bytes = self.source.fetch(path).await?;
        self.load_fragments(&bytes)
    }
}
