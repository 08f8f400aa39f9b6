// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration

use crate::error::{Result, ViewerError};
use serde::{Deserialize, Serialize};

/// Initial camera pose
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: [78.0, 20.0, -2.2],
            target: [26.0, -4.0, 25.0],
        }
    }
}

/// Startup settings for a viewer instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// DOM id of the element the renderer attaches to
    pub container: String,
    /// Path of the fragments worker script handed to the render backend
    pub worker_url: String,
    /// Initial camera position and look-at target
    pub camera: CameraPose,
    /// IFC file fetched by the "Load IFC" control
    pub ifc_path: String,
    /// Name given to parsed models
    pub model_name: String,
    /// Move the model to the scene origin while parsing
    pub coordinate: bool,
    /// File name of the fragment download
    pub download_name: String,
    /// Fragment file fetched by the "Load Fragments" control
    pub fragments_path: String,
    /// Show a ground grid in the scene
    pub grid: bool,
    /// List the properties of the selected element in the panel
    pub show_properties: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            container: "container".to_string(),
            worker_url: "./assets/workers/worker.mjs".to_string(),
            camera: CameraPose::default(),
            ifc_path: "small.ifc".to_string(),
            model_name: "example".to_string(),
            coordinate: false,
            download_name: "small.frag".to_string(),
            fragments_path: "small.frag".to_string(),
            grid: true,
            show_properties: true,
        }
    }
}

impl ViewerConfig {
    /// Parse a JSON document, filling missing keys with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would leave the viewer rendering nothing
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(ViewerError::config("container id is empty"));
        }
        if self.worker_url.trim().is_empty() {
            return Err(ViewerError::config("fragments worker path is empty"));
        }
        if self.download_name.trim().is_empty() {
            return Err(ViewerError::config("download file name is empty"));
        }
        Ok(())
    }

    /// Override the IFC path (e.g. from a `?file=` URL parameter)
    pub fn with_ifc_path(mut self, path: impl Into<String>) -> Self {
        self.ifc_path = path.into();
        self
    }
}
