// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for viewer operations

use thiserror::Error;

/// Result type alias for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that can occur while setting up or driving the viewer
///
/// An empty registry is deliberately absent here: download and tool actions
/// treat it as a reachable state and return `Ok(None)` or an empty list.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Missing DOM container, worker path or other startup setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fetch rejected or returned a non-success status
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The parser rejected the IFC bytes
    #[error("Parse error: {0}")]
    Parse(String),

    /// A fragment file could not be decoded
    #[error("Invalid fragment data: {0}")]
    Fragment(String),

    /// Failed to deliver a download
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid JSON configuration
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ViewerError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ViewerError::Configuration(msg.into())
    }

    /// Create a new network error
    pub fn network(url: impl Into<String>, msg: impl Into<String>) -> Self {
        ViewerError::Network {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        ViewerError::Parse(msg.into())
    }

    /// Create a new fragment decode error
    pub fn fragment(msg: impl Into<String>) -> Self {
        ViewerError::Fragment(msg.into())
    }

    /// Whether this error is fatal at startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, ViewerError::Configuration(_) | ViewerError::Json(_))
    }
}
