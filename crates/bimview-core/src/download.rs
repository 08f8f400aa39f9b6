// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-side file delivery

use crate::error::Result;
use std::path::PathBuf;

/// Delivers a generated file to the user
pub trait DownloadSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes downloads into a directory
#[derive(Clone, Debug)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for FileSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}
