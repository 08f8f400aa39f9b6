// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User actions dispatched from the panel, keyboard or scripts

use crate::classifier::GroupKey;
use serde::{Deserialize, Serialize};

/// Everything the panel can ask the viewer to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    LoadIfc,
    /// Re-open the configured fragment file
    LoadFragments,
    DownloadFragments,
    /// Flip visibility of all clipping planes
    ToggleClippings,
    DeleteAllClippings,
    /// Enable or disable plane creation on double-click
    ToggleClipper,
    ToggleGroup(GroupKey),
}

impl Action {
    /// Busy-tracking identity of long-running actions
    pub fn busy_id(&self) -> Option<ActionId> {
        match self {
            Action::LoadIfc => Some(ActionId::LoadIfc),
            Action::LoadFragments => Some(ActionId::LoadFragments),
            Action::DownloadFragments => Some(ActionId::DownloadFragments),
            Action::ToggleGroup(key) => Some(ActionId::ToggleGroup(key.clone())),
            _ => None,
        }
    }
}

/// Asynchronous actions whose controls show a busy state
///
/// Group toggles are tracked per group, so toggling one group never blocks
/// another.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionId {
    LoadIfc,
    LoadFragments,
    DownloadFragments,
    ToggleGroup(GroupKey),
}

/// Outcome of a dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionStatus {
    Completed,
    /// The same action was already running
    Ignored,
    /// The action failed; the message is also recorded in the store
    Failed(String),
}
