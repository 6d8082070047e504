// SPDX-License-Identifier: GPL-3.0-only

//! Process-wide teardown signal
//!
//! Video sources subscribe once when they are created and disconnect as soon
//! as teardown fires, so no peer transport outlives the process shutdown.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Lifecycle {
    teardown: Arc<watch::Sender<bool>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (teardown, _) = watch::channel(false);
        Self {
            teardown: Arc::new(teardown),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.teardown.subscribe()
    }

    /// Fire teardown. Later calls are no-ops.
    pub fn teardown(&self) {
        let already = self.teardown.send_replace(true);
        if !already {
            info!(subscribers = self.teardown.receiver_count(), "Teardown requested");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        *self.teardown.borrow()
    }

    pub fn subscriber_count(&self) -> usize {
        self.teardown.receiver_count()
    }

    /// Fire teardown on Ctrl+C
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let lifecycle = self.clone();
        ctrlc::set_handler(move || lifecycle.teardown())
    }
}

/// Resolves once teardown has fired, or immediately if it already has
pub async fn wait_for_teardown(receiver: &mut watch::Receiver<bool>) {
    // A closed channel means the lifecycle owner is gone; treat it as teardown
    let _ = receiver.wait_for(|torn_down| *torn_down).await;
}
