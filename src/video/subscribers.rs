// SPDX-License-Identifier: GPL-3.0-only

//! Ordered "video changed" subscribers
//!
//! Subscribers are keyed: subscribing twice under the same key keeps a single
//! entry at its original position, and unsubscribing an unknown key is a
//! no-op. Notification runs in subscription order.

use crate::backends::FrameSize;

/// Payload of a "video changed" notification
///
/// Sent only after the intrinsics for `size` are in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoChange {
    /// Logical (depth image) size
    pub size: FrameSize,
    pub inverse_projection: crate::calibration::InverseProjection,
}

type Callback = Box<dyn FnMut(&VideoChange) + Send>;

#[derive(Default)]
pub struct VideoChangeSubscribers {
    entries: Vec<(String, Callback)>,
}

impl VideoChangeSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`. Returns false if the key already exists.
    pub fn subscribe(
        &mut self,
        key: impl Into<String>,
        callback: impl FnMut(&VideoChange) + Send + 'static,
    ) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, Box::new(callback)));
        true
    }

    pub fn unsubscribe(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| existing != key);
        self.entries.len() != before
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify(&mut self, change: &VideoChange) {
        for (_, callback) in self.entries.iter_mut() {
            callback(change);
        }
    }
}

impl std::fmt::Debug for VideoChangeSubscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(key, _)| key))
            .finish()
    }
}
