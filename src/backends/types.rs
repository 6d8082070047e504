// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for media backends

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::watch;

/// Width/height pair of a frame or buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True while the stream is still warming up
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Logical (single image) size of a side-by-side composite frame
    pub fn logical(&self) -> Self {
        Self {
            width: self.width / 2,
            height: self.height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded RGBA composite frame
///
/// The data is tightly packed (stride = width * 4).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    /// Monotonic per-track frame counter, starting at 1
    pub sequence: u64,
    pub captured_at: Instant,
}

impl VideoFrame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Receiving side of a track: always holds the latest frame (or None before the first)
pub type FrameReceiver = watch::Receiver<Option<Arc<VideoFrame>>>;

/// An inbound video track delivered by a peer transport or file source
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub id: String,
    pub frames: FrameReceiver,
    /// Whether the producer wakes receivers on every frame. When false the
    /// consumer has to poll.
    pub notifies_frames: bool,
}

/// Producing side of a track
///
/// Backends push decoded frames here; older frames are overwritten so slow
/// consumers only ever see the latest one.
#[derive(Debug)]
pub struct FramePublisher {
    id: String,
    sender: watch::Sender<Option<Arc<VideoFrame>>>,
    sequence: AtomicU64,
    notifies_frames: bool,
}

impl FramePublisher {
    pub fn new(id: impl Into<String>) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            id: id.into(),
            sender,
            sequence: AtomicU64::new(0),
            notifies_frames: true,
        }
    }

    /// Publisher whose consumers must poll for new frames
    pub fn polled(id: impl Into<String>) -> Self {
        Self {
            notifies_frames: false,
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> MediaTrack {
        MediaTrack {
            id: self.id.clone(),
            frames: self.sender.subscribe(),
            notifies_frames: self.notifies_frames,
        }
    }

    /// Publish a tightly packed RGBA frame, returning its sequence number
    pub fn publish(&self, width: u32, height: u32, data: Arc<[u8]>) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = VideoFrame {
            width,
            height,
            data,
            sequence,
            captured_at: Instant::now(),
        };

        let notify = self.notifies_frames;
        self.sender.send_if_modified(|slot| {
            *slot = Some(Arc::new(frame));
            notify
        });
        sequence
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_size_halves_width() {
        assert_eq!(FrameSize::new(1280, 480).logical(), FrameSize::new(640, 480));
        assert_eq!(FrameSize::new(1, 1).logical(), FrameSize::new(0, 1));
        assert!(FrameSize::new(1, 1).logical().is_empty());
    }

    #[test]
    fn test_publisher_keeps_latest_frame() {
        let publisher = FramePublisher::new("video0");
        let track = publisher.track();
        assert!(track.frames.borrow().is_none());

        publisher.publish(2, 1, Arc::from(vec![0u8; 8].into_boxed_slice()));
        let seq = publisher.publish(4, 1, Arc::from(vec![0u8; 16].into_boxed_slice()));

        let latest = track.frames.borrow().clone().unwrap();
        assert_eq!(latest.sequence, seq);
        assert_eq!(latest.size(), FrameSize::new(4, 1));
    }
}
