// SPDX-License-Identifier: GPL-3.0-only

//! Hidden media element
//!
//! Holds the attached track and the playback flags. Each video source owns
//! exactly one; detaching (or dropping) releases the track.

use crate::backends::{FrameSize, MediaTrack, VideoFrame};
use std::sync::Arc;

#[derive(Debug)]
pub struct MediaElement {
    track: Option<MediaTrack>,
    paused: bool,
    muted: bool,
    last_sequence: u64,
}

impl Default for MediaElement {
    fn default() -> Self {
        // Autoplay requires starting muted
        Self {
            track: None,
            paused: false,
            muted: true,
            last_sequence: 0,
        }
    }
}

impl MediaElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current source with `track`
    pub fn attach(&mut self, track: MediaTrack) {
        self.track = Some(track);
        self.last_sequence = 0;
    }

    pub fn detach(&mut self) -> Option<MediaTrack> {
        self.last_sequence = 0;
        self.track.take()
    }

    pub fn track(&self) -> Option<&MediaTrack> {
        self.track.as_ref()
    }

    pub fn track_mut(&mut self) -> Option<&mut MediaTrack> {
        self.track.as_mut()
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn notifies_frames(&self) -> bool {
        self.track.as_ref().is_some_and(|track| track.notifies_frames)
    }

    /// Latest decoded frame, if any
    pub fn current_frame(&self) -> Option<Arc<VideoFrame>> {
        self.track.as_ref().and_then(|track| track.frames.borrow().clone())
    }

    /// Latest frame if it has not been returned before
    ///
    /// Paused elements never yield frames.
    pub fn take_new_frame(&mut self) -> Option<Arc<VideoFrame>> {
        if self.paused {
            return None;
        }
        let frame = self.current_frame()?;
        if frame.sequence == self.last_sequence {
            return None;
        }
        self.last_sequence = frame.sequence;
        Some(frame)
    }

    /// Composite size of the latest frame; zero before the first frame
    pub fn native_size(&self) -> FrameSize {
        self.current_frame()
            .map(|frame| frame.size())
            .unwrap_or_default()
    }

    pub fn toggle(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn toggle_audio(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::FramePublisher;

    #[test]
    fn test_starts_muted_and_playing() {
        let element = MediaElement::new();
        assert!(element.is_muted());
        assert!(!element.is_paused());
        assert_eq!(element.native_size(), FrameSize::default());
    }

    #[test]
    fn test_new_frames_are_returned_once() {
        let publisher = FramePublisher::new("t");
        let mut element = MediaElement::new();
        element.attach(publisher.track());
        assert!(element.take_new_frame().is_none());

        publisher.publish(2, 2, Arc::from(vec![0u8; 16].into_boxed_slice()));
        assert!(element.take_new_frame().is_some());
        assert!(element.take_new_frame().is_none());
        assert_eq!(element.native_size(), FrameSize::new(2, 2));
    }

    #[test]
    fn test_paused_element_yields_nothing() {
        let publisher = FramePublisher::new("t");
        let mut element = MediaElement::new();
        element.attach(publisher.track());
        assert!(element.toggle());

        publisher.publish(2, 2, Arc::from(vec![0u8; 16].into_boxed_slice()));
        assert!(element.take_new_frame().is_none());

        assert!(!element.toggle());
        assert!(element.take_new_frame().is_some());
    }
}
