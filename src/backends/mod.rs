// SPDX-License-Identifier: GPL-3.0-only

//! Media backends
//!
//! A backend turns a remote offer into a live peer session and delivers the
//! inbound video track as RGBA [`VideoFrame`]s:
//!
//! ```text
//!   SignalingSession ──offer──▶ PeerTransport ──answer──▶ SignalingSession
//!                                    │
//!                                    └──MediaTrack (watch of VideoFrame)──▶ VideoSource
//! ```
//!
//! # Modules
//!
//! - [`types`]: frame, track and size types shared by every backend
//! - [`recording`]: metadata embedded in recorded RGB-D videos
//! - `webrtc` (feature `gstreamer`): webrtcbin peer transport
//! - `file_source` (feature `gstreamer`): looping decoder for recorded videos

pub mod recording;
pub mod types;

#[cfg(feature = "gstreamer")]
mod appsink;
#[cfg(feature = "gstreamer")]
pub mod file_source;
#[cfg(feature = "gstreamer")]
pub mod webrtc;

pub use types::{FramePublisher, FrameReceiver, FrameSize, MediaTrack, VideoFrame};

use crate::errors::{ConnectionError, MediaError};
use crate::signaling::SessionDescription;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A peer-to-peer media session negotiated from a remote offer
///
/// Inbound tracks are reported on the channel handed to
/// [`TransportFactory::create`].
pub trait PeerTransport: Send + Sync {
    /// Apply the remote offer and produce the local answer
    ///
    /// Resolves once the answer is complete (all local candidates gathered),
    /// so the answer can be posted in a single request.
    fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> BoxFuture<'static, Result<SessionDescription, ConnectionError>>;

    /// Tear the session down. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Creates one [`PeerTransport`] per connection attempt
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        tracks: mpsc::UnboundedSender<MediaTrack>,
    ) -> Result<Arc<dyn PeerTransport>, MediaError>;
}

/// Factory used when the crate is built without a media backend
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTransportFactory;

impl TransportFactory for UnavailableTransportFactory {
    fn create(
        &self,
        _tracks: mpsc::UnboundedSender<MediaTrack>,
    ) -> Result<Arc<dyn PeerTransport>, MediaError> {
        Err(MediaError::BackendUnavailable)
    }
}

/// The best transport factory compiled into this build
pub fn default_transport_factory() -> Arc<dyn TransportFactory> {
    #[cfg(feature = "gstreamer")]
    {
        Arc::new(webrtc::WebRtcBinFactory::default())
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        Arc::new(UnavailableTransportFactory)
    }
}
