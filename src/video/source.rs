// SPDX-License-Identifier: GPL-3.0-only

//! Streamed RGB-D video source
//!
//! A [`VideoSource`] owns one media element and one raster buffer and answers
//! two queries for the renderer: the 3-D point at a flattened pixel index and
//! the current inverse-projection coefficients.
//!
//! Calibration comes either from the device (`/metadata`, refetched whenever
//! the stream resolution changes) or from a recorded file, in which case it is
//! fixed and never rescaled.
//!
//! Metadata results are tagged with the session token of the request that
//! produced them. Results whose token is no longer the live one (after a
//! disconnect or reconnect) are dropped.

use super::lifecycle::{Lifecycle, wait_for_teardown};
use super::media::MediaElement;
use super::subscribers::{VideoChange, VideoChangeSubscribers};
use super::throttle::FrameThrottle;
use crate::backends::{FrameSize, MediaTrack};
use crate::calibration::{
    IntrinsicMatrix, InverseProjection, OriginalSize, correct_intrinsic_matrix,
    inverse_projection_coefficients, unproject,
};
use crate::constants::depth::POINT_DEPTH_SCALE;
use crate::constants::timing::{FRAME_CALLBACK_INTERVAL, FRAME_POLL_INTERVAL};
use crate::depth::{RasterBuffer, decode_depth};
use crate::errors::{ConnectionError, MetadataError};
use crate::signaling::{SessionEvent, SessionState, SessionToken, SignalingSession, StreamMetadata};
use glam::Vec3;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where the intrinsics come from
pub enum CalibrationOrigin {
    /// Fetched from the device over the session's signaling client
    Remote(SignalingSession),
    /// Embedded in a recording; used as-is
    Embedded(IntrinsicMatrix),
}

/// Result of processing one decoded frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    /// A new raster snapshot was taken
    pub rasterized: bool,
    /// The throttled per-frame callback is due
    pub tick: bool,
    /// The frame has a new non-empty size; buffers must follow it even
    /// when calibration for that size is still pending
    pub resized: bool,
    /// Set when this frame completed a resolution change
    pub change: Option<VideoChange>,
    pub sequence: u64,
}

/// What [`VideoSource::next_update`] woke up for
#[derive(Debug)]
pub enum SourceUpdate {
    Frame(FrameOutcome),
    /// Intrinsics were (re)computed; buffers must be rebuilt
    Changed(VideoChange),
    State(SessionState),
    Error(ConnectionError),
}

struct PendingMetadata {
    token: SessionToken,
    result: Result<StreamMetadata, MetadataError>,
}

pub struct VideoSource {
    id: String,
    origin: CalibrationOrigin,
    media: MediaElement,
    raster: RasterBuffer,
    intrinsics: Option<IntrinsicMatrix>,
    original_size: Option<OriginalSize>,
    /// Last accepted metadata, kept to recompute once a frame size is known
    metadata: Option<StreamMetadata>,
    /// Composite size of the last frame seen
    last_size: FrameSize,
    subscribers: VideoChangeSubscribers,
    throttle: FrameThrottle,
    metadata_tx: mpsc::UnboundedSender<PendingMetadata>,
    metadata_rx: mpsc::UnboundedReceiver<PendingMetadata>,
    metadata_task: Option<JoinHandle<()>>,
    teardown: Option<watch::Receiver<bool>>,
}

impl VideoSource {
    /// Source streamed from a device
    pub fn remote(id: impl Into<String>, session: SignalingSession, lifecycle: Option<&Lifecycle>) -> Self {
        Self::new(id.into(), CalibrationOrigin::Remote(session), lifecycle)
    }

    /// Source decoded from a recording with embedded intrinsics
    pub fn embedded(
        id: impl Into<String>,
        intrinsics: IntrinsicMatrix,
        lifecycle: Option<&Lifecycle>,
    ) -> Self {
        let mut source = Self::new(id.into(), CalibrationOrigin::Embedded(intrinsics), lifecycle);
        source.intrinsics = Some(intrinsics);
        source
    }

    fn new(id: String, origin: CalibrationOrigin, lifecycle: Option<&Lifecycle>) -> Self {
        let (metadata_tx, metadata_rx) = mpsc::unbounded_channel();
        Self {
            id,
            origin,
            media: MediaElement::new(),
            raster: RasterBuffer::default(),
            intrinsics: None,
            original_size: None,
            metadata: None,
            last_size: FrameSize::default(),
            subscribers: VideoChangeSubscribers::new(),
            throttle: FrameThrottle::new(FRAME_CALLBACK_INTERVAL),
            metadata_tx,
            metadata_rx,
            metadata_task: None,
            teardown: lifecycle.map(Lifecycle::subscribe),
        }
    }

    pub fn with_frame_callback_interval(mut self, interval: Duration) -> Self {
        self.throttle = FrameThrottle::new(interval);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> Option<&SignalingSession> {
        match &self.origin {
            CalibrationOrigin::Remote(session) => Some(session),
            CalibrationOrigin::Embedded(_) => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut SignalingSession> {
        match &mut self.origin {
            CalibrationOrigin::Remote(session) => Some(session),
            CalibrationOrigin::Embedded(_) => None,
        }
    }

    pub fn media(&self) -> &MediaElement {
        &self.media
    }

    pub fn raster(&self) -> &RasterBuffer {
        &self.raster
    }

    pub fn intrinsics(&self) -> Option<&IntrinsicMatrix> {
        self.intrinsics.as_ref()
    }

    pub fn original_size(&self) -> Option<OriginalSize> {
        self.original_size
    }

    /// Whether points can be queried: a snapshot and intrinsics both exist
    pub fn is_ready(&self) -> bool {
        self.intrinsics.is_some() && !self.raster.is_empty()
    }

    // Connection

    /// Connect to the device; no-op for embedded sources
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        if let CalibrationOrigin::Remote(session) = &mut self.origin {
            self.media.detach();
            session.connect()?;
        }
        Ok(())
    }

    /// Close the peer link and release the media track. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(task) = self.metadata_task.take() {
            task.abort();
        }
        if let CalibrationOrigin::Remote(session) = &mut self.origin {
            session.disconnect();
        }
        if self.media.detach().is_some() {
            debug!(source = %self.id, "Media track released");
        }
    }

    /// Feed a track into the media element
    pub fn attach_track(&mut self, track: MediaTrack) {
        debug!(source = %self.id, track = %track.id, "Track attached to media element");
        self.media.attach(track);
        self.throttle.reset();
    }

    fn handle_session_event(&mut self, event: SessionEvent) -> SourceUpdate {
        match event {
            SessionEvent::StateChanged(state) => SourceUpdate::State(state),
            SessionEvent::TrackAttached(track) => {
                self.attach_track(track);
                self.request_metadata();
                SourceUpdate::State(SessionState::Streaming)
            }
            SessionEvent::Error(err) => SourceUpdate::Error(err),
        }
    }

    // Calibration

    /// Start a background metadata fetch tagged with the live session token
    pub fn request_metadata(&mut self) {
        let CalibrationOrigin::Remote(session) = &self.origin else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(source = %self.id, "No async runtime, metadata not requested");
            return;
        };

        let token = session.token();
        let api = session.api();
        let tx = self.metadata_tx.clone();
        debug!(source = %self.id, token = %token, "Requesting metadata");

        self.metadata_task = Some(runtime.spawn(async move {
            let result = api.get_metadata().await;
            let _ = tx.send(PendingMetadata { token, result });
        }));
    }

    /// Fetch metadata and apply it in place
    pub async fn refresh_metadata(&mut self) -> Option<VideoChange> {
        let CalibrationOrigin::Remote(session) = &self.origin else {
            return None;
        };
        let token = session.token();
        let result = session.api().get_metadata().await;
        self.apply_metadata(PendingMetadata { token, result })
    }

    /// Apply every metadata result that has arrived so far
    pub fn apply_pending_metadata(&mut self) -> Option<VideoChange> {
        let mut change = None;
        while let Ok(pending) = self.metadata_rx.try_recv() {
            change = self.apply_metadata(pending).or(change);
        }
        change
    }

    fn apply_metadata(&mut self, pending: PendingMetadata) -> Option<VideoChange> {
        if let CalibrationOrigin::Remote(session) = &self.origin {
            if !session.is_current(pending.token) {
                debug!(
                    source = %self.id,
                    token = %pending.token,
                    live = %session.token(),
                    "Dropping metadata from an inactive session"
                );
                return None;
            }
        }

        match pending.result {
            Ok(metadata) => self.process_metadata(metadata),
            Err(e) => {
                // Already logged by the client; keep the previous intrinsics
                debug!(source = %self.id, error = %e, "Metadata unavailable");
                None
            }
        }
    }

    /// Adopt `metadata` and recompute the intrinsics for the live height
    ///
    /// Subscribers are notified after the matrix is updated. Before the first
    /// frame the metadata is only stored; the computation runs once a frame
    /// size is known.
    pub fn process_metadata(&mut self, metadata: StreamMetadata) -> Option<VideoChange> {
        if let Some(size) = metadata.original_size {
            self.original_size = Some(size);
        }
        self.metadata = Some(metadata);
        self.recompute_intrinsics()
    }

    fn recompute_intrinsics(&mut self) -> Option<VideoChange> {
        let metadata = self.metadata.as_ref()?;
        if self.last_size.is_empty() {
            debug!(source = %self.id, "No frame yet, deferring intrinsics");
            return None;
        }

        let matrix = correct_intrinsic_matrix(&metadata.k, self.original_size, self.last_size.height);
        self.intrinsics = Some(matrix);
        info!(
            source = %self.id,
            height = self.last_size.height,
            fx = matrix.fx(),
            fy = matrix.fy(),
            cx = matrix.cx(),
            cy = matrix.cy(),
            "Intrinsics updated"
        );
        self.notify_change()
    }

    fn notify_change(&mut self) -> Option<VideoChange> {
        let change = VideoChange {
            size: self.video_size(),
            inverse_projection: self.inverse_projection()?,
        };
        self.subscribers.notify(&change);
        Some(change)
    }

    pub fn subscribe(
        &mut self,
        key: impl Into<String>,
        callback: impl FnMut(&VideoChange) + Send + 'static,
    ) -> bool {
        self.subscribers.subscribe(key, callback)
    }

    pub fn unsubscribe(&mut self, key: &str) -> bool {
        self.subscribers.unsubscribe(key)
    }

    // Queries

    /// Check the media element's size against the last recorded one
    ///
    /// A change to a non-empty size refetches calibration. Embedded sources
    /// notify right away since their intrinsics do not depend on the size.
    /// Remote sources keep their current intrinsics until the refetch lands.
    pub fn update_video_resolution(&mut self) -> Option<VideoChange> {
        let native = self.media.native_size();
        self.resize_to(native)
    }

    fn resize_to(&mut self, native: FrameSize) -> Option<VideoChange> {
        if native == self.last_size {
            return None;
        }
        info!(source = %self.id, from = %self.last_size, to = %native, "Video resolution changed");
        self.last_size = native;

        if native.is_empty() {
            return None;
        }

        match self.origin {
            CalibrationOrigin::Remote(_) => {
                self.request_metadata();
                // Metadata that arrived before the first frame
                if self.intrinsics.is_none() {
                    self.recompute_intrinsics()
                } else {
                    None
                }
            }
            CalibrationOrigin::Embedded(_) => self.notify_change(),
        }
    }

    /// Logical (depth image) size: half the composite width
    pub fn video_size(&self) -> FrameSize {
        self.last_size.logical()
    }

    /// Composite size, uploaded as the shader's `texSize`
    pub fn texture_size(&self) -> FrameSize {
        self.last_size
    }

    pub fn inverse_projection(&self) -> Option<InverseProjection> {
        self.intrinsics.as_ref().map(inverse_projection_coefficients)
    }

    /// Camera-space point of the pixel at flattened index `index`
    ///
    /// Degenerate (NaN) until [`Self::is_ready`].
    pub fn get_point(&self, index: usize) -> Vec3 {
        let size = self.video_size();
        let Some(coeffs) = self.inverse_projection() else {
            return Vec3::NAN;
        };
        if size.is_empty() {
            return Vec3::NAN;
        }

        let width = size.width as usize;
        let x = (index % width) as f32;
        let y = (index / width) as f32;
        let depth = decode_depth(&self.raster, x, y, size) * POINT_DEPTH_SCALE;
        unproject(x, y, depth, &coeffs)
    }

    // Playback

    pub fn toggle(&mut self) -> bool {
        self.media.toggle()
    }

    pub fn toggle_audio(&mut self) -> bool {
        self.media.toggle_audio()
    }

    // Frame loop

    /// Consume the newest frame, if any
    ///
    /// Resolution changes are detected before rasterizing so the snapshot and
    /// the recorded size always agree.
    pub fn on_video_frame(&mut self, now: Instant) -> FrameOutcome {
        let Some(frame) = self.media.take_new_frame() else {
            return FrameOutcome::default();
        };

        let size = frame.size();
        let resized = size != self.last_size && !size.is_empty();
        let change = self.resize_to(size);
        let rasterized = self.raster.rasterize(&frame);
        let tick = rasterized && self.throttle.should_fire(now);

        FrameOutcome {
            rasterized,
            tick,
            resized,
            change,
            sequence: frame.sequence,
        }
    }

    /// Drive the source until something happens
    ///
    /// Returns None once teardown fires (the source is disconnected first).
    pub async fn next_update(&mut self) -> Option<SourceUpdate> {
        loop {
            if let Some(change) = self.apply_pending_metadata() {
                return Some(SourceUpdate::Changed(change));
            }

            let session = match &mut self.origin {
                CalibrationOrigin::Remote(session) if session.has_link() => Some(session),
                _ => None,
            };

            let wake = tokio::select! {
                _ = teardown_signal(self.teardown.as_mut()) => Wake::Teardown,
                Some(event) = session_event(session) => Wake::Session(event),
                Some(pending) = self.metadata_rx.recv() => Wake::Metadata(pending),
                alive = frame_signal(self.media.track_mut()) => Wake::Frame(alive),
            };

            match wake {
                Wake::Teardown => {
                    info!(source = %self.id, "Teardown, disconnecting");
                    self.teardown = None;
                    self.disconnect();
                    return None;
                }
                Wake::Session(event) => return Some(self.handle_session_event(event)),
                Wake::Metadata(pending) => {
                    if let Some(change) = self.apply_metadata(pending) {
                        return Some(SourceUpdate::Changed(change));
                    }
                }
                Wake::Frame(true) => {
                    let outcome = self.on_video_frame(Instant::now());
                    if outcome.rasterized || outcome.resized {
                        return Some(SourceUpdate::Frame(outcome));
                    }
                }
                Wake::Frame(false) => {
                    warn!(source = %self.id, "Media track ended");
                    self.media.detach();
                }
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let Some(task) = self.metadata_task.take() {
            task.abort();
        }
    }
}

enum Wake {
    Teardown,
    Session(SessionEvent),
    Metadata(PendingMetadata),
    Frame(bool),
}

async fn teardown_signal(receiver: Option<&mut watch::Receiver<bool>>) {
    match receiver {
        Some(receiver) => wait_for_teardown(receiver).await,
        None => std::future::pending().await,
    }
}

async fn session_event(session: Option<&mut SignalingSession>) -> Option<SessionEvent> {
    match session {
        Some(session) => session.next_event().await,
        None => std::future::pending().await,
    }
}

/// True when a new frame may be available, false once the track has ended
async fn frame_signal(track: Option<&mut MediaTrack>) -> bool {
    match track {
        Some(track) if track.notifies_frames => track.frames.changed().await.is_ok(),
        Some(track) => {
            tokio::time::sleep(FRAME_POLL_INTERVAL).await;
            track.frames.has_changed().is_ok()
        }
        None => std::future::pending().await,
    }
}
