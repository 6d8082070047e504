// SPDX-License-Identifier: GPL-3.0-only

//! Looping decoder for recorded RGB-D videos
//!
//! Decodes a recorded file into RGBA frames through an appsink pipeline and
//! restarts playback at end of stream. The calibration comes from the
//! metadata embedded in the file, see [`super::recording`].

use super::appsink::{find_appsink, publish_samples};
use super::recording::{RecordingMetadata, read_embedded_metadata};
use super::{FramePublisher, MediaTrack};
use crate::errors::{AppError, MediaError};
use gstreamer::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

const SINK_NAME: &str = "videosink";

pub struct FileMediaSource {
    path: PathBuf,
    pipeline: gstreamer::Pipeline,
    publisher: Arc<FramePublisher>,
    metadata: RecordingMetadata,
    stop: Arc<AtomicBool>,
    bus_thread: Option<JoinHandle<()>>,
}

impl FileMediaSource {
    /// Open a recorded file and start decoding it
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let metadata = read_embedded_metadata(path)?;

        gstreamer::init().map_err(|e| MediaError::Pipeline(format!("GStreamer init failed: {}", e)))?;

        // filesrc → decodebin → videoconvert → appsink (RGBA)
        let description = format!(
            "filesrc location=\"{}\" ! decodebin ! queue ! videoconvert ! appsink name={} sync=true",
            path.display(),
            SINK_NAME
        );
        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| MediaError::Pipeline(format!("Failed to create file pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| MediaError::Pipeline("Failed to downcast to Pipeline".into()))?;

        let appsink = find_appsink(pipeline.upcast_ref(), SINK_NAME)?;
        let publisher = Arc::new(FramePublisher::new(path.display().to_string()));
        publish_samples(&appsink, publisher.clone());

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| MediaError::Pipeline(format!("Failed to start file pipeline: {:?}", e)))?;

        let stop = Arc::new(AtomicBool::new(false));
        let bus_thread = spawn_loop_thread(&pipeline, stop.clone())?;

        info!(path = %path.display(), "Recorded video opened");

        Ok(Self {
            path: path.to_path_buf(),
            pipeline,
            publisher,
            metadata,
            stop,
            bus_thread: Some(bus_thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn track(&self) -> MediaTrack {
        self.publisher.track()
    }

    pub fn metadata(&self) -> &RecordingMetadata {
        &self.metadata
    }

    pub fn set_paused(&self, paused: bool) {
        let state = if paused {
            gstreamer::State::Paused
        } else {
            gstreamer::State::Playing
        };
        if let Err(e) = self.pipeline.set_state(state) {
            warn!(error = ?e, paused, "Failed to change playback state");
        }
    }

    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.bus_thread.take() {
            let _ = handle.join();
        }
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!(path = %self.path.display(), "Recorded video closed");
    }
}

impl Drop for FileMediaSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Watch the bus, seeking back to the start on end of stream
fn spawn_loop_thread(
    pipeline: &gstreamer::Pipeline,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, MediaError> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| MediaError::Pipeline("No bus on pipeline".into()))?;
    let pipeline = pipeline.clone();

    std::thread::Builder::new()
        .name("file-source-bus".into())
        .spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let Some(msg) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(100)) else {
                    continue;
                };
                use gstreamer::MessageView;
                match msg.view() {
                    MessageView::Eos(..) => {
                        debug!("End of recording, looping");
                        if let Err(e) = pipeline.seek_simple(
                            gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                            gstreamer::ClockTime::ZERO,
                        ) {
                            warn!(error = %e, "Failed to loop recording");
                        }
                    }
                    MessageView::Error(err) => {
                        warn!(error = %err.error(), debug = ?err.debug(), "File pipeline error");
                        break;
                    }
                    _ => {}
                }
            }
        })
        .map_err(|e| MediaError::Pipeline(format!("Failed to spawn bus thread: {}", e)))
}
