// SPDX-License-Identifier: GPL-3.0-only

//! RGBA appsink plumbing shared by the GStreamer backends

use super::FramePublisher;
use crate::errors::MediaError;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use std::sync::Arc;
use tracing::warn;

/// Look up an appsink by name inside a bin
pub(crate) fn find_appsink(bin: &gstreamer::Bin, name: &str) -> Result<AppSink, MediaError> {
    bin.by_name(name)
        .ok_or_else(|| MediaError::Pipeline(format!("Failed to find appsink '{}'", name)))?
        .downcast::<AppSink>()
        .map_err(|_| MediaError::Pipeline("Failed to downcast to AppSink".into()))
}

/// Constrain the sink to RGBA and forward every sample to `publisher`
///
/// Only the latest sample is kept; late frames are dropped.
pub(crate) fn publish_samples(appsink: &AppSink, publisher: Arc<FramePublisher>) {
    let caps = gstreamer_video::VideoCapsBuilder::new()
        .format(gstreamer_video::VideoFormat::Rgba)
        .build();
    appsink.set_caps(Some(&caps));
    appsink.set_max_buffers(1);
    appsink.set_drop(true);

    appsink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                match copy_rgba(&sample) {
                    Ok((width, height, data)) => {
                        publisher.publish(width, height, data);
                    }
                    Err(e) => warn!(track = publisher.id(), error = %e, "Dropping undecodable sample"),
                }
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// Copy a sample into a tightly packed RGBA buffer
fn copy_rgba(sample: &gstreamer::Sample) -> Result<(u32, u32, Arc<[u8]>), MediaError> {
    let caps = sample
        .caps()
        .ok_or_else(|| MediaError::Pipeline("No caps on sample".into()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| MediaError::UnsupportedFormat(e.to_string()))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| MediaError::Pipeline("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| MediaError::Pipeline("Failed to map buffer".into()))?;

    let width = info.width();
    let height = info.height();
    let row = width as usize * 4;
    let stride = info.stride().first().copied().unwrap_or(row as i32).max(0) as usize;
    let src = map.as_slice();

    let too_short = || {
        MediaError::UnsupportedFormat(format!(
            "{} bytes for a {}x{} frame with stride {}",
            src.len(),
            width,
            height,
            stride
        ))
    };

    if stride == row {
        let packed = src.get(..row * height as usize).ok_or_else(too_short)?;
        return Ok((width, height, Arc::from(packed)));
    }

    // Strip row padding
    let mut packed = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        packed.extend_from_slice(src.get(start..start + row).ok_or_else(too_short)?);
    }
    Ok((width, height, Arc::from(packed.into_boxed_slice())))
}
