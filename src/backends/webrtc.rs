// SPDX-License-Identifier: GPL-3.0-only

//! webrtcbin peer transport
//!
//! Pipeline layout once a remote video stream arrives:
//!
//! ```text
//! webrtcbin ─pad─▶ decodebin ─video pad─▶ queue ! videoconvert ! appsink
//! ```
//!
//! The answer is only handed back once ICE gathering is complete, so it
//! carries every local candidate and can be posted in one request.

use super::appsink::{find_appsink, publish_samples};
use super::{FramePublisher, MediaTrack, PeerTransport, TransportFactory};
use crate::errors::{ConnectionError, MediaError};
use crate::signaling::{SdpKind, SessionDescription};
use futures::future::BoxFuture;
use gstreamer::prelude::*;
use gstreamer_webrtc::{WebRTCICEGatheringState, WebRTCSDPType, WebRTCSessionDescription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const WEBRTC_NAME: &str = "webrtc";
const SINK_NAME: &str = "sink";

/// Creates a fresh webrtcbin pipeline per connection attempt
#[derive(Debug, Clone)]
pub struct WebRtcBinFactory {
    stun_server: Option<String>,
}

impl Default for WebRtcBinFactory {
    fn default() -> Self {
        // Device and viewer share a LAN; host candidates suffice
        Self { stun_server: None }
    }
}

impl WebRtcBinFactory {
    pub fn with_stun_server(stun_server: impl Into<String>) -> Self {
        Self {
            stun_server: Some(stun_server.into()),
        }
    }
}

impl TransportFactory for WebRtcBinFactory {
    fn create(
        &self,
        tracks: mpsc::UnboundedSender<MediaTrack>,
    ) -> Result<Arc<dyn PeerTransport>, MediaError> {
        WebRtcBinTransport::new(self.stun_server.as_deref(), tracks)
            .map(|transport| Arc::new(transport) as Arc<dyn PeerTransport>)
    }
}

pub struct WebRtcBinTransport {
    pipeline: gstreamer::Pipeline,
    webrtc: gstreamer::Element,
    closed: AtomicBool,
}

impl WebRtcBinTransport {
    fn new(
        stun_server: Option<&str>,
        tracks: mpsc::UnboundedSender<MediaTrack>,
    ) -> Result<Self, MediaError> {
        gstreamer::init().map_err(|e| MediaError::Pipeline(format!("GStreamer init failed: {}", e)))?;

        let mut description = format!("webrtcbin name={} bundle-policy=max-bundle", WEBRTC_NAME);
        if let Some(stun) = stun_server {
            description.push_str(&format!(" stun-server={}", stun));
        }

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| MediaError::Pipeline(format!("Failed to create webrtc pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| MediaError::Pipeline("Failed to downcast to Pipeline".into()))?;

        let webrtc = pipeline
            .by_name(WEBRTC_NAME)
            .ok_or_else(|| MediaError::Pipeline("Failed to find webrtcbin".into()))?;

        let weak_pipeline = pipeline.downgrade();
        webrtc.connect_pad_added(move |_, pad| {
            if pad.direction() != gstreamer::PadDirection::Src {
                return;
            }
            let Some(pipeline) = weak_pipeline.upgrade() else {
                return;
            };
            if let Err(e) = attach_decoder(&pipeline, pad, tracks.clone()) {
                warn!(pad = %pad.name(), error = %e, "Failed to attach decoder to incoming stream");
            }
        });

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| MediaError::Pipeline(format!("Failed to start webrtc pipeline: {:?}", e)))?;

        debug!("webrtcbin transport created");

        Ok(Self {
            pipeline,
            webrtc,
            closed: AtomicBool::new(false),
        })
    }
}

/// Link a new webrtcbin source pad into a decoder feeding a fresh track
fn attach_decoder(
    pipeline: &gstreamer::Pipeline,
    pad: &gstreamer::Pad,
    tracks: mpsc::UnboundedSender<MediaTrack>,
) -> Result<(), MediaError> {
    let decodebin = gstreamer::ElementFactory::make("decodebin")
        .build()
        .map_err(|e| MediaError::Pipeline(format!("Failed to create decodebin: {}", e)))?;
    pipeline
        .add(&decodebin)
        .map_err(|e| MediaError::Pipeline(e.to_string()))?;

    let track_id = pad.name().to_string();
    let weak_pipeline = pipeline.downgrade();
    decodebin.connect_pad_added(move |_, decoded| {
        let is_video = decoded
            .current_caps()
            .and_then(|caps| caps.structure(0).map(|s| s.name().starts_with("video/")))
            .unwrap_or(false);
        if !is_video {
            return;
        }
        let Some(pipeline) = weak_pipeline.upgrade() else {
            return;
        };

        match link_video_sink(&pipeline, decoded, &track_id) {
            Ok(track) => {
                info!(track = %track.id, "Remote video track attached");
                let _ = tracks.send(track);
            }
            Err(e) => warn!(track = %track_id, error = %e, "Failed to link video sink"),
        }
    });

    decodebin
        .sync_state_with_parent()
        .map_err(|e| MediaError::Pipeline(e.to_string()))?;

    let sink_pad = decodebin
        .static_pad("sink")
        .ok_or_else(|| MediaError::Pipeline("decodebin has no sink pad".into()))?;
    pad.link(&sink_pad)
        .map_err(|e| MediaError::Pipeline(format!("Failed to link incoming stream: {:?}", e)))?;
    Ok(())
}

fn link_video_sink(
    pipeline: &gstreamer::Pipeline,
    decoded: &gstreamer::Pad,
    track_id: &str,
) -> Result<MediaTrack, MediaError> {
    let bin = gstreamer::parse::bin_from_description(
        &format!("queue ! videoconvert ! appsink name={} sync=false", SINK_NAME),
        true,
    )
    .map_err(|e| MediaError::Pipeline(format!("Failed to create video sink: {}", e)))?;

    let publisher = Arc::new(FramePublisher::new(track_id));
    let appsink = find_appsink(&bin, SINK_NAME)?;
    publish_samples(&appsink, publisher.clone());

    pipeline
        .add(&bin)
        .map_err(|e| MediaError::Pipeline(e.to_string()))?;
    bin.sync_state_with_parent()
        .map_err(|e| MediaError::Pipeline(e.to_string()))?;

    let sink_pad = bin
        .static_pad("sink")
        .ok_or_else(|| MediaError::Pipeline("Video sink has no ghost pad".into()))?;
    decoded
        .link(&sink_pad)
        .map_err(|e| MediaError::Pipeline(format!("Failed to link decoded video: {:?}", e)))?;

    Ok(publisher.track())
}

impl PeerTransport for WebRtcBinTransport {
    fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> BoxFuture<'static, Result<SessionDescription, ConnectionError>> {
        let webrtc = self.webrtc.clone();
        let closed = self.closed.load(Ordering::SeqCst);

        Box::pin(async move {
            if closed {
                return Err(ConnectionError::Closed);
            }
            if offer.kind != SdpKind::Offer {
                return Err(ConnectionError::Negotiation(format!(
                    "expected an offer, got {:?}",
                    offer.kind
                )));
            }

            let sdp = gstreamer_sdp::SDPMessage::parse_buffer(offer.sdp.as_bytes())
                .map_err(|e| ConnectionError::Negotiation(format!("Invalid offer SDP: {}", e)))?;
            let remote = WebRTCSessionDescription::new(WebRTCSDPType::Offer, sdp);
            webrtc.emit_by_name::<()>(
                "set-remote-description",
                &[&remote, &None::<gstreamer::Promise>],
            );

            let answer = create_answer(&webrtc).await?;

            let gathered = ice_gathering_complete(&webrtc);
            webrtc.emit_by_name::<()>(
                "set-local-description",
                &[&answer, &None::<gstreamer::Promise>],
            );
            gathered.await.map_err(|_| ConnectionError::Closed)?;

            let local = webrtc
                .property::<Option<WebRTCSessionDescription>>("local-description")
                .ok_or_else(|| ConnectionError::Negotiation("No local description".into()))?;
            let text = local
                .sdp()
                .as_text()
                .map_err(|e| ConnectionError::Negotiation(e.to_string()))?;

            Ok(SessionDescription::answer(text))
        })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!("webrtcbin transport closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WebRtcBinTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn create_answer(
    webrtc: &gstreamer::Element,
) -> Result<WebRTCSessionDescription, ConnectionError> {
    let (tx, rx) = oneshot::channel();
    let promise = gstreamer::Promise::with_change_func(move |reply| {
        let answer = match reply {
            Ok(Some(reply)) => reply
                .get::<WebRTCSessionDescription>("answer")
                .map_err(|e| e.to_string()),
            Ok(None) => Err("empty reply".to_string()),
            Err(e) => Err(format!("{:?}", e)),
        };
        let _ = tx.send(answer);
    });
    webrtc.emit_by_name::<()>("create-answer", &[&None::<gstreamer::Structure>, &promise]);

    rx.await
        .map_err(|_| ConnectionError::Closed)?
        .map_err(ConnectionError::Negotiation)
}

/// Resolves when webrtcbin reports ICE gathering as complete
fn ice_gathering_complete(webrtc: &gstreamer::Element) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let notify_tx = tx.clone();
    webrtc.connect_notify(Some("ice-gathering-state"), move |webrtc, _| {
        let state = webrtc.property::<WebRTCICEGatheringState>("ice-gathering-state");
        if state == WebRTCICEGatheringState::Complete {
            if let Some(tx) = notify_tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(());
            }
        }
    });

    // Gathering may already be done
    if webrtc.property::<WebRTCICEGatheringState>("ice-gathering-state")
        == WebRTCICEGatheringState::Complete
    {
        if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(());
        }
    }

    rx
}
