// SPDX-License-Identifier: GPL-3.0-only

//! Shared fakes for the integration tests

#![allow(dead_code)]

use futures::future::BoxFuture;
use rgbd_stream::backends::{FramePublisher, MediaTrack, PeerTransport, TransportFactory};
use rgbd_stream::calibration::OriginalSize;
use rgbd_stream::errors::{ConnectionError, MediaError, MetadataError};
use rgbd_stream::signaling::{AnswerMessage, SessionDescription, SignalingApi, StreamMetadata};
use rgbd_stream::video::{SourceUpdate, VideoSource};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const RAW_K: [f32; 9] = [500.0, 0.0, 0.0, 0.0, 500.0, 0.0, 320.0, 240.0, 1.0];

pub fn metadata(k: [f32; 9]) -> StreamMetadata {
    StreamMetadata {
        k,
        original_size: Some(OriginalSize {
            width: 640,
            height: 480,
        }),
    }
}

/// In-process device
pub struct FakeDevice {
    pub offer: Mutex<Result<SessionDescription, ConnectionError>>,
    pub offer_delay: Mutex<Duration>,
    pub answer_result: Mutex<Result<(), ConnectionError>>,
    pub metadata: Mutex<Result<StreamMetadata, MetadataError>>,
    pub metadata_delay: Mutex<Duration>,
    pub answers: Mutex<Vec<AnswerMessage>>,
    pub offer_requests: AtomicUsize,
    pub metadata_requests: AtomicUsize,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            offer: Mutex::new(Ok(SessionDescription::offer("v=0 offer"))),
            offer_delay: Mutex::new(Duration::ZERO),
            answer_result: Mutex::new(Ok(())),
            metadata: Mutex::new(Ok(metadata(RAW_K))),
            metadata_delay: Mutex::new(Duration::ZERO),
            answers: Mutex::new(Vec::new()),
            offer_requests: AtomicUsize::new(0),
            metadata_requests: AtomicUsize::new(0),
        })
    }

    pub fn set_metadata(&self, result: Result<StreamMetadata, MetadataError>, delay: Duration) {
        *self.metadata.lock().unwrap() = result;
        *self.metadata_delay.lock().unwrap() = delay;
    }
}

impl SignalingApi for FakeDevice {
    fn peer_address(&self) -> &str {
        "http://fake-device"
    }

    fn retrieve_offer(&self) -> BoxFuture<'static, Result<SessionDescription, ConnectionError>> {
        self.offer_requests.fetch_add(1, Ordering::SeqCst);
        let offer = self.offer.lock().unwrap().clone();
        let delay = *self.offer_delay.lock().unwrap();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            offer
        })
    }

    fn send_answer(&self, answer: AnswerMessage) -> BoxFuture<'static, Result<(), ConnectionError>> {
        self.answers.lock().unwrap().push(answer);
        let result = self.answer_result.lock().unwrap().clone();
        Box::pin(async move { result })
    }

    fn get_metadata(&self) -> BoxFuture<'static, Result<StreamMetadata, MetadataError>> {
        self.metadata_requests.fetch_add(1, Ordering::SeqCst);
        let result = self.metadata.lock().unwrap().clone();
        let delay = *self.metadata_delay.lock().unwrap();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            result
        })
    }
}

pub struct FakeTransport {
    tracks: mpsc::UnboundedSender<MediaTrack>,
    closed: AtomicBool,
}

impl FakeTransport {
    /// Simulate the remote video track arriving
    pub fn emit_track(&self, track: MediaTrack) -> bool {
        self.tracks.send(track).is_ok()
    }
}

impl PeerTransport for FakeTransport {
    fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> BoxFuture<'static, Result<SessionDescription, ConnectionError>> {
        let closed = self.closed.load(Ordering::SeqCst);
        Box::pin(async move {
            if closed {
                return Err(ConnectionError::Closed);
            }
            Ok(SessionDescription::answer(format!("answer to {}", offer.sdp)))
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeTransportFactory {
    pub transports: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    pub fn open(&self) -> usize {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.is_closed())
            .count()
    }

    pub fn last(&self) -> Arc<FakeTransport> {
        self.transports.lock().unwrap().last().cloned().unwrap()
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(
        &self,
        tracks: mpsc::UnboundedSender<MediaTrack>,
    ) -> Result<Arc<dyn PeerTransport>, MediaError> {
        let transport = Arc::new(FakeTransport {
            tracks,
            closed: AtomicBool::new(false),
        });
        self.transports.lock().unwrap().push(transport.clone());
        Ok(transport)
    }
}

/// Composite frame: uniform hue-encoded depth on the left, grey on the right
///
/// Depth pixels are stored as `[255, r, g, b]`, matching the one-byte shift
/// the decoder reads with.
pub fn composite_frame(width: u32, height: u32, rgb: [u8; 3]) -> Arc<[u8]> {
    let half = (width / 2) as usize;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for _ in 0..half {
            data.extend_from_slice(&[255, rgb[0], rgb[1], rgb[2]]);
        }
        for _ in half..width as usize {
            data.extend_from_slice(&[128, 128, 128, 255]);
        }
    }
    Arc::from(data.into_boxed_slice())
}

/// Drive `source` until `done` holds, collecting every update
pub async fn drive_until(
    source: &mut VideoSource,
    timeout: Duration,
    mut done: impl FnMut(&VideoSource) -> bool,
) -> Vec<SourceUpdate> {
    let mut updates = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    while !done(source) {
        match tokio::time::timeout_at(deadline, source.next_update()).await {
            Ok(Some(update)) => updates.push(update),
            Ok(None) | Err(_) => break,
        }
    }
    updates
}

/// Publish frames until the source has consumed one
pub async fn feed_frame(source: &mut VideoSource, publisher: &FramePublisher, w: u32, h: u32) {
    publisher.publish(w, h, composite_frame(w, h, [0, 255, 0]));
    drive_until(source, Duration::from_secs(2), |s| !s.raster().is_empty()).await;
}

/// A captured HTTP request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Serve `responses` (status, JSON body) to consecutive connections
///
/// Returns the base address and a receiver of the requests seen.
pub async fn serve_responses(
    responses: Vec<(u16, String)>,
) -> (String, mpsc::UnboundedReceiver<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut stream).await;
            let _ = tx.send(request);

            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (address, rx)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            break;
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let head = text[..split].to_string();
            let body_len = head
                .lines()
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    key.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + body_len {
                let body = String::from_utf8_lossy(&buf[split + 4..split + 4 + body_len]).to_string();
                return RecordedRequest { head, body };
            }
        }
    }
    RecordedRequest {
        head: String::from_utf8_lossy(&buf).to_string(),
        body: String::new(),
    }
}
