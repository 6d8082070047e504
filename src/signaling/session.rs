// SPDX-License-Identifier: GPL-3.0-only

//! Peer session lifecycle
//!
//! ```text
//! Idle ──connect()──▶ Connecting ──answer sent──▶ Negotiating ──track──▶ Streaming
//!   ▲                     │                                                 │
//!   └──offer failed───────┘            disconnect() from any state ──▶ Closed
//! ```
//!
//! At most one peer link exists at a time. `connect()` force-closes the
//! previous link before creating a new one, and every link carries its own
//! event channels, so results of an abandoned negotiation can never reach the
//! session that replaced it.

use super::client::{AnswerMessage, SignalingApi};
use crate::backends::{MediaTrack, PeerTransport, TransportFactory};
use crate::errors::ConnectionError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Offer requested, answer not yet sent
    Connecting,
    /// Answer sent, awaiting the remote track
    Negotiating,
    /// Remote track attached
    Streaming,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Negotiating => write!(f, "negotiating"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Identifies one connection attempt; bumped by every `connect()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionToken(pub u64);

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something the owner of a session has to react to
#[derive(Debug)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A remote video track arrived; calibration should be fetched now
    TrackAttached(MediaTrack),
    Error(ConnectionError),
}

#[derive(Debug)]
enum NegotiationEvent {
    AnswerSent,
    AnswerFailed(ConnectionError),
    Failed(ConnectionError),
}

struct PeerLink {
    token: SessionToken,
    transport: Arc<dyn PeerTransport>,
    client: Arc<dyn SignalingApi>,
    negotiation: JoinHandle<()>,
    events: mpsc::UnboundedReceiver<NegotiationEvent>,
    tracks: mpsc::UnboundedReceiver<MediaTrack>,
}

impl PeerLink {
    fn close(self) {
        self.negotiation.abort();
        self.transport.close();
        debug!(token = %self.token, "Peer link closed");
    }
}

enum Incoming {
    Negotiation(NegotiationEvent),
    Track(MediaTrack),
}

pub struct SignalingSession {
    api: Arc<dyn SignalingApi>,
    transports: Arc<dyn TransportFactory>,
    state: SessionState,
    token: SessionToken,
    link: Option<PeerLink>,
    last_error: Option<ConnectionError>,
}

impl SignalingSession {
    pub fn new(api: Arc<dyn SignalingApi>, transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            api,
            transports,
            state: SessionState::Idle,
            token: SessionToken::default(),
            link: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token of the most recent connection attempt
    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn peer_address(&self) -> &str {
        self.api.peer_address()
    }

    pub fn api(&self) -> Arc<dyn SignalingApi> {
        self.api.clone()
    }

    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    pub fn active_transport(&self) -> Option<&Arc<dyn PeerTransport>> {
        self.link.as_ref().map(|link| &link.transport)
    }

    pub fn signaling_client(&self) -> Option<&Arc<dyn SignalingApi>> {
        self.link.as_ref().map(|link| &link.client)
    }

    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    /// Whether `token` still identifies the live connection attempt
    pub fn is_current(&self, token: SessionToken) -> bool {
        self.link.as_ref().is_some_and(|link| link.token == token)
    }

    /// Start a new connection attempt
    ///
    /// Force-closes any existing link first. Negotiation runs as a task on the
    /// current tokio runtime; progress is reported through [`Self::next_event`].
    /// Failures are logged and recorded, never retried.
    pub fn connect(&mut self) -> Result<SessionToken, ConnectionError> {
        self.close_link();
        self.token = SessionToken(self.token.0 + 1);
        let token = self.token;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| self.fail(ConnectionError::Transport(e.to_string())))?;

        let (track_tx, tracks) = mpsc::unbounded_channel();
        let transport = self
            .transports
            .create(track_tx)
            .map_err(|e| self.fail(e.into()))?;

        let (event_tx, events) = mpsc::unbounded_channel();
        let negotiation = runtime.spawn(negotiate(
            self.api.clone(),
            transport.clone(),
            event_tx,
        ));

        self.link = Some(PeerLink {
            token,
            transport,
            client: self.api.clone(),
            negotiation,
            events,
            tracks,
        });
        self.last_error = None;
        self.state = SessionState::Connecting;

        info!(peer = %self.api.peer_address(), token = %token, "Connecting to device");
        Ok(token)
    }

    /// Close the peer link and drop the signaling client. Idempotent.
    pub fn disconnect(&mut self) {
        if self.close_link() {
            info!(peer = %self.api.peer_address(), token = %self.token, "Disconnected");
        }
        self.state = SessionState::Closed;
    }

    fn close_link(&mut self) -> bool {
        match self.link.take() {
            Some(link) => {
                link.close();
                true
            }
            None => false,
        }
    }

    fn fail(&mut self, err: ConnectionError) -> ConnectionError {
        warn!(peer = %self.api.peer_address(), error = %err, "Connection attempt failed");
        self.state = SessionState::Idle;
        self.last_error = Some(err.clone());
        err
    }

    /// Wait for the next event of the live link
    ///
    /// Returns None right away when there is no link or the link has nothing
    /// more to report.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let link = self.link.as_mut()?;
            let incoming = tokio::select! {
                Some(event) = link.events.recv() => Incoming::Negotiation(event),
                Some(track) = link.tracks.recv() => Incoming::Track(track),
                else => return None,
            };
            if let Some(event) = self.apply(incoming) {
                return Some(event);
            }
        }
    }

    /// Drain pending events without waiting
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        loop {
            let Some(link) = self.link.as_mut() else {
                break;
            };
            let incoming = if let Ok(event) = link.events.try_recv() {
                Incoming::Negotiation(event)
            } else if let Ok(track) = link.tracks.try_recv() {
                Incoming::Track(track)
            } else {
                break;
            };
            out.extend(self.apply(incoming));
        }
        out
    }

    fn apply(&mut self, incoming: Incoming) -> Option<SessionEvent> {
        match incoming {
            Incoming::Negotiation(NegotiationEvent::AnswerSent) => self.advance(SessionState::Negotiating),
            Incoming::Negotiation(NegotiationEvent::AnswerFailed(err)) => {
                // Fire-and-forget: the device may still start streaming
                self.last_error = Some(err.clone());
                self.advance(SessionState::Negotiating);
                Some(SessionEvent::Error(err))
            }
            Incoming::Negotiation(NegotiationEvent::Failed(err)) => {
                self.close_link();
                self.fail(err.clone());
                Some(SessionEvent::Error(err))
            }
            Incoming::Track(track) => {
                info!(peer = %self.api.peer_address(), track = %track.id, "Remote track arrived");
                self.state = SessionState::Streaming;
                Some(SessionEvent::TrackAttached(track))
            }
        }
    }

    /// Move forward to `next`; a late answer never demotes a streaming session
    fn advance(&mut self, next: SessionState) -> Option<SessionEvent> {
        if self.state == SessionState::Streaming || self.state == next {
            return None;
        }
        debug!(from = %self.state, to = %next, "Session state changed");
        self.state = next;
        Some(SessionEvent::StateChanged(next))
    }
}

impl Drop for SignalingSession {
    fn drop(&mut self) {
        self.close_link();
    }
}

/// Offer → local answer → `POST /answer`
async fn negotiate(
    api: Arc<dyn SignalingApi>,
    transport: Arc<dyn PeerTransport>,
    events: mpsc::UnboundedSender<NegotiationEvent>,
) {
    let answer = async {
        let offer = api.retrieve_offer().await?;
        transport.accept_offer(offer).await
    }
    .await;

    let event = match answer {
        Ok(answer) => match api.send_answer(AnswerMessage::from(answer)).await {
            Ok(()) => NegotiationEvent::AnswerSent,
            Err(e) => NegotiationEvent::AnswerFailed(e),
        },
        Err(e) => NegotiationEvent::Failed(e),
    };
    let _ = events.send(event);
}
