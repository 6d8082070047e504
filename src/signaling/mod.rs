// SPDX-License-Identifier: GPL-3.0-only

//! Signaling with the streaming device
//!
//! - [`client`]: the HTTP endpoints (`/getOffer`, `/answer`, `/metadata`)
//! - [`session`]: the connect/negotiate/stream/close state machine

pub mod client;
pub mod session;

pub use client::{
    AnswerMessage, HttpSignalingClient, SdpKind, SessionDescription, SignalingApi, StreamMetadata,
};
pub use session::{SessionEvent, SessionState, SessionToken, SignalingSession};
