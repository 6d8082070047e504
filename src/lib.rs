// SPDX-License-Identifier: GPL-3.0-only

//! RGB-D Stream - live point clouds from a Wi-Fi streamed depth camera
//!
//! A device publishes a composite video (hue-encoded depth on the left half,
//! colour on the right) over a peer-to-peer session negotiated through a small
//! HTTP API. This library negotiates that session, decodes depth, tracks the
//! camera calibration as the stream resolution changes, and produces the
//! buffers a renderer needs to draw the scene as points, a mesh or spheres.
//!
//! # Architecture
//!
//! - [`signaling`]: offer/answer/metadata HTTP client and the session state machine
//! - [`backends`]: peer transports and media sources producing RGBA frames
//! - [`video`]: the video source, its frame loop and teardown
//! - [`depth`] / [`calibration`]: hue decoding and (un)projection math
//! - [`pipelines`]: geometry, material and scene
//! - [`presets`] / [`storage`] / [`config`]: persisted viewer state

pub mod backends;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod depth;
pub mod errors;
pub mod pipelines;
pub mod presets;
pub mod signaling;
pub mod storage;
pub mod video;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipelines::{PointCloudVideo, RenderingMode, Scene};
pub use signaling::{HttpSignalingClient, SignalingSession};
pub use video::{Lifecycle, VideoSource};
