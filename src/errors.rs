// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the streaming pipeline
//!
//! Network and session failures are never retried automatically. They are
//! logged where they happen and recorded on the session so callers (and tests)
//! can inspect what went wrong before calling `connect()` again.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Signaling / peer transport errors
    Connection(ConnectionError),
    /// Calibration metadata errors
    Metadata(MetadataError),
    /// Media decoding / pipeline errors
    Media(MediaError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised while establishing or running a peer session
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// `GET /getOffer` failed or returned something that is not an offer
    OfferUnavailable(String),
    /// Applying the offer or producing the local answer failed
    Negotiation(String),
    /// `POST /answer` failed
    AnswerFailed(String),
    /// The session was closed while the operation was in flight
    Closed,
    /// The peer transport could not be created
    Transport(String),
}

/// Errors raised while retrieving or parsing calibration metadata
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataError {
    /// The metadata endpoint could not be reached
    Unavailable(String),
    /// The payload is not valid metadata
    Malformed(String),
}

/// Media decoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Backend pipeline error (e.g., GStreamer)
    Pipeline(String),
    /// Frame layout the pipeline cannot consume
    UnsupportedFormat(String),
    /// No media backend compiled in
    BackendUnavailable,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Connection(e) => write!(f, "Connection error: {}", e),
            AppError::Metadata(e) => write!(f, "Metadata error: {}", e),
            AppError::Media(e) => write!(f, "Media error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::OfferUnavailable(msg) => {
                write!(f, "Could not retrieve an offer from the device: {}", msg)
            }
            ConnectionError::Negotiation(msg) => write!(f, "Session negotiation failed: {}", msg),
            ConnectionError::AnswerFailed(msg) => write!(f, "Failed to send the answer: {}", msg),
            ConnectionError::Closed => write!(f, "Session closed"),
            ConnectionError::Transport(msg) => write!(f, "Peer transport unavailable: {}", msg),
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Unavailable(msg) => {
                write!(f, "Could not retrieve the intrinsic matrix: {}", msg)
            }
            MetadataError::Malformed(msg) => write!(f, "Malformed metadata: {}", msg),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Pipeline(msg) => write!(f, "Pipeline error: {}", msg),
            MediaError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            MediaError::BackendUnavailable => {
                write!(f, "Built without a media backend (enable the `gstreamer` feature)")
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for MetadataError {}
impl std::error::Error for MediaError {}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        AppError::Connection(err)
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        AppError::Metadata(err)
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        AppError::Media(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        MetadataError::Malformed(err.to_string())
    }
}

impl From<MediaError> for ConnectionError {
    fn from(err: MediaError) -> Self {
        ConnectionError::Transport(err.to_string())
    }
}
