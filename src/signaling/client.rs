// SPDX-License-Identifier: GPL-3.0-only

//! HTTP signaling client for the streaming device
//!
//! The device exposes three endpoints next to its media server:
//!
//! - `GET  /getOffer`  returns the remote SDP offer (`{type, sdp}`)
//! - `POST /answer`    receives `{type: "answer", data: <sdp>}`
//! - `GET  /metadata`  returns the calibration (`{K: [9], originalSize?: [w, h]}`)
//!
//! Every failure is logged as a warning and returned as a typed error. Nothing
//! here retries.

use crate::calibration::OriginalSize;
use crate::constants::signaling::{ANSWER_PATH, METADATA_PATH, OFFER_PATH, REQUEST_TIMEOUT};
use crate::errors::{ConnectionError, MetadataError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// SDP message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description as exchanged with the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Body of `POST /answer`; the device expects the SDP under `data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMessage {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub data: String,
}

impl From<SessionDescription> for AnswerMessage {
    fn from(desc: SessionDescription) -> Self {
        Self {
            kind: SdpKind::Answer,
            data: desc.sdp,
        }
    }
}

/// Calibration metadata reported by the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamMetadata {
    /// Raw intrinsic matrix, column-major
    pub k: [f32; 9],
    pub original_size: Option<OriginalSize>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(rename = "K")]
    k: Vec<f32>,
    /// Some devices send the size as floats (`[640.0, 480.0]`)
    #[serde(rename = "originalSize", default)]
    original_size: Option<Vec<f64>>,
}

impl StreamMetadata {
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_str(json)?;
        raw.try_into()
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_value(value)?;
        raw.try_into()
    }
}

impl TryFrom<RawMetadata> for StreamMetadata {
    type Error = MetadataError;

    fn try_from(raw: RawMetadata) -> Result<Self, Self::Error> {
        let k: [f32; 9] = raw.k.as_slice().try_into().map_err(|_| {
            MetadataError::Malformed(format!("K holds {} values, expected 9", raw.k.len()))
        })?;

        let original_size = match raw.original_size.as_deref() {
            None => None,
            Some(&[width, height]) => Some(OriginalSize {
                width: pixel_count(width)?,
                height: pixel_count(height)?,
            }),
            Some(other) => {
                return Err(MetadataError::Malformed(format!(
                    "originalSize holds {} values, expected 2",
                    other.len()
                )));
            }
        };

        Ok(Self { k, original_size })
    }
}

fn pixel_count(value: f64) -> Result<u32, MetadataError> {
    if value.is_finite() && (0.0..=u32::MAX as f64).contains(&value) {
        Ok(value.round() as u32)
    } else {
        Err(MetadataError::Malformed(format!(
            "originalSize value {} is not a pixel count",
            value
        )))
    }
}

/// The device's signaling surface
///
/// Implemented over HTTP by [`HttpSignalingClient`]; tests substitute an
/// in-process fake.
pub trait SignalingApi: Send + Sync {
    /// Base address of the device, e.g. `http://192.168.0.18`
    fn peer_address(&self) -> &str;

    fn retrieve_offer(&self) -> BoxFuture<'static, Result<SessionDescription, ConnectionError>>;

    fn send_answer(&self, answer: AnswerMessage) -> BoxFuture<'static, Result<(), ConnectionError>>;

    fn get_metadata(&self) -> BoxFuture<'static, Result<StreamMetadata, MetadataError>>;
}

/// `reqwest`-backed signaling client
#[derive(Debug, Clone)]
pub struct HttpSignalingClient {
    peer_address: String,
    http: reqwest::Client,
}

impl HttpSignalingClient {
    pub fn new(peer_address: impl Into<String>) -> Result<Self, ConnectionError> {
        Self::with_timeout(peer_address, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        peer_address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        Ok(Self {
            peer_address: peer_address.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.peer_address, path)
    }
}

impl SignalingApi for HttpSignalingClient {
    fn peer_address(&self) -> &str {
        &self.peer_address
    }

    fn retrieve_offer(&self) -> BoxFuture<'static, Result<SessionDescription, ConnectionError>> {
        let http = self.http.clone();
        let url = self.endpoint(OFFER_PATH);

        Box::pin(async move {
            let result = async {
                let response = http.get(&url).send().await?.error_for_status()?;
                response.json::<SessionDescription>().await
            }
            .await;

            match result {
                Ok(offer) => {
                    debug!(url = %url, kind = ?offer.kind, "Received remote offer");
                    Ok(offer)
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Error while requesting an offer");
                    Err(ConnectionError::OfferUnavailable(e.to_string()))
                }
            }
        })
    }

    fn send_answer(&self, answer: AnswerMessage) -> BoxFuture<'static, Result<(), ConnectionError>> {
        let http = self.http.clone();
        let url = self.endpoint(ANSWER_PATH);

        Box::pin(async move {
            // `.json()` also sets Content-Type: application/json
            let result = http
                .post(&url)
                .json(&answer)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(_) => {
                    debug!(url = %url, "Answer delivered");
                    Ok(())
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Error while sending the answer");
                    Err(ConnectionError::AnswerFailed(e.to_string()))
                }
            }
        })
    }

    fn get_metadata(&self) -> BoxFuture<'static, Result<StreamMetadata, MetadataError>> {
        let http = self.http.clone();
        let url = self.endpoint(METADATA_PATH);

        Box::pin(async move {
            let body = async {
                let response = http.get(&url).send().await?.error_for_status()?;
                response.text().await
            }
            .await
            .map_err(|e| MetadataError::Unavailable(e.to_string()));

            let result = body.and_then(|text| StreamMetadata::from_json(&text));
            if let Err(e) = &result {
                warn!(url = %url, error = %e, "Could not retrieve the intrinsic matrix");
            }
            result
        })
    }
}
