// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the HTTP signaling client against a local responder

mod common;

use common::serve_responses;
use rgbd_stream::HttpSignalingClient;
use rgbd_stream::calibration::OriginalSize;
use rgbd_stream::errors::{ConnectionError, MetadataError};
use rgbd_stream::signaling::{AnswerMessage, SdpKind, SessionDescription, SignalingApi};
use std::time::Duration;

#[tokio::test]
async fn test_offer_is_fetched() {
    let (address, mut requests) =
        serve_responses(vec![(200, r#"{"type":"offer","sdp":"v=0\r\n"}"#.to_string())]).await;
    let client = HttpSignalingClient::new(&address).unwrap();

    let offer = client.retrieve_offer().await.unwrap();
    assert_eq!(offer.kind, SdpKind::Offer);
    assert_eq!(offer.sdp, "v=0\r\n");

    let request = requests.recv().await.unwrap();
    assert!(request.request_line().starts_with("GET /getOffer "));
}

#[tokio::test]
async fn test_offer_http_error() {
    let (address, _requests) = serve_responses(vec![(500, "{}".to_string())]).await;
    let client = HttpSignalingClient::new(&address).unwrap();

    assert!(matches!(
        client.retrieve_offer().await,
        Err(ConnectionError::OfferUnavailable(_))
    ));
}

#[tokio::test]
async fn test_malformed_offer() {
    let (address, _requests) = serve_responses(vec![(200, "not json".to_string())]).await;
    let client = HttpSignalingClient::new(&address).unwrap();

    assert!(matches!(
        client.retrieve_offer().await,
        Err(ConnectionError::OfferUnavailable(_))
    ));
}

#[tokio::test]
async fn test_answer_is_posted_as_json() {
    let (address, mut requests) = serve_responses(vec![(200, "{}".to_string())]).await;
    let client = HttpSignalingClient::new(format!("{}/", address)).unwrap();

    let answer = AnswerMessage::from(SessionDescription::answer("v=0 answer"));
    client.send_answer(answer).await.unwrap();

    let request = requests.recv().await.unwrap();
    assert!(request.request_line().starts_with("POST /answer "));
    assert_eq!(request.header("content-type").as_deref(), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body, serde_json::json!({"type": "answer", "data": "v=0 answer"}));
}

#[tokio::test]
async fn test_answer_failure() {
    let (address, _requests) = serve_responses(vec![(503, "{}".to_string())]).await;
    let client = HttpSignalingClient::new(&address).unwrap();

    let answer = AnswerMessage::from(SessionDescription::answer("v=0"));
    assert!(matches!(
        client.send_answer(answer).await,
        Err(ConnectionError::AnswerFailed(_))
    ));
}

#[tokio::test]
async fn test_metadata_is_parsed() {
    let (address, mut requests) = serve_responses(vec![(
        200,
        r#"{"K":[500,0,0,0,500,0,320,240,1],"originalSize":[640,480]}"#.to_string(),
    )])
    .await;
    let client = HttpSignalingClient::new(&address).unwrap();

    let metadata = client.get_metadata().await.unwrap();
    assert_eq!(metadata.k[7], 240.0);
    assert_eq!(
        metadata.original_size,
        Some(OriginalSize {
            width: 640,
            height: 480
        })
    );
    let request = requests.recv().await.unwrap();
    assert!(request.request_line().starts_with("GET /metadata "));
}

#[tokio::test]
async fn test_metadata_errors() {
    let (address, _requests) = serve_responses(vec![
        (200, r#"{"K":[1,2,3]}"#.to_string()),
        (404, "{}".to_string()),
    ])
    .await;
    let client = HttpSignalingClient::new(&address).unwrap();

    assert!(matches!(
        client.get_metadata().await,
        Err(MetadataError::Malformed(_))
    ));
    assert!(matches!(
        client.get_metadata().await,
        Err(MetadataError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_device() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = HttpSignalingClient::with_timeout(&address, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.get_metadata().await,
        Err(MetadataError::Unavailable(_))
    ));
    assert!(matches!(
        client.retrieve_offer().await,
        Err(ConnectionError::OfferUnavailable(_))
    ));
}
