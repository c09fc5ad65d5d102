// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Error paths of POST /embeddings.
//!
//! Requests rejected before parsing never reach the engine. Requests that
//! reach it always release the engine memory, whatever status they get.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use std::io;

use tower::ServiceExt; // for `oneshot`
use txtvec::api::{create_app, write_embeddings, AppState, ErrorResponse};
use txtvec::config::DEFAULT_MAX_BODY_BYTES;

use crate::common::CallCounter;

fn request(method: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/embeddings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

struct FailingWriter;

impl io::Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, ErrorResponse) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    (status, error)
}

#[tokio::test]
async fn test_non_post_methods_are_rejected() {
    let counter = CallCounter::start();

    for method in ["GET", "PUT", "DELETE", "PATCH"] {
        let app = create_app(AppState::new(counter.engine(), DEFAULT_MAX_BODY_BYTES));
        let (status, error) = send(app, request(method, r#"["a"]"#)).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(error.error_type, "method_not_allowed");
        assert!(error.message.contains(method));
    }

    assert_eq!(counter.processed(), 0);
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() {
    let counter = CallCounter::start();

    for body in [
        r#""not-an-array""#,
        r#"{"texts":["a"]}"#,
        r#"[1, 2, 3]"#,
        r#"["a", null]"#,
        r#"["unterminated"#,
        "",
    ] {
        let app = create_app(AppState::new(counter.engine(), DEFAULT_MAX_BODY_BYTES));
        let (status, error) = send(app, request("POST", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(error.error_type, "invalid_request");
    }

    assert_eq!(counter.processed(), 0);
    assert_eq!(counter.freed(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let counter = CallCounter::start();
    let app = create_app(AppState::new(counter.engine(), 16));

    let body = serde_json::to_vec(&["this body is longer than sixteen bytes"]).unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/embeddings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let (status, error) = send(app, req).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error.error_type, "payload_too_large");
    assert_eq!(
        error.details.unwrap().get("limit_bytes"),
        Some(&serde_json::json!(16))
    );
    assert_eq!(counter.processed(), 0);
}

#[tokio::test]
async fn test_short_engine_output_is_internal_error_and_released() {
    let counter = CallCounter::start();
    let app = create_app(AppState::new(counter.short_engine(), DEFAULT_MAX_BODY_BYTES));

    let (status, error) = send(app, request("POST", r#"["a","b","c"]"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error.error_type, "internal_error");
    assert!(error.message.contains("2 vectors for 3 inputs"));
    assert_eq!(counter.processed(), 1);
    assert_eq!(counter.freed(), 1);
}

#[tokio::test]
async fn test_error_does_not_affect_next_request() {
    let counter = CallCounter::start();
    let app = create_app(AppState::new(counter.engine(), DEFAULT_MAX_BODY_BYTES));

    let (status, _) = send(app.clone(), request("POST", "oops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app.oneshot(request("POST", r#"["fine"]"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(counter.freed(), 1);
}

#[tokio::test]
async fn test_non_finite_vectors_are_internal_error_and_released() {
    let counter = CallCounter::start();
    let app = create_app(AppState::new(counter.nan_engine(), DEFAULT_MAX_BODY_BYTES));

    let (status, error) = send(app, request("POST", r#"["a","b"]"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error.error_type, "internal_error");
    assert!(error.message.contains("non-finite"), "{}", error.message);
    assert_eq!(counter.processed(), 1);
    assert_eq!(counter.freed(), 1);
}

#[test]
fn test_failed_write_still_releases_once() {
    let counter = CallCounter::start();
    let texts = vec!["a".to_string(), "b".to_string()];

    let err = write_embeddings(&counter.engine(), &texts, FailingWriter).unwrap_err();

    assert_eq!(err.status_code(), 500);
    assert_eq!(counter.processed(), 1);
    assert_eq!(counter.freed(), 1);
}

#[test]
fn test_non_finite_write_leaves_body_incomplete_and_releases() {
    let counter = CallCounter::start();
    let texts = vec!["a".to_string()];
    let mut body = Vec::new();

    let err = write_embeddings(&counter.nan_engine(), &texts, &mut body).unwrap_err();

    assert_eq!(err.status_code(), 500);
    assert!(serde_json::from_slice::<Vec<Vec<f32>>>(&body).is_err());
    assert_eq!(counter.freed(), 1);
}
