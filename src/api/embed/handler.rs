// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! `/embeddings` HTTP handler
//!
//! Per request:
//! 1. reject anything but POST before the body is read (405)
//! 2. read and parse the body as a JSON string array (413 / 400)
//! 3. embed in zero-copy mode on a blocking thread
//! 4. serialize straight from engine memory (500 on failure)
//! 5. release the engine memory, whichever way step 4 went
//!
//! Malformed requests never reach the engine.

use std::io;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::api::embed::EmbedRequest;
use crate::api::http_server::AppState;
use crate::api::ApiError;
use crate::ffi::{self, NativeEngine};

/// Handles every method on `/embeddings`; only POST is served.
///
/// # Request Body
/// ```json
/// ["first text", "second text"]
/// ```
///
/// # Response Body
/// ```json
/// [[0.01, -0.2, ...], [0.3, 0.04, ...]]
/// ```
pub async fn embed_handler(State(state): State<AppState>, request: Request) -> Response {
    match embed(state, request).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            if e.status_code() >= 500 {
                error!(error = %e, "embedding request failed");
            } else {
                warn!(error = %e, "embedding request rejected");
            }
            e.into_response()
        }
    }
}

async fn embed(state: AppState, request: Request) -> Result<Vec<u8>, ApiError> {
    if request.method() != Method::POST {
        return Err(ApiError::MethodNotAllowed(format!(
            "{} is not supported, use POST",
            request.method()
        )));
    }

    let body = Bytes::from_request(request, &state)
        .await
        .map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge {
                    limit: state.max_body_bytes,
                }
            } else {
                ApiError::InvalidRequest(rejection.body_text())
            }
        })?;

    let EmbedRequest { texts } = EmbedRequest::from_json(&body)?;
    debug!(count = texts.len(), "embedding batch");

    let engine = state.engine;
    tokio::task::spawn_blocking(move || render_embeddings(&engine, &texts))
        .await
        .map_err(|e| ApiError::InternalError(format!("embedding task failed: {}", e)))?
}

fn render_embeddings(engine: &NativeEngine, texts: &[String]) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    write_embeddings(engine, texts, &mut body)?;
    Ok(body)
}

/// Embeds `texts` in zero-copy mode and writes them to `out` as JSON.
///
/// A vector holding NaN or an infinity cannot be written as JSON numbers and
/// fails the request with `InternalError`.
///
/// Engine memory is released before this returns, on success and on every
/// error path.
pub fn write_embeddings<W: io::Write>(
    engine: &NativeEngine,
    texts: &[String],
    out: W,
) -> Result<(), ApiError> {
    let token = ffi::create_embeddings_zero_copy(engine, texts);

    {
        let embeddings = token.view();

        if embeddings.len() != texts.len() {
            return Err(ApiError::InternalError(format!(
                "engine returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }
        if !embeddings.is_empty() && embeddings.uniform_dimension().is_none() {
            warn!(count = embeddings.len(), "engine returned vectors of differing lengths");
        }

        serde_json::to_writer(out, &embeddings).map_err(|e| {
            ApiError::InternalError(format!("failed to encode embeddings: {}", e))
        })?;
    }

    token.release();
    Ok(())
}
