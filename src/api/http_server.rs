// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get},
    Json, Router,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{embed_handler, ApiError};
use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::engine;
use crate::ffi::NativeEngine;

/// Shared by every request. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: NativeEngine,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: NativeEngine, max_body_bytes: usize) -> Self {
        Self {
            engine,
            max_body_bytes,
        }
    }

    /// Builtin engine with the default body limit.
    pub fn new_for_test() -> Self {
        Self::new(NativeEngine::builtin(), DEFAULT_MAX_BODY_BYTES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub dimension: usize,
}

pub fn create_app(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        // Every method is routed to the handler, which answers 405 itself
        .route("/embeddings", any(embed_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, "serving /embeddings");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("server stopped");
    Ok(())
}

async fn health_handler() -> Result<Json<HealthResponse>, ApiError> {
    let backend = engine::installed().ok_or_else(|| {
        ApiError::ServiceUnavailable("no embedding backend installed".to_string())
    })?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::version::VERSION.to_string(),
        backend: backend.name().to_string(),
        dimension: backend.dimension(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
