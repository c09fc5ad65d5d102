// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod engine;
pub mod ffi;
pub mod version;

pub use api::{create_app, start_server, ApiError, AppState};
pub use config::{BackendKind, ServiceConfig};
pub use engine::{EmbeddingBackend, EngineError, HashEmbedder, OnnxEmbeddingModel};
pub use ffi::{
    create_embeddings, create_embeddings_zero_copy, EmbeddingResult, NativeEngine, Ownership,
    ReleaseToken,
};
