// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Native Embedding Engine
//!
//! The vector-computation engine that sits on the far side of the foreign
//! boundary. Host code never calls into this module directly: it reaches the
//! engine only through the `extern "C"` exports in [`abi`], the same way an
//! out-of-process consumer linking the cdylib would.
//!
//! A process has exactly one engine backend, installed once at startup with
//! [`install`]. Backends must be safe to call concurrently and must return
//! bit-identical output for identical input.

pub mod abi;
pub mod hash_embedder;
pub mod onnx_model;

pub use abi::{
    txtvec_abi_version, txtvec_free_matrix, txtvec_process_strings, FloatArray, FloatArrayArray,
};
pub use hash_embedder::HashEmbedder;
pub use onnx_model::OnnxEmbeddingModel;

use std::sync::OnceLock;
use thiserror::Error;
use tracing::info;

/// Errors raised inside the engine.
///
/// Only `AlreadyInstalled` and `InvalidConfig` are ever seen by host code.
/// Everything raised while serving a boundary call is fatal to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("an embedding backend is already installed: {existing}")]
    AlreadyInstalled { existing: String },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// A batch embedding model.
pub trait EmbeddingBackend: Send + Sync {
    /// Embeds `texts`, returning exactly one vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EngineError>;

    /// Length of every vector this backend produces.
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

static BACKEND: OnceLock<Box<dyn EmbeddingBackend>> = OnceLock::new();

/// Installs the process-wide backend used by [`txtvec_process_strings`].
///
/// Can succeed only once per process.
pub fn install<B: EmbeddingBackend + 'static>(backend: B) -> Result<(), EngineError> {
    let name = backend.name().to_string();
    let dimension = backend.dimension();

    BACKEND
        .set(Box::new(backend))
        .map_err(|_| EngineError::AlreadyInstalled {
            existing: installed()
                .map(|b| b.name().to_string())
                .unwrap_or_default(),
        })?;

    info!(backend = %name, dimension, "embedding backend installed");
    Ok(())
}

/// Returns the installed backend, if any.
pub fn installed() -> Option<&'static dyn EmbeddingBackend> {
    BACKEND.get().map(|b| b.as_ref())
}

#[cfg(test)]
pub(crate) const TEST_DIMENSION: usize = 32;

/// Installs the hash backend used by every unit test in this crate.
#[cfg(test)]
pub(crate) fn install_for_tests() -> &'static dyn EmbeddingBackend {
    let backend = HashEmbedder::new(TEST_DIMENSION, true).expect("valid test dimension");
    let _ = install(backend);
    installed().expect("backend installed")
}
