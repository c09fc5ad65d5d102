// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Service configuration.
//!
//! Every flag can also be set through its environment variable, and a `.env`
//! file in the working directory is loaded before parsing.

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::onnx_model::DEFAULT_MAX_LENGTH;

pub const DEFAULT_HF_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--dimension must be greater than 0")]
    ZeroDimension,

    #[error("--max-body-bytes must be greater than 0")]
    ZeroBodyLimit,

    #[error("--max-seq-length must be greater than 0")]
    ZeroSequenceLength,

    #[error("--model-path and --tokenizer-path must be given together")]
    IncompleteModelPaths,
}

/// Which engine backend to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Deterministic hash-seeded vectors; needs no model files
    Hash,
    /// ONNX Runtime sentence transformer
    Onnx,
}

/// txtvec embedding service
#[derive(Parser, Debug, Clone)]
#[command(name = "txtvec")]
#[command(version)]
#[command(about = "Serves text embeddings computed by a native vector engine", long_about = None)]
pub struct ServiceConfig {
    /// Address to bind
    #[arg(long, env = "TXTVEC_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind
    #[arg(long, env = "TXTVEC_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "TXTVEC_BACKEND", value_enum, default_value = "hash")]
    pub backend: BackendKind,

    /// Local ONNX model file (onnx backend)
    #[arg(long, env = "TXTVEC_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Local tokenizer.json (onnx backend)
    #[arg(long, env = "TXTVEC_TOKENIZER_PATH")]
    pub tokenizer_path: Option<PathBuf>,

    /// Hub repository used when no local model paths are given
    #[arg(long, env = "TXTVEC_HF_MODEL_ID", default_value = DEFAULT_HF_MODEL_ID)]
    pub hf_model_id: String,

    #[arg(long, env = "TXTVEC_HF_REVISION", default_value = "main")]
    pub hf_revision: String,

    /// Vector length (hash backend)
    #[arg(long, env = "TXTVEC_DIMENSION", default_value_t = 384)]
    pub dimension: usize,

    /// Tokens kept per input (onnx backend); longer inputs are truncated
    #[arg(long, env = "TXTVEC_MAX_SEQ_LENGTH", default_value_t = DEFAULT_MAX_LENGTH)]
    pub max_seq_length: usize,

    /// Return raw pooled vectors instead of unit-length ones
    #[arg(long, env = "TXTVEC_NO_NORMALIZE")]
    pub no_normalize: bool,

    /// Largest accepted request body
    #[arg(long, env = "TXTVEC_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Skip the startup embedding call
    #[arg(long, env = "TXTVEC_SKIP_WARMUP")]
    pub skip_warmup: bool,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        if self.max_seq_length == 0 {
            return Err(ConfigError::ZeroSequenceLength);
        }
        if self.backend == BackendKind::Onnx
            && self.model_path.is_some() != self.tokenizer_path.is_some()
        {
            return Err(ConfigError::IncompleteModelPaths);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn normalize(&self) -> bool {
        !self.no_normalize
    }
}
