// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use tracing::info;
use txtvec::{
    api::{start_server, AppState},
    config::{BackendKind, ServiceConfig},
    engine::{self, HashEmbedder, OnnxEmbeddingModel},
    ffi::{self, NativeEngine},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::parse();
    config.validate()?;

    info!(
        version = txtvec::version::VERSION,
        abi = txtvec::version::ENGINE_ABI_VERSION,
        "starting txtvec"
    );

    let engine = NativeEngine::builtin();

    // Model loading and the warm-up call both block on native code.
    let startup = config.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        install_backend(&startup)?;

        if !startup.skip_warmup {
            info!("loading the model...");
            let warmup = ffi::create_embeddings(&engine, &["hello"]);
            info!(dimension = ?warmup.uniform_dimension(), "model loaded");
        }
        Ok(())
    })
    .await
    .context("startup task panicked")??;

    start_server(
        config.socket_addr(),
        AppState::new(engine, config.max_body_bytes),
    )
    .await
}

fn install_backend(config: &ServiceConfig) -> Result<()> {
    match config.backend {
        BackendKind::Hash => {
            engine::install(HashEmbedder::new(config.dimension, config.normalize())?)?;
        }
        BackendKind::Onnx => {
            let model = match (&config.model_path, &config.tokenizer_path) {
                (Some(model_path), Some(tokenizer_path)) => OnnxEmbeddingModel::new(
                    model_path.display().to_string(),
                    model_path,
                    tokenizer_path,
                    config.max_seq_length,
                    config.normalize(),
                )?,
                _ => OnnxEmbeddingModel::from_hub(
                    &config.hf_model_id,
                    &config.hf_revision,
                    config.max_seq_length,
                    config.normalize(),
                )?,
            };
            engine::install(model)?;
        }
    }
    Ok(())
}
