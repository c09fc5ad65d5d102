// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Backend
//!
//! Wraps ONNX Runtime to run a sentence transformer (all-MiniLM-L6-v2 by
//! default) behind the engine's C ABI.
//!
//! Features:
//! - Model and tokenizer loading from disk or from the Hugging Face Hub
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - Inputs truncated to `max_length` tokens and padded to the batch longest
//! - Attention-masked mean pooling
//! - Optional L2 normalization of the pooled vectors

use anyhow::{Context, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use ndarray::{Array2, Ix3};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{info, warn};

use super::{EmbeddingBackend, EngineError};

/// ONNX file inside a sentence-transformers Hub repository
pub const HUB_MODEL_FILE: &str = "onnx/model.onnx";
pub const HUB_TOKENIZER_FILE: &str = "tokenizer.json";

/// Token budget per input; longer inputs are truncated
pub const DEFAULT_MAX_LENGTH: usize = 256;

const SAMPLE_TEXT: &str = "validation test";

/// ONNX-based sentence embedding model
///
/// The session is guarded by a mutex because `Session::run` needs exclusive
/// access. Batches are therefore evaluated one at a time, and the same batch
/// always produces the same bits.
pub struct OnnxEmbeddingModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
    dimension: usize,
    max_length: usize,
    normalize: bool,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_length", &self.max_length)
            .field("normalize", &self.normalize)
            .finish_non_exhaustive()
    }
}

/// Tokenized batch, `[batch, seq_len]` each.
struct EncodedBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl OnnxEmbeddingModel {
    /// Loads a model from local `model.onnx` and `tokenizer.json` files.
    ///
    /// The embedding dimension is read from the model's output during a
    /// validation inference.
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - `max_length` is 0
    /// - ONNX Runtime initialization fails
    /// - Model output is not `[batch, seq_len, hidden]`
    pub fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
        max_length: usize,
        normalize: bool,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!(model = %model_name, path = %model_path.display(), max_length, "initializing ONNX embedding model");

        let tokenizer = load_tokenizer(tokenizer_path, max_length)?;
        let mut session = build_session(model_path)?;
        let dimension = measure_dimension(&mut session, &tokenizer)?;

        info!(model = %model_name, dimension, "ONNX embedding model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_name,
            dimension,
            max_length,
            normalize,
        })
    }

    /// Downloads (or reuses the cached copy of) a model from the Hugging Face
    /// Hub and loads it.
    pub fn from_hub(
        model_id: &str,
        revision: &str,
        max_length: usize,
        normalize: bool,
    ) -> Result<Self> {
        let (model_path, tokenizer_path) = fetch_from_hub(model_id, revision)?;
        Self::new(model_id, model_path, tokenizer_path, max_length, normalize)
    }

    /// Generates embeddings for multiple texts in one padded batch.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch = encode_inputs(&self.tokenizer, texts)?;
        let mut embeddings = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
            run_pooled(&mut session, batch)?
        };

        for (i, embedding) in embeddings.iter_mut().enumerate() {
            if embedding.len() != self.dimension {
                anyhow::bail!(
                    "Unexpected embedding dimension at index {}: {} (expected {})",
                    i,
                    embedding.len(),
                    self.dimension
                );
            }
            if self.normalize {
                normalize_l2(embedding);
            }
        }

        Ok(embeddings)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl EmbeddingBackend for OnnxEmbeddingModel {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EngineError> {
        OnnxEmbeddingModel::embed_batch(self, texts)
            .map_err(|e| EngineError::Inference(format!("{:#}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Scales `v` to unit length. Zero vectors are left untouched.
pub fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Loads `tokenizer.json`, truncating to `max_length` tokens and padding each
/// batch to its longest member.
pub fn load_tokenizer(path: &Path, max_length: usize) -> Result<Tokenizer> {
    if max_length == 0 {
        anyhow::bail!("max_length must be greater than 0");
    }

    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));

    Ok(tokenizer)
}

fn encode_inputs(tokenizer: &Tokenizer, texts: &[&str]) -> Result<EncodedBatch> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

    // Padding makes every row the same length
    let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
    let shape = (encodings.len(), seq_len);

    let mut input_ids = Vec::with_capacity(shape.0 * seq_len);
    let mut attention_mask = Vec::with_capacity(shape.0 * seq_len);
    for encoding in &encodings {
        input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
        attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
    }

    Ok(EncodedBatch {
        input_ids: Array2::from_shape_vec(shape, input_ids)
            .context("Failed to create input_ids array")?,
        attention_mask: Array2::from_shape_vec(shape, attention_mask)
            .context("Failed to create attention_mask array")?,
        token_type_ids: Array2::zeros(shape),
    })
}

/// Runs the model and mean-pools token embeddings over the attention mask.
fn run_pooled(session: &mut Session, batch: EncodedBatch) -> Result<Vec<Vec<f32>>> {
    let mask = batch.attention_mask.clone();
    let outputs = session.run(ort::inputs![
        "input_ids" => Value::from_array(batch.input_ids)?,
        "attention_mask" => Value::from_array(batch.attention_mask)?,
        "token_type_ids" => Value::from_array(batch.token_type_ids)?
    ])?;

    // Index [0] rather than a name: output names differ between exports
    let tokens = outputs[0]
        .try_extract_array::<f32>()
        .context("Failed to extract output tensor")?;
    let tokens = tokens
        .into_dimensionality::<Ix3>()
        .context("Model output is not [batch, seq_len, hidden]")?;

    let hidden = tokens.shape()[2];
    let pooled = tokens
        .outer_iter()
        .zip(mask.outer_iter())
        .map(|(item, item_mask)| {
            let mut sum = vec![0.0f32; hidden];
            let mut weight = 0.0f32;
            for (token, &m) in item.outer_iter().zip(item_mask.iter()) {
                if m == 0 {
                    continue;
                }
                weight += 1.0;
                for (acc, &value) in sum.iter_mut().zip(token.iter()) {
                    *acc += value;
                }
            }
            if weight > 0.0 {
                for acc in &mut sum {
                    *acc /= weight;
                }
            }
            sum
        })
        .collect();

    Ok(pooled)
}

/// Hidden size of the model, found by embedding one short text.
fn measure_dimension(session: &mut Session, tokenizer: &Tokenizer) -> Result<usize> {
    let pooled = run_pooled(session, encode_inputs(tokenizer, &[SAMPLE_TEXT])?)
        .context("Validation inference failed")?;

    match pooled.first().map(Vec::len) {
        Some(dimension) if dimension > 0 => Ok(dimension),
        _ => anyhow::bail!("Model produced an empty embedding during validation"),
    }
}

fn build_session(model_path: &Path) -> Result<Session> {
    match session_with(model_path, CUDAExecutionProvider::default().build()) {
        Ok(session) => {
            info!("CUDA execution provider initialized");
            Ok(session)
        }
        Err(e) => {
            warn!(error = %e, "CUDA execution provider failed, falling back to CPU");
            session_with(model_path, CPUExecutionProvider::default().build())
        }
    }
}

fn session_with(model_path: &Path, provider: ExecutionProviderDispatch) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([provider])
        .context("Failed to set execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(4)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))
}

fn fetch_from_hub(model_id: &str, revision: &str) -> Result<(PathBuf, PathBuf)> {
    info!(model_id, revision, "fetching embedding model from Hugging Face Hub");

    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
    let api = Api::new()
        .context("Failed to create Hugging Face Hub client")?
        .repo(repo);

    let model_path = api
        .get(HUB_MODEL_FILE)
        .with_context(|| format!("Failed to fetch {} from {}", HUB_MODEL_FILE, model_id))?;
    let tokenizer_path = api
        .get(HUB_TOKENIZER_FILE)
        .with_context(|| format!("Failed to fetch {} from {}", HUB_TOKENIZER_FILE, model_id))?;

    Ok((model_path, tokenizer_path))
}
