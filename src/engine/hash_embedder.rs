// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Deterministic hash-seeded embedding backend.
//!
//! Produces pseudo-random vectors seeded from the text bytes. The vectors carry
//! no semantic meaning. They are stable across processes, threads and
//! releases, which makes this backend the reference engine for boundary tests
//! and for running the service without model files.

use super::{EmbeddingBackend, EngineError};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    normalize: bool,
}

impl HashEmbedder {
    pub fn new(dimension: usize, normalize: bool) -> Result<Self, EngineError> {
        if dimension == 0 {
            return Err(EngineError::InvalidConfig(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            normalize,
        })
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        // FNV-1a rather than DefaultHasher: its output is fixed by definition.
        let seed = text.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
        });

        let mut embedding = Vec::with_capacity(self.dimension);
        let mut current_seed = seed;
        for i in 0..self.dimension {
            // Linear congruential step, mixed with the position
            current_seed =
                (current_seed.wrapping_mul(1664525).wrapping_add(1013904223)) ^ (i as u64);

            // Map to [-1, 1]
            let value = (current_seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            embedding.push(value as f32);
        }

        if self.normalize {
            let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in &mut embedding {
                    *value /= norm;
                }
            }
        }

        embedding
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EngineError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}
