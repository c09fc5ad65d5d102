// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Request body of `POST /embeddings`: a bare JSON array of strings.

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Input batch for one embedding request
///
/// # Example
/// ```json
/// ["Hello world", "Another text"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbedRequest {
    /// Strings to embed, in the order their vectors are returned
    pub texts: Vec<String>,
}

impl EmbedRequest {
    /// Parses a request body.
    ///
    /// Anything other than a JSON array of strings is an `InvalidRequest`.
    /// Empty arrays and empty strings are accepted.
    pub fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body).map_err(|e| {
            ApiError::InvalidRequest(format!("body must be a JSON array of strings: {}", e))
        })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}
