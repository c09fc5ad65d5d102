// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Result adaptation: exposing an engine matrix as host data.
//!
//! Two ownership modes share one traversal:
//! - copy: vectors are copied into host memory and the matrix is released
//!   before [`adapt_copy`] returns;
//! - zero-copy: vectors alias engine memory through a [`ReleaseToken`], which
//!   frees the matrix when released or dropped.

use std::borrow::Cow;

use serde::ser::Error as _;
use serde::{Serialize, Serializer};

use crate::ffi::boundary::MatrixHandle;

/// Who owns the memory behind an [`EmbeddingResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Host,
    Engine,
}

#[derive(Debug, Clone, Copy)]
enum Transfer {
    CopyOut,
    WrapInPlace,
}

impl Transfer {
    fn apply(self, vector: &[f32]) -> Cow<'_, [f32]> {
        match self {
            Transfer::CopyOut => Cow::Owned(vector.to_vec()),
            Transfer::WrapInPlace => Cow::Borrowed(vector),
        }
    }

    fn ownership(self) -> Ownership {
        match self {
            Transfer::CopyOut => Ownership::Host,
            Transfer::WrapInPlace => Ownership::Engine,
        }
    }
}

/// One embedding vector per input string, in input order.
///
/// Serializes as a JSON array of arrays of numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult<'a> {
    vectors: Vec<Cow<'a, [f32]>>,
    ownership: Ownership,
}

impl<'a> EmbeddingResult<'a> {
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[f32]> {
        self.vectors.get(index).map(|v| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.vectors.iter().map(|v| v.as_ref())
    }

    /// The common vector length, or `None` if the result is empty or the
    /// vectors differ in length.
    pub fn uniform_dimension(&self) -> Option<usize> {
        let first = self.vectors.first()?.len();
        self.vectors
            .iter()
            .all(|v| v.len() == first)
            .then_some(first)
    }

    /// Detaches the result from engine memory.
    pub fn into_owned(self) -> EmbeddingResult<'static> {
        EmbeddingResult {
            vectors: self
                .vectors
                .into_iter()
                .map(|v| Cow::Owned(v.into_owned()))
                .collect(),
            ownership: Ownership::Host,
        }
    }

    /// Index of the first vector holding NaN or an infinity, with that value.
    pub fn first_non_finite(&self) -> Option<(usize, f32)> {
        self.iter().enumerate().find_map(|(index, vector)| {
            vector
                .iter()
                .find(|value| !value.is_finite())
                .map(|&value| (index, value))
        })
    }

    pub fn to_vecs(&self) -> Vec<Vec<f32>> {
        self.vectors.iter().map(|v| v.to_vec()).collect()
    }
}

impl Serialize for EmbeddingResult<'_> {
    /// Fails on NaN or infinite components, which JSON numbers cannot hold.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some((index, value)) = self.first_non_finite() {
            return Err(S::Error::custom(format!(
                "vector {} contains non-finite value {}",
                index, value
            )));
        }
        serializer.collect_seq(self.iter())
    }
}

fn walk(handle: &MatrixHandle, transfer: Transfer) -> EmbeddingResult<'_> {
    EmbeddingResult {
        vectors: handle.vectors().map(|v| transfer.apply(v)).collect(),
        ownership: transfer.ownership(),
    }
}

/// Copies every vector into host memory, then releases the matrix.
pub fn adapt_copy(handle: MatrixHandle) -> EmbeddingResult<'static> {
    let result = walk(&handle, Transfer::CopyOut).into_owned();
    handle.release();
    result
}

/// Keeps the matrix alive and exposes it without copying.
pub fn adapt_zero_copy(handle: MatrixHandle) -> ReleaseToken {
    ReleaseToken { handle }
}

/// Single-use capability over engine-owned embeddings.
///
/// Views borrow the token, so none can be read after [`ReleaseToken::release`]
/// consumes it, and a second release does not compile. A token that goes out
/// of scope unreleased is released by its drop.
#[derive(Debug)]
#[must_use = "embeddings are released as soon as the token is dropped"]
pub struct ReleaseToken {
    handle: MatrixHandle,
}

impl ReleaseToken {
    /// Views the vectors in place.
    pub fn view(&self) -> EmbeddingResult<'_> {
        walk(&self.handle, Transfer::WrapInPlace)
    }

    pub fn len(&self) -> usize {
        self.handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Frees the engine memory behind every view of this token.
    pub fn release(self) {
        self.handle.release()
    }
}
