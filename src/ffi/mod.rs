// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Host side of the foreign boundary to the embedding engine.
//!
//! A call flows one way: strings are marshaled into a [`ForeignBatch`], the
//! engine is invoked through a [`NativeEngine`], and the returned matrix is
//! adapted in one of two ownership modes. Nothing here holds state between
//! calls or takes locks; concurrent calls share only the engine.

pub mod adapter;
pub mod boundary;
pub mod marshal;

pub use adapter::{adapt_copy, adapt_zero_copy, EmbeddingResult, Ownership, ReleaseToken};
pub use boundary::{FreeMatrixFn, MatrixHandle, NativeEngine, ProcessFn};
pub use marshal::{ForeignBatch, ForeignStringBuffer};

/// Embeds `texts` into host-owned vectors.
///
/// Engine memory is released before this returns.
pub fn create_embeddings<S: AsRef<str>>(
    engine: &NativeEngine,
    texts: &[S],
) -> EmbeddingResult<'static> {
    adapt_copy(invoke_batch(engine, texts))
}

/// Embeds `texts` without copying the result out of engine memory.
///
/// The vectors stay valid until the returned token is released or dropped.
pub fn create_embeddings_zero_copy<S: AsRef<str>>(
    engine: &NativeEngine,
    texts: &[S],
) -> ReleaseToken {
    adapt_zero_copy(invoke_batch(engine, texts))
}

fn invoke_batch<S: AsRef<str>>(engine: &NativeEngine, texts: &[S]) -> MatrixHandle {
    let batch = ForeignBatch::prepare(texts);
    engine.invoke(&batch)
}
