// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! The foreign call into the embedding engine and the raw result it returns.

use std::fmt;
use std::slice;

use crate::engine::abi::{self, FloatArray, FloatArrayArray};
use crate::ffi::marshal::ForeignBatch;

/// `process(strings, lengths, count) -> Matrix`
pub type ProcessFn = unsafe extern "C" fn(*const *const u8, *const usize, usize) -> FloatArrayArray;

/// `free_matrix(Matrix)`
pub type FreeMatrixFn = unsafe extern "C" fn(FloatArrayArray);

/// Entry points of a native embedding engine.
///
/// Holds no state of its own; cloning it and sharing it between requests
/// is free.
#[derive(Clone, Copy)]
pub struct NativeEngine {
    process: ProcessFn,
    free_matrix: FreeMatrixFn,
}

impl fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeEngine")
            .field("process", &(self.process as *const ()))
            .field("free_matrix", &(self.free_matrix as *const ()))
            .finish()
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NativeEngine {
    /// The engine exported by this crate.
    pub fn builtin() -> Self {
        Self {
            process: abi::txtvec_process_strings,
            free_matrix: abi::txtvec_free_matrix,
        }
    }

    /// Binds an arbitrary engine.
    ///
    /// # Safety
    /// `process` must accept a null string table when `count == 0`, be safe
    /// to call concurrently, and return one vector per input in input order.
    /// `free_matrix` must release everything `process` returned.
    pub unsafe fn from_raw(process: ProcessFn, free_matrix: FreeMatrixFn) -> Self {
        Self {
            process,
            free_matrix,
        }
    }

    /// Runs the engine over `batch`. Blocks until the engine returns.
    pub fn invoke(&self, batch: &ForeignBatch) -> MatrixHandle {
        // SAFETY: the tables and the buffers they point to are owned by
        // `batch`, which outlives the call.
        let raw = unsafe { (self.process)(batch.strings_ptr(), batch.lengths_ptr(), batch.len()) };

        MatrixHandle {
            raw,
            free_matrix: self.free_matrix,
        }
    }
}

/// Exclusive owner of one engine-allocated result matrix.
///
/// The matrix is handed back to the engine exactly once, when the handle is
/// released or dropped. The raw pointers make the handle neither `Send` nor
/// `Sync`, so it cannot leave the thread that made the call.
pub struct MatrixHandle {
    raw: FloatArrayArray,
    free_matrix: FreeMatrixFn,
}

impl fmt::Debug for MatrixHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixHandle")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl MatrixHandle {
    /// Number of vectors in the matrix.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The vectors, in engine order, borrowed from engine memory.
    pub(crate) fn vectors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.items().iter().map(move |item| self.floats(item))
    }

    pub fn release(self) {
        drop(self)
    }

    fn items(&self) -> &[FloatArray] {
        if self.raw.len == 0 || self.raw.data.is_null() {
            return &[];
        }
        // SAFETY: the engine returned `len` initialized items at `data`, and
        // they live until `free_matrix` runs in `drop`.
        unsafe { slice::from_raw_parts(self.raw.data, self.raw.len) }
    }

    fn floats(&self, item: &FloatArray) -> &[f32] {
        if item.len == 0 || item.data.is_null() {
            return &[];
        }
        // SAFETY: as for `items`; tied to the lifetime of `self`.
        unsafe { slice::from_raw_parts(item.data, item.len) }
    }
}

impl Drop for MatrixHandle {
    fn drop(&mut self) {
        // SAFETY: `raw` came from the paired `process` and is freed only here.
        unsafe { (self.free_matrix)(self.raw) }
    }
}
