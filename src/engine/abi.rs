// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! C ABI of the embedding engine.
//!
//! ```c
//! typedef struct { float* data; uintptr_t len; } FloatArray;
//! typedef struct { FloatArray* data; uintptr_t len; } FloatArrayArray;
//!
//! FloatArrayArray txtvec_process_strings(const uint8_t** strings,
//!                                        const uintptr_t* lengths,
//!                                        uintptr_t count);
//! void txtvec_free_matrix(FloatArrayArray matrix);
//! uint32_t txtvec_abi_version(void);
//! ```
//!
//! Strings are passed as `(pointer, byte length)` pairs and are never assumed
//! to be NUL-terminated. Every matrix returned by `txtvec_process_strings`
//! must be passed to `txtvec_free_matrix` exactly once.

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use tracing::error;

/// One embedding vector owned by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FloatArray {
    pub data: *mut f32,
    pub len: usize,
}

/// The vectors of one batch, in input order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FloatArrayArray {
    pub data: *mut FloatArray,
    pub len: usize,
}

impl FloatArray {
    // Boxed slices keep capacity == len, so the pair is enough to reclaim it.
    fn from_vec(vector: Vec<f32>) -> Self {
        let boxed = vector.into_boxed_slice();
        let len = boxed.len();
        Self {
            data: Box::into_raw(boxed) as *mut f32,
            len,
        }
    }

    /// # Safety
    /// `self` must have been produced by [`FloatArray::from_vec`] and not yet
    /// reclaimed.
    unsafe fn reclaim(self) {
        if self.data.is_null() {
            return;
        }
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
            self.data, self.len,
        )));
    }
}

impl FloatArrayArray {
    pub const fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
        }
    }

    fn from_vectors(vectors: Vec<Vec<f32>>) -> Self {
        if vectors.is_empty() {
            return Self::empty();
        }

        let items: Box<[FloatArray]> = vectors.into_iter().map(FloatArray::from_vec).collect();
        let len = items.len();
        Self {
            data: Box::into_raw(items) as *mut FloatArray,
            len,
        }
    }
}

/// Embeds `count` strings and returns one vector per string.
///
/// # Safety
/// When `count > 0`, `strings` and `lengths` must each point to `count`
/// readable elements, and every `strings[i]` must point to `lengths[i]`
/// readable bytes (it may be dangling when `lengths[i] == 0`). When
/// `count == 0` neither pointer is read and both may be null.
///
/// Any engine failure aborts the process.
#[no_mangle]
pub unsafe extern "C" fn txtvec_process_strings(
    strings: *const *const u8,
    lengths: *const usize,
    count: usize,
) -> FloatArrayArray {
    if count == 0 {
        return FloatArrayArray::empty();
    }
    if strings.is_null() || lengths.is_null() {
        fatal("null string table passed with a non-zero count");
    }

    let Some(backend) = super::installed() else {
        fatal("no embedding backend installed");
    };

    let pointers = slice::from_raw_parts(strings, count);
    let lengths = slice::from_raw_parts(lengths, count);
    let sentences: Vec<Cow<'_, str>> = pointers
        .iter()
        .zip(lengths)
        .map(|(&ptr, &len)| {
            let bytes = if len == 0 {
                &[][..]
            } else {
                slice::from_raw_parts(ptr, len)
            };
            String::from_utf8_lossy(bytes)
        })
        .collect();
    let sentences: Vec<&str> = sentences.iter().map(|s| s.as_ref()).collect();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.embed_batch(&sentences)));
    match outcome {
        Ok(Ok(vectors)) if vectors.len() == count => FloatArrayArray::from_vectors(vectors),
        Ok(Ok(vectors)) => fatal(&format!(
            "backend {} returned {} vectors for {} inputs",
            backend.name(),
            vectors.len(),
            count
        )),
        Ok(Err(e)) => fatal(&format!("backend {} failed: {}", backend.name(), e)),
        Err(_) => fatal(&format!("backend {} panicked", backend.name())),
    }
}

/// Releases a matrix returned by [`txtvec_process_strings`].
///
/// # Safety
/// `matrix` must come from `txtvec_process_strings` and must not have been
/// freed before. No view into it may be read afterwards.
#[no_mangle]
pub unsafe extern "C" fn txtvec_free_matrix(matrix: FloatArrayArray) {
    if matrix.data.is_null() {
        return;
    }

    let items = Box::from_raw(ptr::slice_from_raw_parts_mut(matrix.data, matrix.len));
    for item in items.iter() {
        item.reclaim();
    }
}

/// ABI revision of these exports.
#[no_mangle]
pub extern "C" fn txtvec_abi_version() -> u32 {
    crate::version::ENGINE_ABI_VERSION
}

fn fatal(reason: &str) -> ! {
    error!(reason, "fatal embedding engine fault, aborting");
    std::process::abort()
}
