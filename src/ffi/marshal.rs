// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Marshaling of host strings into the engine's `(pointer, length)` table.

use std::ptr;

/// The raw bytes of one input string.
///
/// Not NUL-terminated; the engine receives the length explicitly.
#[derive(Debug)]
pub struct ForeignStringBuffer {
    bytes: Box<[u8]>,
}

impl ForeignStringBuffer {
    fn new(s: &str) -> Self {
        Self {
            bytes: s.as_bytes().into(),
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A batch of strings laid out for one boundary call.
///
/// Owns every buffer the pointer table refers to. The buffers are freed when
/// the batch is dropped, so on every path out of the calling scope, including
/// unwinding.
#[derive(Debug)]
pub struct ForeignBatch {
    buffers: Vec<ForeignStringBuffer>,
    pointers: Vec<*const u8>,
    lengths: Vec<usize>,
}

impl ForeignBatch {
    pub fn prepare<S: AsRef<str>>(strings: &[S]) -> Self {
        let buffers: Vec<ForeignStringBuffer> = strings
            .iter()
            .map(|s| ForeignStringBuffer::new(s.as_ref()))
            .collect();

        // Boxed buffers never move, so the pointers stay valid for the
        // lifetime of the batch.
        let pointers = buffers.iter().map(ForeignStringBuffer::as_ptr).collect();
        let lengths = buffers.iter().map(ForeignStringBuffer::len).collect();

        Self {
            buffers,
            pointers,
            lengths,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Pointer to the string table, or null for an empty batch.
    pub fn strings_ptr(&self) -> *const *const u8 {
        if self.is_empty() {
            ptr::null()
        } else {
            self.pointers.as_ptr()
        }
    }

    /// Pointer to the length table, or null for an empty batch.
    pub fn lengths_ptr(&self) -> *const usize {
        if self.is_empty() {
            ptr::null()
        } else {
            self.lengths.as_ptr()
        }
    }

    pub fn byte_lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn buffers(&self) -> &[ForeignStringBuffer] {
        &self.buffers
    }
}
