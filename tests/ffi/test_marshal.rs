// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Marshaling of host strings into the engine's pointer/length tables.

use txtvec::ffi::ForeignBatch;

#[test]
fn test_lengths_are_utf8_byte_counts() {
    let batch = ForeignBatch::prepare(&["hello", "héllo", "日本"]);

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.byte_lengths(), &[5, 6, 6]);
    assert_eq!(batch.buffers()[1].as_bytes(), "héllo".as_bytes());
}

#[test]
fn test_buffers_are_not_nul_terminated() {
    let batch = ForeignBatch::prepare(&["a\0b", ""]);

    let first = &batch.buffers()[0];
    assert_eq!(first.len(), 3);
    assert_eq!(first.as_bytes(), b"a\0b");

    let second = &batch.buffers()[1];
    assert!(second.is_empty());
    assert_eq!(batch.byte_lengths(), &[3, 0]);
}

#[test]
fn test_tables_point_at_owned_buffers() {
    let texts = vec!["first".to_string(), "second".to_string()];
    let batch = ForeignBatch::prepare(&texts);

    let pointers = unsafe { std::slice::from_raw_parts(batch.strings_ptr(), batch.len()) };
    let lengths = unsafe { std::slice::from_raw_parts(batch.lengths_ptr(), batch.len()) };

    for ((ptr, len), (buffer, text)) in pointers
        .iter()
        .zip(lengths)
        .zip(batch.buffers().iter().zip(&texts))
    {
        assert_eq!(*ptr, buffer.as_ptr());
        // Copies, not aliases of the caller's strings
        assert_ne!(*ptr, text.as_ptr());
        let bytes = unsafe { std::slice::from_raw_parts(*ptr, *len) };
        assert_eq!(bytes, text.as_bytes());
    }
}

#[test]
fn test_empty_batch_has_null_tables() {
    let batch = ForeignBatch::prepare::<&str>(&[]);

    assert!(batch.is_empty());
    assert!(batch.strings_ptr().is_null());
    assert!(batch.lengths_ptr().is_null());
    assert!(batch.buffers().is_empty());
}
