// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! The engine's C exports, driven with raw pointers the way a foreign caller
//! would.

use std::ptr;

use crate::common::{expected_vectors, install_backend, read_matrix, TEST_DIMENSION};
use txtvec::engine::{
    self, txtvec_abi_version, txtvec_free_matrix, txtvec_process_strings, EmbeddingBackend,
    EngineError, HashEmbedder,
};

fn process(inputs: &[&[u8]]) -> Vec<Vec<f32>> {
    install_backend();
    let pointers: Vec<*const u8> = inputs.iter().map(|s| s.as_ptr()).collect();
    let lengths: Vec<usize> = inputs.iter().map(|s| s.len()).collect();

    unsafe {
        let matrix = txtvec_process_strings(pointers.as_ptr(), lengths.as_ptr(), inputs.len());
        let vectors = read_matrix(&matrix);
        txtvec_free_matrix(matrix);
        vectors
    }
}

#[test]
fn test_zero_count_accepts_null_tables() {
    let matrix = unsafe { txtvec_process_strings(ptr::null(), ptr::null(), 0) };
    assert!(matrix.data.is_null());
    assert_eq!(matrix.len, 0);
    unsafe { txtvec_free_matrix(matrix) };
}

#[test]
fn test_one_vector_per_string_in_order() {
    let vectors = process(&[b"first", b"second", b"third"]);

    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v.len() == TEST_DIMENSION));
    assert_eq!(vectors, expected_vectors(&["first", "second", "third"]));
}

#[test]
fn test_empty_strings_are_embedded() {
    let vectors = process(&[b"", b"x"]);
    assert_eq!(vectors, expected_vectors(&["", "x"]));
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let vectors = process(&[&[0xff, b'a']]);
    assert_eq!(vectors, expected_vectors(&["\u{fffd}a"]));
}

#[test]
fn test_explicit_lengths_win_over_nul_bytes() {
    let vectors = process(&[b"ab\0cd"]);

    assert_eq!(vectors, expected_vectors(&["ab\0cd"]));
    assert_ne!(vectors, expected_vectors(&["ab"]));
}

#[test]
fn test_second_install_keeps_first_backend() {
    let backend = install_backend();

    let err = engine::install(HashEmbedder::new(TEST_DIMENSION * 2, false).unwrap()).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyInstalled { .. }));

    let vectors = process(&[b"still"]);
    assert_eq!(vectors[0].len(), backend.dimension());
}

#[test]
fn test_abi_version_is_exported() {
    assert_eq!(txtvec_abi_version(), txtvec::version::ENGINE_ABI_VERSION);
}
