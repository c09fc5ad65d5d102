// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! The foreign call and the lifetime of the matrix it returns.

use crate::common::{expected_vectors, install_backend, CallCounter, TEST_DIMENSION};
use txtvec::ffi::{ForeignBatch, NativeEngine};

#[test]
fn test_builtin_engine_matches_backend() {
    install_backend();
    let engine = NativeEngine::builtin();

    let batch = ForeignBatch::prepare(&["hello", "world"]);
    let handle = engine.invoke(&batch);

    assert_eq!(handle.len(), 2);
    let copied = txtvec::ffi::adapt_copy(handle);
    assert_eq!(copied.to_vecs(), expected_vectors(&["hello", "world"]));
    assert_eq!(copied.uniform_dimension(), Some(TEST_DIMENSION));
}

#[test]
fn test_default_engine_is_builtin() {
    install_backend();
    let batch = ForeignBatch::prepare(&["same"]);

    let a = txtvec::ffi::adapt_copy(NativeEngine::default().invoke(&batch));
    let b = txtvec::ffi::adapt_copy(NativeEngine::builtin().invoke(&batch));
    assert_eq!(a, b);
}

#[test]
fn test_dropped_handle_is_freed_once() {
    let counter = CallCounter::start();
    let engine = counter.engine();

    let batch = ForeignBatch::prepare(&["a", "b", "c"]);
    let handle = engine.invoke(&batch);
    assert_eq!(counter.processed(), 1);
    assert_eq!(counter.freed(), 0);

    drop(handle);
    assert_eq!(counter.freed(), 1);
}

#[test]
fn test_released_handle_is_freed_once() {
    let counter = CallCounter::start();
    let engine = counter.engine();

    let batch = ForeignBatch::prepare(&["a"]);
    engine.invoke(&batch).release();

    assert_eq!(counter.processed(), 1);
    assert_eq!(counter.freed(), 1);
}

#[test]
fn test_empty_batch_still_round_trips_through_engine() {
    let counter = CallCounter::start();
    let engine = counter.engine();

    let batch = ForeignBatch::prepare::<&str>(&[]);
    let handle = engine.invoke(&batch);
    assert!(handle.is_empty());
    drop(handle);

    assert_eq!(counter.processed(), 1);
    assert_eq!(counter.freed(), 1);
}

#[test]
fn test_handle_is_freed_when_caller_panics() {
    let counter = CallCounter::start();
    let engine = counter.engine();

    let result = std::panic::catch_unwind(|| {
        let batch = ForeignBatch::prepare(&["boom"]);
        let _handle = engine.invoke(&batch);
        panic!("caller failed while holding the result");
    });

    assert!(result.is_err());
    assert_eq!(counter.freed(), 1);
}
