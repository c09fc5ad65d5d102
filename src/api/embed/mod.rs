// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! `POST /embeddings`: JSON array of strings in, JSON array of float arrays
//! out, one vector per string in input order.

pub mod handler;
pub mod request;

pub use handler::{embed_handler, write_embeddings};
pub use request::EmbedRequest;
