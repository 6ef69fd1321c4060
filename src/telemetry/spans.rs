// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span helpers for decode runs.

use tracing::{info_span, Span};

/// Extension trait for recording an operation's outcome on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the per-run `beam_search` span.
pub struct DecodeSpan;

impl DecodeSpan {
    /// Fields left empty here are filled once the run finishes:
    /// `status`, `error.message`, `latency_ms`, `steps`, `candidates`.
    pub fn new(beam_width: usize, max_length: usize) -> Span {
        info_span!(
            "beam_search",
            beam_width = beam_width as u64,
            max_length = max_length as u64,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            steps = tracing::field::Empty,
            candidates = tracing::field::Empty,
        )
    }
}
