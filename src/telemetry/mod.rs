// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry module for Caption-Core.
//!
//! Structured logging, per-run decode spans, and metrics counters.

mod logging;
mod metrics;
mod spans;

pub use self::metrics::{
    record_decode_failure, record_decode_success, CANDIDATES_PRUNED, DECODE_FAILURES,
    DECODE_LATENCY_MS, DECODE_RUNS, DECODE_STEPS, PARTIAL_FALLBACK,
};
pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{DecodeSpan, SpanExt};
