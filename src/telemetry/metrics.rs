// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Decode metrics published through the `metrics` facade.
//!
//! Without an installed recorder these calls are no-ops.

use std::time::Duration;

use crate::decode::{DecodeError, DecodeStats, Termination};

pub const DECODE_RUNS: &str = "caption_decode_runs_total";
pub const DECODE_FAILURES: &str = "caption_decode_failures_total";
pub const DECODE_STEPS: &str = "caption_decode_steps";
pub const DECODE_LATENCY_MS: &str = "caption_decode_latency_ms";
pub const CANDIDATES_PRUNED: &str = "caption_candidates_pruned_total";
pub const PARTIAL_FALLBACK: &str = "caption_partial_fallback_total";

/// Record a finished decode run.
pub fn record_decode_success(stats: &DecodeStats, latency: Duration) {
    let termination = match stats.termination {
        Termination::StepLimit => "step_limit",
        Termination::Exhausted => "exhausted",
    };
    metrics::counter!(DECODE_RUNS, "termination" => termination).increment(1);
    metrics::histogram!(DECODE_STEPS).record(stats.steps as f64);
    metrics::histogram!(DECODE_LATENCY_MS).record(latency.as_secs_f64() * 1000.0);
    metrics::counter!(CANDIDATES_PRUNED).increment(stats.pruned as u64);
    if stats.used_partial_fallback {
        metrics::counter!(PARTIAL_FALLBACK).increment(1);
    }
}

/// Record a decode run that returned an error.
pub fn record_decode_failure(error: &DecodeError) {
    let kind = if error.is_contract_violation() {
        "contract_violation"
    } else if error.is_config_error() {
        "config"
    } else {
        match error {
            DecodeError::Cancelled { .. } => "cancelled",
            _ => "model",
        }
    };
    metrics::counter!(DECODE_FAILURES, "kind" => kind).increment(1);
}
