// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Decode error types for Caption-Core.
//!
//! All errors are fail-closed: a malformed step aborts the run, nothing is
//! repaired or truncated.

use thiserror::Error;

/// Errors that can occur while configuring or running a beam search.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Model returned {actual} {what} for a batch of {expected}")]
    BatchMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Distribution {position} has {actual} entries, expected {expected}")]
    DistributionLength {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("End token {end_id} is outside a vocabulary of {vocab_size} tokens")]
    EndTokenOutOfRange { end_id: u32, vocab_size: usize },

    #[error("Non-finite probability for token {token} in distribution {position}")]
    NonFiniteProbability { position: usize, token: u32 },

    #[error("Metadata collection is enabled but step {step} returned none")]
    MissingMetadata { step: usize },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Expansion worker failed: {0}")]
    Worker(String),

    #[error("Decode cancelled before step {step}")]
    Cancelled { step: usize },
}

impl DecodeError {
    /// Returns true if the model broke the stepping contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::BatchMismatch { .. }
                | Self::DistributionLength { .. }
                | Self::EndTokenOutOfRange { .. }
                | Self::NonFiniteProbability { .. }
                | Self::MissingMetadata { .. }
        )
    }

    /// Returns true if the error was raised before any decoding started.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}
