// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Beam search decoding module for Caption-Core.
//!
//! Turns a model's per-step token distributions into a ranked list of
//! captions. Provides the candidate type, the bounded beam queue, and the
//! decoder that drives them.

pub mod beam;
pub mod candidate;
pub mod error;
pub mod expand;
pub mod queue;

pub use beam::{
    BeamSearchConfig, BeamSearchDecoder, BeamSearchOutput, DecodeStats, ExpansionMode, Termination,
};
pub use candidate::{Candidate, ScoreMode, Scored, TokenId};
pub use error::DecodeError;
pub use expand::{select_top_k, MIN_PROBABILITY};
pub use queue::{BoundedQueue, PushOutcome};
