// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequence model boundary consumed by the beam search decoder.
//!
//! The decoder never looks inside model state; it only threads each state
//! back into the next `inference_step` call.

mod scripted;

pub use scripted::{ScriptError, ScriptedModel, StepScript};

use crate::decode::{DecodeError, TokenId};

/// Output of one batched step, index-aligned with the input batch.
#[derive(Debug, Clone)]
pub struct StepOutput<S> {
    /// One probability distribution over the vocabulary per input.
    pub distributions: Vec<Vec<f32>>,
    /// One successor state per input.
    pub new_states: Vec<S>,
    /// Optional per-input annotation for this step.
    pub metadata: Option<Vec<String>>,
}

/// Trained image-to-text model driven one token at a time.
pub trait CaptionModel {
    /// Opaque recurrent state. Cloned when a parent fans out to several
    /// successors.
    type State: Clone + Send + Sync;

    /// Encode an image and return the state that seeds decoding.
    fn feed_image(&self, encoded_image: &[u8]) -> Result<Self::State, DecodeError>;

    /// Advance every `(token, state)` pair by one step.
    fn inference_step(
        &self,
        tokens: &[TokenId],
        states: &[Self::State],
    ) -> Result<StepOutput<Self::State>, DecodeError>;
}

impl<M: CaptionModel + ?Sized> CaptionModel for &M {
    type State = M::State;

    fn feed_image(&self, encoded_image: &[u8]) -> Result<Self::State, DecodeError> {
        (**self).feed_image(encoded_image)
    }

    fn inference_step(
        &self,
        tokens: &[TokenId],
        states: &[Self::State],
    ) -> Result<StepOutput<Self::State>, DecodeError> {
        (**self).inference_step(tokens, states)
    }
}

/// The two vocabulary ids the decoder relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub start_id: TokenId,
    pub end_id: TokenId,
}

impl SpecialTokens {
    pub fn new(start_id: TokenId, end_id: TokenId) -> Self {
        Self { start_id, end_id }
    }
}
