// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic model whose distributions are read from a script.
//!
//! State is the decode depth. Depth `d` uses `steps[d]`, and the last step
//! repeats once the script runs out. A step may override its distribution
//! based on the last token fed in.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CaptionModel, StepOutput};
use crate::decode::{DecodeError, TokenId};

/// Errors raised while loading or validating a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script: {0}")]
    Io(String),
    #[error("Invalid script JSON: {0}")]
    Parse(String),
    #[error("Script has no steps")]
    Empty,
    #[error("Step {step}: distribution has {actual} entries, expected {expected}")]
    LengthMismatch {
        step: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Step {step}: distribution contains a non-finite value")]
    NonFinite { step: usize },
}

/// One scripted decode depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepScript {
    /// Distribution used unless an override matches.
    pub distribution: Vec<f32>,
    /// Distributions keyed by the last token fed into the step.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub by_last_token: HashMap<TokenId, Vec<f32>>,
    /// Annotation attached to every candidate expanded at this depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl StepScript {
    pub fn new(distribution: Vec<f32>) -> Self {
        Self {
            distribution,
            by_last_token: HashMap::new(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_override(mut self, last_token: TokenId, distribution: Vec<f32>) -> Self {
        self.by_last_token.insert(last_token, distribution);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    fn distribution_for(&self, last_token: TokenId) -> &[f32] {
        self.by_last_token
            .get(&last_token)
            .unwrap_or(&self.distribution)
    }
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    steps: Vec<StepScript>,
}

/// Model double that replays scripted distributions.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    steps: Vec<StepScript>,
    vocab_size: usize,
}

impl ScriptedModel {
    /// Build from explicit steps. All distributions must share one length
    /// and contain only finite values.
    pub fn new(steps: Vec<StepScript>) -> Result<Self, ScriptError> {
        let vocab_size = steps.first().ok_or(ScriptError::Empty)?.distribution.len();
        for (step, script) in steps.iter().enumerate() {
            let all = std::iter::once(&script.distribution).chain(script.by_last_token.values());
            for dist in all {
                if dist.len() != vocab_size {
                    return Err(ScriptError::LengthMismatch {
                        step,
                        expected: vocab_size,
                        actual: dist.len(),
                    });
                }
                if dist.iter().any(|p| !p.is_finite()) {
                    return Err(ScriptError::NonFinite { step });
                }
            }
        }
        Ok(Self { steps, vocab_size })
    }

    /// A model that returns the same distribution at every depth.
    pub fn fixed(distribution: Vec<f32>) -> Result<Self, ScriptError> {
        Self::new(vec![StepScript::new(distribution)])
    }

    /// Parse a `{"steps": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile =
            serde_json::from_str(json).map_err(|e| ScriptError::Parse(e.to_string()))?;
        Self::new(file.steps)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScriptError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn steps(&self) -> &[StepScript] {
        &self.steps
    }

    fn step_at(&self, depth: usize) -> &StepScript {
        let idx = depth.min(self.steps.len() - 1);
        &self.steps[idx]
    }
}

impl CaptionModel for ScriptedModel {
    type State = usize;

    fn feed_image(&self, _encoded_image: &[u8]) -> Result<usize, DecodeError> {
        Ok(0)
    }

    fn inference_step(
        &self,
        tokens: &[TokenId],
        states: &[usize],
    ) -> Result<StepOutput<usize>, DecodeError> {
        if tokens.len() != states.len() {
            return Err(DecodeError::Model(format!(
                "{} tokens but {} states",
                tokens.len(),
                states.len()
            )));
        }

        let mut distributions = Vec::with_capacity(tokens.len());
        let mut new_states = Vec::with_capacity(tokens.len());
        let mut metadata = Vec::with_capacity(tokens.len());
        let mut all_annotated = true;

        for (&token, &depth) in tokens.iter().zip(states) {
            let step = self.step_at(depth);
            distributions.push(step.distribution_for(token).to_vec());
            new_states.push(depth + 1);
            match &step.metadata {
                Some(m) => metadata.push(m.clone()),
                None => all_annotated = false,
            }
        }

        Ok(StepOutput {
            distributions,
            new_states,
            metadata: all_annotated.then_some(metadata),
        })
    }
}
