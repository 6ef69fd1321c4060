// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Caption candidates tracked by the beam search.

use std::cmp::Ordering;

use serde::Serialize;

/// Vocabulary index of a single token.
pub type TokenId = u32;

/// Anything the bounded queue can rank.
pub trait Scored {
    fn score(&self) -> f64;
}

/// How a successor's score is derived from its log-probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreMode {
    /// Score equals the cumulative log-probability.
    Raw,
    /// Score is `log_probability / len^factor`.
    LengthNormalized(f64),
}

/// A partial or complete caption with its model state.
///
/// Never mutated after construction: extending a candidate yields a new one.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate<S> {
    sequence: Vec<TokenId>,
    #[serde(skip)]
    state: S,
    log_probability: f64,
    score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Vec<String>>,
}

impl<S> Candidate<S> {
    /// Seed candidate holding only the start token.
    pub fn start(start_id: TokenId, state: S, with_metadata: bool) -> Self {
        Self {
            sequence: vec![start_id],
            state,
            log_probability: 0.0,
            score: 0.0,
            metadata: with_metadata.then(|| vec![String::new()]),
        }
    }

    /// Build the successor obtained by appending `token`.
    ///
    /// `ln_p` is the natural log of the token's probability. `step_metadata`
    /// is only kept when this candidate already carries metadata.
    pub fn extend(
        &self,
        token: TokenId,
        ln_p: f64,
        state: S,
        step_metadata: Option<&str>,
        mode: ScoreMode,
    ) -> Self {
        let mut sequence = Vec::with_capacity(self.sequence.len() + 1);
        sequence.extend_from_slice(&self.sequence);
        sequence.push(token);

        let metadata = match (&self.metadata, step_metadata) {
            (Some(prev), Some(step)) => {
                let mut next = prev.clone();
                next.push(step.to_string());
                Some(next)
            }
            _ => None,
        };

        let log_probability = self.log_probability + ln_p;
        let score = match mode {
            ScoreMode::Raw => log_probability,
            ScoreMode::LengthNormalized(factor) => {
                log_probability / (sequence.len() as f64).powf(factor)
            }
        };

        Self {
            sequence,
            state,
            log_probability,
            score,
            metadata,
        }
    }

    pub fn sequence(&self) -> &[TokenId] {
        &self.sequence
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn log_probability(&self) -> f64 {
        self.log_probability
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn metadata(&self) -> Option<&[String]> {
        self.metadata.as_deref()
    }

    /// Last token of the sequence. Sequences are never empty.
    pub fn last_token(&self) -> TokenId {
        self.sequence[self.sequence.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Never true for a constructed candidate.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Whether the sequence ends with `end_id`.
    pub fn ends_with(&self, end_id: TokenId) -> bool {
        self.last_token() == end_id
    }

    /// Order two candidates by score alone.
    pub fn cmp_score(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Release the sequence, log-probability, score and metadata.
    pub fn into_parts(self) -> (Vec<TokenId>, f64, f64, Option<Vec<String>>) {
        (self.sequence, self.log_probability, self.score, self.metadata)
    }
}

impl<S> Scored for Candidate<S> {
    fn score(&self) -> f64 {
        self.score
    }
}
