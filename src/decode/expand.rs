// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-candidate expansion and step validation.
//!
//! Everything here is a pure function of its inputs, so parents in one batch
//! can be expanded on separate threads.

use std::cmp::Ordering;

use super::candidate::{Candidate, ScoreMode, TokenId};
use super::error::DecodeError;
use crate::model::StepOutput;

/// Probabilities below this are treated as unreachable.
pub const MIN_PROBABILITY: f32 = 1e-12;

/// Select the `k` most probable tokens, highest first.
///
/// Ties are broken by ascending token id. `position` identifies the
/// distribution in error reports.
pub fn select_top_k(
    dist: &[f32],
    k: usize,
    position: usize,
) -> Result<Vec<(TokenId, f32)>, DecodeError> {
    let mut ranked = Vec::with_capacity(dist.len());
    for (token, &p) in dist.iter().enumerate() {
        let token = token as TokenId;
        if !p.is_finite() {
            return Err(DecodeError::NonFiniteProbability { position, token });
        }
        ranked.push((token, p));
    }

    ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        ord => ord,
    });
    ranked.truncate(k);
    Ok(ranked)
}

/// Check a step's output against the batch that produced it.
pub fn validate_step<S>(batch_len: usize, out: &StepOutput<S>) -> Result<(), DecodeError> {
    if out.distributions.len() != batch_len {
        return Err(DecodeError::BatchMismatch {
            what: "distributions",
            expected: batch_len,
            actual: out.distributions.len(),
        });
    }
    if out.new_states.len() != batch_len {
        return Err(DecodeError::BatchMismatch {
            what: "states",
            expected: batch_len,
            actual: out.new_states.len(),
        });
    }
    if let Some(meta) = &out.metadata {
        if meta.len() != batch_len {
            return Err(DecodeError::BatchMismatch {
                what: "metadata entries",
                expected: batch_len,
                actual: meta.len(),
            });
        }
    }

    if let Some(first) = out.distributions.first() {
        let expected = first.len();
        for (position, dist) in out.distributions.iter().enumerate().skip(1) {
            if dist.len() != expected {
                return Err(DecodeError::DistributionLength {
                    position,
                    expected,
                    actual: dist.len(),
                });
            }
        }
    }
    Ok(())
}

/// Check a step's vocabulary size against the one fixed by the first step.
///
/// Call after [`validate_step`], which guarantees every distribution in the
/// step shares the first one's length. On the first step (`expected` is
/// `None`) the vocabulary must be wide enough to contain `end_id`. Returns
/// the size to enforce on later steps.
pub fn check_vocab_size<S>(
    out: &StepOutput<S>,
    expected: Option<usize>,
    end_id: TokenId,
) -> Result<usize, DecodeError> {
    let actual = out.distributions.first().map_or(0, Vec::len);
    match expected {
        Some(expected) if actual != expected => Err(DecodeError::DistributionLength {
            position: 0,
            expected,
            actual,
        }),
        Some(expected) => Ok(expected),
        None if actual <= end_id as usize => Err(DecodeError::EndTokenOutOfRange {
            end_id,
            vocab_size: actual,
        }),
        None => Ok(actual),
    }
}

/// Scoring inputs shared by every expansion in a run.
#[derive(Debug, Clone, Copy)]
pub struct ExpandParams {
    pub beam_width: usize,
    pub end_id: TokenId,
    pub length_normalization_factor: f64,
}

impl ExpandParams {
    fn completion_mode(&self) -> ScoreMode {
        if self.length_normalization_factor > 0.0 {
            ScoreMode::LengthNormalized(self.length_normalization_factor)
        } else {
            ScoreMode::Raw
        }
    }
}

/// Successors of one parent plus bookkeeping for the run stats.
#[derive(Debug)]
pub struct Expansion<S> {
    /// `(successor, reached_end)` in top-k order.
    pub successors: Vec<(Candidate<S>, bool)>,
    /// Selected tokens skipped for falling under [`MIN_PROBABILITY`].
    pub skipped_underflow: usize,
}

/// Expand `parent` using the distribution and state the model returned for it.
pub fn expand_candidate<S: Clone>(
    parent: &Candidate<S>,
    position: usize,
    dist: &[f32],
    state: &S,
    step_metadata: Option<&str>,
    params: &ExpandParams,
) -> Result<Expansion<S>, DecodeError> {
    let top = select_top_k(dist, params.beam_width, position)?;
    let mut successors = Vec::with_capacity(top.len());
    let mut skipped_underflow = 0;

    for (token, p) in top {
        if p < MIN_PROBABILITY {
            skipped_underflow += 1;
            continue;
        }
        let ln_p = f64::from(p).ln();
        let complete = token == params.end_id;
        // Partial sequences are always compared on raw log-probability.
        let mode = if complete {
            params.completion_mode()
        } else {
            ScoreMode::Raw
        };
        let successor = parent.extend(token, ln_p, state.clone(), step_metadata, mode);
        successors.push((successor, complete));
    }

    Ok(Expansion {
        successors,
        skipped_underflow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_sorts_descending_with_id_tiebreak() {
        let dist = [0.1, 0.3, 0.3, 0.05, 0.25];
        let top = select_top_k(&dist, 3, 0).unwrap();
        let expected: Vec<(TokenId, f32)> = vec![(1, 0.3), (2, 0.3), (4, 0.25)];
        assert_eq!(top, expected);
    }

    #[test]
    fn top_k_larger_than_vocab_returns_everything() {
        let top = select_top_k(&[0.4, 0.6], 5, 0).unwrap();
        let expected: Vec<(TokenId, f32)> = vec![(1, 0.6), (0, 0.4)];
        assert_eq!(top, expected);
    }

    #[test]
    fn top_k_rejects_nan() {
        let err = select_top_k(&[0.5, f32::NAN], 2, 3).unwrap_err();
        assert!(matches!(err, DecodeError::NonFiniteProbability { position: 3, token: 1 }));
    }

    #[test]
    fn validate_step_checks_every_length() {
        let ok = StepOutput {
            distributions: vec![vec![0.5, 0.5]; 2],
            new_states: vec![(), ()],
            metadata: None,
        };
        assert!(validate_step(2, &ok).is_ok());

        let short_states = StepOutput {
            distributions: vec![vec![0.5, 0.5]; 2],
            new_states: vec![()],
            metadata: None,
        };
        assert!(matches!(
            validate_step(2, &short_states),
            Err(DecodeError::BatchMismatch { what: "states", .. })
        ));

        let ragged = StepOutput {
            distributions: vec![vec![0.5, 0.5], vec![1.0]],
            new_states: vec![(), ()],
            metadata: Some(vec!["a".into(), "b".into()]),
        };
        assert!(matches!(
            validate_step(2, &ragged),
            Err(DecodeError::DistributionLength { position: 1, expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn vocab_size_is_fixed_by_first_step() {
        let step = |len: usize| StepOutput {
            distributions: vec![vec![0.25; len]],
            new_states: vec![()],
            metadata: None,
        };
        assert_eq!(check_vocab_size(&step(4), None, 1).unwrap(), 4);
        assert_eq!(check_vocab_size(&step(4), Some(4), 1).unwrap(), 4);
        assert!(matches!(
            check_vocab_size(&step(3), Some(4), 1),
            Err(DecodeError::DistributionLength { expected: 4, actual: 3, .. })
        ));
        assert!(matches!(
            check_vocab_size(&step(0), Some(4), 1),
            Err(DecodeError::DistributionLength { expected: 4, actual: 0, .. })
        ));
    }

    #[test]
    fn first_step_must_cover_end_token() {
        let step = StepOutput {
            distributions: vec![vec![1.0, 0.0]],
            new_states: vec![()],
            metadata: None,
        };
        assert!(check_vocab_size(&step, None, 1).is_ok());
        assert!(matches!(
            check_vocab_size(&step, None, 2),
            Err(DecodeError::EndTokenOutOfRange { end_id: 2, vocab_size: 2 })
        ));
    }

    #[test]
    fn expansion_skips_underflow_and_flags_completion() {
        let parent = Candidate::start(0, (), false);
        let params = ExpandParams {
            beam_width: 3,
            end_id: 1,
            length_normalization_factor: 0.0,
        };
        let dist = [0.0, 0.7, 0.3, 1e-13];
        let exp = expand_candidate(&parent, 0, &dist, &(), None, &params).unwrap();

        assert_eq!(exp.skipped_underflow, 1);
        assert_eq!(exp.successors.len(), 2);
        let (first, done) = &exp.successors[0];
        assert!(*done);
        assert_eq!(first.sequence(), &[0, 1]);
        let (second, done) = &exp.successors[1];
        assert!(!*done);
        assert_eq!(second.sequence(), &[0, 2]);
    }

    #[test]
    fn only_completed_successors_are_normalized() {
        let parent = Candidate::start(0, (), false);
        let params = ExpandParams {
            beam_width: 2,
            end_id: 1,
            length_normalization_factor: 1.0,
        };
        let exp = expand_candidate(&parent, 0, &[0.0, 0.5, 0.5], &(), None, &params).unwrap();
        let (done, _) = &exp.successors[0];
        let (partial, _) = &exp.successors[1];
        assert!((done.score() - done.log_probability() / 2.0).abs() < 1e-12);
        assert_eq!(partial.score(), partial.log_probability());
    }
}
