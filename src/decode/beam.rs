// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Beam search over a stepwise caption model.
//!
//! Each step drains the partial beam, feeds every survivor through one
//! batched model call, and routes successors into either the partial or the
//! complete queue. The search stops at `max_length` or when no partial
//! candidate survives, then returns the complete beam, falling back to the
//! partial beam only when nothing completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;

use super::candidate::{Candidate, TokenId};
use super::error::DecodeError;
use super::expand::{
    check_vocab_size, expand_candidate, validate_step, ExpandParams, Expansion,
};
use super::queue::{BoundedQueue, PushOutcome};
use crate::model::{CaptionModel, SpecialTokens};
use crate::telemetry::{self, DecodeSpan, SpanExt};

/// How parents within one step are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpansionMode {
    /// Expand on the calling thread.
    #[default]
    Sequential,
    /// Expand on scoped worker threads; queue updates stay on the caller.
    Parallel { threads: usize },
}

impl ExpansionMode {
    /// Map a thread count to a mode: 1 = sequential, 0 = one per CPU.
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            1 => Self::Sequential,
            0 => Self::Parallel {
                threads: num_cpus::get().max(1),
            },
            n => Self::Parallel { threads: n },
        }
    }

    pub fn threads(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { threads } => *threads,
        }
    }
}

/// Configuration for beam search decoding.
#[derive(Debug, Clone)]
pub struct BeamSearchConfig {
    /// Capacity of both beams and number of tokens tried per expansion.
    pub beam_width: usize,
    /// Maximum sequence length, start token included.
    pub max_length: usize,
    /// When > 0, completed captions score `logprob / len^factor`.
    pub length_normalization_factor: f64,
    /// Carry per-token metadata returned by the model.
    pub collect_metadata: bool,
    pub expansion: ExpansionMode,
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            beam_width: 3,
            max_length: 20,
            length_normalization_factor: 0.0,
            collect_metadata: false,
            expansion: ExpansionMode::Sequential,
        }
    }
}

impl BeamSearchConfig {
    pub fn new(beam_width: usize, max_length: usize) -> Self {
        Self {
            beam_width,
            max_length,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_length_normalization(mut self, factor: f64) -> Self {
        self.length_normalization_factor = factor;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, collect: bool) -> Self {
        self.collect_metadata = collect;
        self
    }

    #[must_use]
    pub fn with_expansion(mut self, expansion: ExpansionMode) -> Self {
        self.expansion = expansion;
        self
    }

    /// Reject settings that cannot start a decode run.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.beam_width == 0 {
            return Err(DecodeError::InvalidConfig("beam_width must be at least 1".into()));
        }
        if self.max_length == 0 {
            return Err(DecodeError::InvalidConfig("max_length must be at least 1".into()));
        }
        if !self.length_normalization_factor.is_finite() {
            return Err(DecodeError::InvalidConfig(
                "length_normalization_factor must be finite".into(),
            ));
        }
        if self.expansion == (ExpansionMode::Parallel { threads: 0 }) {
            return Err(DecodeError::InvalidConfig(
                "parallel expansion needs at least 1 thread".into(),
            ));
        }
        Ok(())
    }
}

/// Why the step loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Ran `max_length - 1` expansion steps.
    #[default]
    StepLimit,
    /// No partial candidate survived a step.
    Exhausted,
}

/// Counters collected over one decode run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodeStats {
    /// Expansion steps executed.
    pub steps: usize,
    /// Successors constructed.
    pub expanded: usize,
    /// Successors dropped or evicted by a full beam.
    pub pruned: usize,
    /// Selected tokens skipped as near-zero probability.
    pub skipped_underflow: usize,
    pub termination: Termination,
    /// Result came from the partial beam because nothing completed.
    pub used_partial_fallback: bool,
}

/// Ranked captions plus run statistics.
#[derive(Debug, Clone)]
pub struct BeamSearchOutput<S> {
    /// Sorted by descending score.
    pub candidates: Vec<Candidate<S>>,
    pub stats: DecodeStats,
}

/// Beam search decoder bound to one model.
pub struct BeamSearchDecoder<M> {
    model: M,
    tokens: SpecialTokens,
    config: BeamSearchConfig,
}

impl<M: CaptionModel> BeamSearchDecoder<M> {
    /// Create a decoder. Fails if the configuration is unusable.
    pub fn new(
        model: M,
        tokens: SpecialTokens,
        config: BeamSearchConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self { model, tokens, config })
    }

    /// Run beam search from `initial_state`, best caption first.
    pub fn generate(
        &self,
        initial_state: M::State,
    ) -> Result<Vec<Candidate<M::State>>, DecodeError> {
        self.search(initial_state).map(|out| out.candidates)
    }

    /// Seed the model with an encoded image, then run beam search.
    pub fn generate_for_image(
        &self,
        encoded_image: &[u8],
    ) -> Result<Vec<Candidate<M::State>>, DecodeError> {
        let initial_state = self.model.feed_image(encoded_image)?;
        self.generate(initial_state)
    }

    /// Like [`generate`](Self::generate), also returning run statistics.
    pub fn search(
        &self,
        initial_state: M::State,
    ) -> Result<BeamSearchOutput<M::State>, DecodeError> {
        self.run(initial_state, None)
    }

    /// Search that aborts between steps once `cancel` is set.
    pub fn search_cancellable(
        &self,
        initial_state: M::State,
        cancel: &AtomicBool,
    ) -> Result<BeamSearchOutput<M::State>, DecodeError> {
        self.run(initial_state, Some(cancel))
    }

    pub fn config(&self) -> &BeamSearchConfig {
        &self.config
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.tokens
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn run(
        &self,
        initial_state: M::State,
        cancel: Option<&AtomicBool>,
    ) -> Result<BeamSearchOutput<M::State>, DecodeError> {
        let span = DecodeSpan::new(self.config.beam_width, self.config.max_length);
        let _entered = span.enter();
        let started = Instant::now();

        let result = self.run_steps(initial_state, cancel);
        let elapsed = started.elapsed();

        span.record_result(&result);
        span.record("latency_ms", elapsed.as_millis() as u64);
        match &result {
            Ok(out) => {
                span.record("steps", out.stats.steps as u64);
                span.record("candidates", out.candidates.len() as u64);
                telemetry::record_decode_success(&out.stats, elapsed);
                if out.stats.used_partial_fallback {
                    tracing::warn!(
                        steps = out.stats.steps,
                        returned = out.candidates.len(),
                        "no caption completed; returning partial beam"
                    );
                } else {
                    tracing::info!(
                        steps = out.stats.steps,
                        returned = out.candidates.len(),
                        best_score = out.candidates.first().map(Candidate::score),
                        "beam search finished"
                    );
                }
            }
            Err(e) => {
                telemetry::record_decode_failure(e);
                tracing::error!(error = %e, "beam search failed");
            }
        }
        result
    }

    fn run_steps(
        &self,
        initial_state: M::State,
        cancel: Option<&AtomicBool>,
    ) -> Result<BeamSearchOutput<M::State>, DecodeError> {
        let mut partial = BoundedQueue::new(self.config.beam_width)?;
        let mut complete = BoundedQueue::new(self.config.beam_width)?;
        partial.push(Candidate::start(
            self.tokens.start_id,
            initial_state,
            self.config.collect_metadata,
        ));

        let mut stats = DecodeStats::default();
        let mut vocab_size = None;

        for step in 1..self.config.max_length {
            if cancel.map_or(false, |flag| flag.load(Ordering::Acquire)) {
                return Err(DecodeError::Cancelled { step });
            }

            let batch = partial.drain();
            let tokens: Vec<TokenId> = batch.iter().map(Candidate::last_token).collect();
            let states: Vec<M::State> = batch.iter().map(|c| c.state().clone()).collect();

            let out = self.model.inference_step(&tokens, &states)?;
            validate_step(batch.len(), &out)?;
            vocab_size = Some(check_vocab_size(&out, vocab_size, self.tokens.end_id)?);

            let step_metadata = if self.config.collect_metadata {
                Some(out.metadata.ok_or(DecodeError::MissingMetadata { step })?)
            } else {
                None
            };

            let expansions = self.expand_batch(
                &batch,
                &out.distributions,
                &out.new_states,
                step_metadata.as_deref(),
            )?;

            for expansion in expansions {
                stats.skipped_underflow += expansion.skipped_underflow;
                for (successor, reached_end) in expansion.successors {
                    stats.expanded += 1;
                    let outcome = if reached_end {
                        complete.push(successor)
                    } else {
                        partial.push(successor)
                    };
                    if outcome != PushOutcome::Inserted {
                        stats.pruned += 1;
                    }
                }
            }
            stats.steps = step;

            tracing::debug!(
                step,
                batch = batch.len(),
                partial = partial.len(),
                complete = complete.len(),
                "beam step"
            );

            if partial.is_empty() {
                stats.termination = Termination::Exhausted;
                break;
            }
        }

        // Never mix complete and partial captions: an unfinished caption may
        // outscore every finished one.
        stats.used_partial_fallback = complete.is_empty();
        let candidates = if stats.used_partial_fallback {
            partial.drain_sorted()
        } else {
            complete.drain_sorted()
        };

        Ok(BeamSearchOutput { candidates, stats })
    }

    fn expand_params(&self) -> ExpandParams {
        ExpandParams {
            beam_width: self.config.beam_width,
            end_id: self.tokens.end_id,
            length_normalization_factor: self.config.length_normalization_factor,
        }
    }

    /// Expand every parent in batch order.
    fn expand_batch(
        &self,
        batch: &[Candidate<M::State>],
        distributions: &[Vec<f32>],
        states: &[M::State],
        metadata: Option<&[String]>,
    ) -> Result<Vec<Expansion<M::State>>, DecodeError> {
        let params = self.expand_params();
        let expand_one = |i: usize| {
            expand_candidate(
                &batch[i],
                i,
                &distributions[i],
                &states[i],
                metadata.map(|m| m[i].as_str()),
                &params,
            )
        };

        match self.config.expansion {
            ExpansionMode::Parallel { threads } if threads > 1 && batch.len() > 1 => {
                let chunk = batch.len().div_ceil(threads);
                std::thread::scope(|scope| -> Result<Vec<Expansion<M::State>>, DecodeError> {
                    let handles: Vec<_> = (0..batch.len())
                        .step_by(chunk)
                        .map(|start| {
                            let end = (start + chunk).min(batch.len());
                            scope.spawn(move || {
                                (start..end).map(expand_one).collect::<Result<Vec<_>, _>>()
                            })
                        })
                        .collect();

                    // Join every worker before reporting, so a panic in a later chunk
                    // never escapes the scope. The first error in batch order wins.
                    let joined: Vec<Result<Vec<_>, DecodeError>> = handles
                        .into_iter()
                        .map(|handle| {
                            handle.join().unwrap_or_else(|_| {
                                Err(DecodeError::Worker("expansion thread panicked".into()))
                            })
                        })
                        .collect();

                    let mut all = Vec::with_capacity(batch.len());
                    for part in joined {
                        all.extend(part?);
                    }
                    Ok(all)
                })
            }
            _ => (0..batch.len()).map(expand_one).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedModel;

    #[test]
    fn default_config_matches_caption_defaults() {
        let cfg = BeamSearchConfig::default();
        assert_eq!(cfg.beam_width, 3);
        assert_eq!(cfg.max_length, 20);
        assert_eq!(cfg.length_normalization_factor, 0.0);
        assert!(!cfg.collect_metadata);
        assert_eq!(cfg.expansion, ExpansionMode::Sequential);
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        assert!(BeamSearchConfig::new(0, 5).validate().is_err());
        assert!(BeamSearchConfig::new(2, 0).validate().is_err());
        assert!(BeamSearchConfig::new(2, 5).validate().is_ok());
    }

    #[test]
    fn validate_rejects_nan_factor_and_zero_threads() {
        let nan = BeamSearchConfig::default().with_length_normalization(f64::NAN);
        assert!(nan.validate().is_err());
        let zero = BeamSearchConfig::default().with_expansion(ExpansionMode::Parallel { threads: 0 });
        assert!(zero.validate().is_err());
    }

    #[test]
    fn expansion_mode_from_threads() {
        assert_eq!(ExpansionMode::from_threads(1), ExpansionMode::Sequential);
        assert_eq!(ExpansionMode::from_threads(4), ExpansionMode::Parallel { threads: 4 });
        assert!(ExpansionMode::from_threads(0).threads() >= 1);
    }

    #[test]
    fn max_length_one_returns_start_candidate() {
        let model = ScriptedModel::fixed(vec![0.0, 0.6, 0.4]).unwrap();
        let decoder = BeamSearchDecoder::new(
            model,
            SpecialTokens::new(0, 1),
            BeamSearchConfig::new(2, 1),
        )
        .unwrap();

        let out = decoder.search(0).unwrap();
        assert_eq!(out.stats.steps, 0);
        assert!(out.stats.used_partial_fallback);
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].sequence(), &[0]);
    }
}
