// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Caption-Core
//!
//! Beam search caption decoding over a pluggable image-to-text model.
//!
//! # Pieces
//!
//! - [`model::CaptionModel`]: the model boundary (`feed_image`, `inference_step`)
//! - [`decode::BeamSearchDecoder`]: the step loop and termination policy
//! - [`decode::BoundedQueue`]: fixed-width beam that evicts the worst candidate
//! - [`vocab::Vocabulary`]: word-counts vocabulary and caption rendering
//!
//! # Example
//!
//! ```
//! use caption_core::decode::{BeamSearchConfig, BeamSearchDecoder};
//! use caption_core::model::{ScriptedModel, SpecialTokens};
//!
//! let model = ScriptedModel::fixed(vec![0.0, 0.6, 0.3, 0.1]).unwrap();
//! let decoder = BeamSearchDecoder::new(
//!     model,
//!     SpecialTokens::new(0, 1),
//!     BeamSearchConfig::new(2, 3),
//! )
//! .unwrap();
//!
//! let captions = decoder.generate(0).unwrap();
//! assert_eq!(captions[0].sequence(), &[0, 1]);
//! ```

pub mod cli;
pub mod config;
pub mod decode;
pub mod model;
pub mod telemetry;
pub mod vocab;

pub use decode::{BeamSearchConfig, BeamSearchDecoder, Candidate, DecodeError};
pub use model::{CaptionModel, SpecialTokens, StepOutput};
pub use vocab::Vocabulary;
