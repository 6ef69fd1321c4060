// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for Caption-Core commands.
//!
//! ## Usage
//!
//! ```bash
//! caption-core-cli decode --script steps.json --vocab word_counts.txt
//! caption-core-cli config show
//! caption-core-cli config validate --file caption.toml
//! ```

pub mod config_cmd;
pub mod decode_cmd;

pub use decode_cmd::{load_decode_config, parse_decode_args, run_decode, CaptionReport, DecodeArgs};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
