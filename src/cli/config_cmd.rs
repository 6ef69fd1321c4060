// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These read the environment and an optional `--file` TOML document; no
//! model is loaded.

use std::path::PathBuf;

use super::{EXIT_CONFIG, EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::{self, CaptionConfig, EffectiveConfig};

/// Extract the `--file PATH` option, if given.
pub fn parse_file_arg(args: &[String]) -> Result<Option<PathBuf>, String> {
    let mut file = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--file" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "Missing value for --file".to_string())?;
                file = Some(PathBuf::from(value));
                i += 2;
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(file)
}

fn load(args: &[String]) -> Result<CaptionConfig, i32> {
    let file = parse_file_arg(args).map_err(|e| {
        eprintln!("{}", e);
        EXIT_CONFIG
    })?;
    config::load_with_file(file.as_deref()).map_err(|e| {
        eprintln!("Error: {}", e);
        EXIT_CONFIG
    })
}

/// Print effective config as key-value pairs to stdout.
pub fn run_show(args: &[String]) -> i32 {
    match load(args) {
        Ok(cfg) => {
            print_config(&cfg.effective_config());
            EXIT_SUCCESS
        }
        Err(code) => code,
    }
}

/// Print default config values (no env or file overrides) to stdout.
pub fn run_defaults() {
    print_config(&CaptionConfig::default().effective_config());
}

/// Validate configuration. Returns 0 if a decoder can be built from it.
pub fn run_validate(args: &[String]) -> i32 {
    let cfg = match load(args) {
        Ok(cfg) => cfg,
        Err(code) => return code,
    };

    let mut warnings = 0;
    if let Err(e) = cfg.validate() {
        eprintln!("ERROR: {}", e);
        return EXIT_FAILURE;
    }

    if cfg.decoder.max_length < 2 {
        eprintln!("WARNING: CAPTION_MAX_LENGTH < 2; no tokens will be generated");
        warnings += 1;
    }
    if cfg.decoder.length_normalization_factor < 0.0 {
        eprintln!("WARNING: CAPTION_LENGTH_NORM is negative; normalization stays off");
        warnings += 1;
    }
    if cfg.decoder.expansion_threads > 1 && cfg.decoder.expansion_threads > cfg.decoder.beam_width {
        eprintln!(
            "WARNING: CAPTION_EXPANSION_THREADS ({}) exceeds CAPTION_BEAM_WIDTH ({}); extra threads stay idle",
            cfg.decoder.expansion_threads, cfg.decoder.beam_width
        );
        warnings += 1;
    }

    if warnings == 0 {
        println!("Configuration is valid.");
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("{}={}", config::ENV_BEAM_WIDTH, cfg.beam_width);
    println!("{}={}", config::ENV_MAX_LENGTH, cfg.max_length);
    println!("{}={}", config::ENV_LENGTH_NORM, cfg.length_normalization_factor);
    println!("{}={}", config::ENV_COLLECT_METADATA, cfg.collect_metadata);
    println!("{}={}", config::ENV_EXPANSION_THREADS, cfg.expansion_threads);
    println!("{}={}", config::ENV_LOG_LEVEL, cfg.log_level);
    println!("{}={}", config::ENV_LOG_FORMAT, cfg.log_format);
}
