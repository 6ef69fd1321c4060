// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! `decode` subcommand: run beam search against a scripted model.

use std::path::PathBuf;

use serde::Serialize;

use super::{EXIT_CONFIG, EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::{self, CaptionConfig, ConfigError};
use crate::decode::{BeamSearchDecoder, BeamSearchOutput, DecodeStats, TokenId};
use crate::model::{CaptionModel, ScriptedModel, SpecialTokens};
use crate::telemetry;
use crate::vocab::Vocabulary;

const USAGE: &str = "Usage: caption-core-cli decode --script FILE [--vocab FILE | --start-id N --end-id N] [--image FILE] [--config FILE] [--beam-width N] [--max-length N] [--length-norm F] [--metadata] [--json]";

/// Parsed `decode` arguments. Flags override config values.
///
/// Special token ids come from `--vocab` when given; `--start-id` and
/// `--end-id` are only accepted without a vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeArgs {
    pub script: PathBuf,
    pub vocab: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub beam_width: Option<usize>,
    pub max_length: Option<usize>,
    pub length_norm: Option<f64>,
    pub start_id: Option<TokenId>,
    pub end_id: Option<TokenId>,
    pub metadata: bool,
    pub json: bool,
}

/// One ranked caption in CLI output.
#[derive(Debug, Serialize)]
pub struct CaptionReport {
    pub rank: usize,
    pub tokens: Vec<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub log_probability: f64,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct DecodeReport {
    captions: Vec<CaptionReport>,
    stats: DecodeStats,
}

fn take_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn parse_num<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid value for {}: {}", flag, value))
}

/// Parse arguments following `decode`.
pub fn parse_decode_args(args: &[String]) -> Result<DecodeArgs, String> {
    let mut parsed = DecodeArgs::default();
    let mut script = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--script" => {
                script = Some(PathBuf::from(take_value(args, i, flag)?));
                i += 2;
            }
            "--vocab" => {
                parsed.vocab = Some(PathBuf::from(take_value(args, i, flag)?));
                i += 2;
            }
            "--image" => {
                parsed.image = Some(PathBuf::from(take_value(args, i, flag)?));
                i += 2;
            }
            "--config" => {
                parsed.config_file = Some(PathBuf::from(take_value(args, i, flag)?));
                i += 2;
            }
            "--beam-width" => {
                parsed.beam_width = Some(parse_num(take_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--max-length" => {
                parsed.max_length = Some(parse_num(take_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--length-norm" => {
                parsed.length_norm = Some(parse_num(take_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--start-id" => {
                parsed.start_id = Some(parse_num(take_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--end-id" => {
                parsed.end_id = Some(parse_num(take_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--metadata" => {
                parsed.metadata = true;
                i += 1;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            _ => return Err(format!("Unknown argument: {}", flag)),
        }
    }

    parsed.script = script.ok_or_else(|| "Missing required --script FILE".to_string())?;
    if parsed.vocab.is_some() && (parsed.start_id.is_some() || parsed.end_id.is_some()) {
        return Err("--start-id/--end-id cannot be combined with --vocab".to_string());
    }
    Ok(parsed)
}

/// Apply command-line overrides on top of loaded configuration.
pub fn apply_overrides(mut cfg: CaptionConfig, args: &DecodeArgs) -> CaptionConfig {
    if let Some(w) = args.beam_width {
        cfg.decoder.beam_width = w;
    }
    if let Some(m) = args.max_length {
        cfg.decoder.max_length = m;
    }
    if let Some(f) = args.length_norm {
        cfg.decoder.length_normalization_factor = f;
    }
    if args.metadata {
        cfg.decoder.collect_metadata = true;
    }
    cfg
}

/// Load layered configuration for a decode run and apply flag overrides.
///
/// The returned logging settings are the ones `run_decode` installs.
pub fn load_decode_config(args: &DecodeArgs) -> Result<CaptionConfig, ConfigError> {
    config::load_with_file(args.config_file.as_deref()).map(|cfg| apply_overrides(cfg, args))
}

/// Build ranked reports from a search result.
pub fn build_reports<S>(output: &BeamSearchOutput<S>, vocab: Option<&Vocabulary>) -> Vec<CaptionReport> {
    output
        .candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| CaptionReport {
            rank: idx + 1,
            tokens: c.sequence().to_vec(),
            text: vocab.map(|v| v.caption_text(c.sequence())),
            log_probability: c.log_probability(),
            score: c.score(),
            metadata: c.metadata().map(<[String]>::to_vec),
        })
        .collect()
}

/// Run the `decode` subcommand. Returns a process exit code.
pub fn run_decode(args: &[String]) -> i32 {
    let args = match parse_decode_args(args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            return EXIT_CONFIG;
        }
    };

    let cfg = match load_decode_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };
    if let Err(e) = telemetry::init_logging(&cfg.logging) {
        eprintln!("Logging disabled: {}", e);
    }

    let model = match ScriptedModel::from_file(&args.script) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };

    let vocab = match &args.vocab {
        Some(path) => match Vocabulary::from_file(path) {
            Ok(v) => Some(v),
            Err(e) => {
                eprintln!("Error: {}", e);
                return EXIT_FAILURE;
            }
        },
        None => None,
    };

    let tokens = match &vocab {
        Some(v) => v.special_tokens(),
        None => SpecialTokens::new(args.start_id.unwrap_or(0), args.end_id.unwrap_or(1)),
    };

    let image = match &args.image {
        Some(path) => match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error: failed to read image {}: {}", path.display(), e);
                return EXIT_FAILURE;
            }
        },
        None => Vec::new(),
    };

    let decoder = match BeamSearchDecoder::new(model, tokens, cfg.decoder.to_beam_config()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };

    let output = match decoder
        .model()
        .feed_image(&image)
        .and_then(|state| decoder.search(state))
    {
        Ok(out) => out,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };

    let captions = build_reports(&output, vocab.as_ref());
    if args.json {
        let report = DecodeReport {
            captions,
            stats: output.stats,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return EXIT_FAILURE;
            }
        }
    } else {
        print_captions(&captions);
    }
    EXIT_SUCCESS
}

fn print_captions(captions: &[CaptionReport]) {
    if captions.is_empty() {
        println!("No captions produced.");
        return;
    }
    for c in captions {
        let text = c.text.clone().unwrap_or_else(|| format!("{:?}", c.tokens));
        println!(
            "{:>2}) score={:.4} logprob={:.4}  {}",
            c.rank, c.score, c.log_probability, text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_requires_script() {
        let err = parse_decode_args(&args(&["--json"])).unwrap_err();
        assert!(err.contains("--script"));
    }

    #[test]
    fn test_parse_all_flags() {
        let parsed = parse_decode_args(&args(&[
            "--script", "s.json", "--vocab", "v.txt", "--beam-width", "4",
            "--max-length", "9", "--length-norm", "0.5", "--metadata", "--json",
        ]))
        .unwrap();
        assert_eq!(parsed.script, PathBuf::from("s.json"));
        assert_eq!(parsed.vocab, Some(PathBuf::from("v.txt")));
        assert_eq!(parsed.beam_width, Some(4));
        assert_eq!(parsed.max_length, Some(9));
        assert_eq!(parsed.length_norm, Some(0.5));
        assert!(parsed.metadata);
        assert!(parsed.json);
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        let err = parse_decode_args(&args(&["--script", "s.json", "--beam-width", "x"])).unwrap_err();
        assert!(err.contains("--beam-width"));
    }

    #[test]
    fn test_parse_rejects_unknown_flag() {
        let err = parse_decode_args(&args(&["--script", "s.json", "--temperature", "1"])).unwrap_err();
        assert!(err.contains("Unknown argument"));
    }

    #[test]
    fn test_parse_rejects_ids_with_vocab() {
        let err = parse_decode_args(&args(&[
            "--script", "s.json", "--vocab", "v.txt", "--end-id", "5",
        ]))
        .unwrap_err();
        assert!(err.contains("--vocab"));
    }

    #[test]
    fn test_parse_ids_without_vocab() {
        let parsed =
            parse_decode_args(&args(&["--script", "s.json", "--start-id", "3", "--end-id", "4"]))
                .unwrap();
        assert_eq!(parsed.start_id, Some(3));
        assert_eq!(parsed.end_id, Some(4));
    }

    #[test]
    fn test_usage_lists_every_flag() {
        for flag in [
            "--script", "--vocab", "--image", "--config", "--start-id", "--end-id",
            "--beam-width", "--max-length", "--length-norm", "--metadata", "--json",
        ] {
            assert!(USAGE.contains(flag), "usage is missing {}", flag);
        }
    }

    #[test]
    fn test_config_file_logging_reaches_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caption.toml");
        let log_path = dir.path().join("decode.log");
        std::fs::write(
            &path,
            format!(
                "[logging]\nformat = \"json\"\nlevel = \"debug\"\noutput_path = {:?}\n",
                log_path.display().to_string()
            ),
        )
        .unwrap();
        let parsed = parse_decode_args(&args(&[
            "--script", "s.json", "--config", path.to_str().unwrap(), "--beam-width", "4",
        ]))
        .unwrap();

        let _lock = config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var(config::ENV_LOG_FORMAT);
        std::env::remove_var(config::ENV_LOG_LEVEL);
        std::env::remove_var(config::ENV_BEAM_WIDTH);
        let cfg = load_decode_config(&parsed).unwrap();

        assert_eq!(cfg.logging.format, crate::telemetry::LogFormat::Json);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.output_path, Some(log_path));
        assert_eq!(cfg.decoder.beam_width, 4);
    }

    #[test]
    fn test_run_decode_bad_config_file_is_config_error() {
        let code = run_decode(&args(&[
            "--script", "s.json", "--config", "/nonexistent/caption.toml",
        ]));
        assert_eq!(code, EXIT_CONFIG);
    }

    #[test]
    fn test_overrides_win_over_config() {
        let parsed = parse_decode_args(&args(&["--script", "s.json", "--beam-width", "8"])).unwrap();
        let cfg = apply_overrides(CaptionConfig::default(), &parsed);
        assert_eq!(cfg.decoder.beam_width, 8);
        assert_eq!(cfg.decoder.max_length, 20);
    }

    #[test]
    fn test_run_decode_missing_script_file_fails() {
        let code = run_decode(&args(&["--script", "/nonexistent/script.json"]));
        assert_eq!(code, EXIT_FAILURE);
    }

    #[test]
    fn test_run_decode_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("script.json");
        std::fs::write(&script, r#"{"steps": [{"distribution": [0.0, 0.6, 0.3, 0.1], "metadata": "s"}]}"#).unwrap();
        let vocab = dir.path().join("word_counts.txt");
        std::fs::write(&vocab, "<S> 10\n</S> 10\ndog 4\ncat 2\n").unwrap();

        let _lock = config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let code = run_decode(&args(&[
            "--script", script.to_str().unwrap(),
            "--vocab", vocab.to_str().unwrap(),
            "--beam-width", "2",
            "--max-length", "3",
            "--json",
        ]));
        assert_eq!(code, EXIT_SUCCESS);
    }
}
