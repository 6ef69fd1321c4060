// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Decoder and logging configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `CAPTION_*` environment variables. Unparsable environment values fall back
//! to the layer below without failing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `CAPTION_BEAM_WIDTH` | 3 | Beam width |
//! | `CAPTION_MAX_LENGTH` | 20 | Max caption length (start token included) |
//! | `CAPTION_LENGTH_NORM` | 0.0 | Length normalization factor (0 = off) |
//! | `CAPTION_COLLECT_METADATA` | false | Keep per-token metadata |
//! | `CAPTION_EXPANSION_THREADS` | 1 | Expansion threads (1 = sequential, 0 = auto) |
//! | `CAPTION_LOG_LEVEL` | info | Log filter directive |
//! | `CAPTION_LOG_FORMAT` | pretty | `pretty` or `json` |
//!
//! # File format
//!
//! ```toml
//! [decoder]
//! beam_width = 3
//! max_length = 20
//! length_normalization_factor = 0.0
//! collect_metadata = false
//! expansion_threads = 1
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! output_path = "/var/log/caption-core.log"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{BeamSearchConfig, DecodeError, ExpansionMode};
use crate::telemetry::{LogConfig, LogFormat};

pub const ENV_BEAM_WIDTH: &str = "CAPTION_BEAM_WIDTH";
pub const ENV_MAX_LENGTH: &str = "CAPTION_MAX_LENGTH";
pub const ENV_LENGTH_NORM: &str = "CAPTION_LENGTH_NORM";
pub const ENV_COLLECT_METADATA: &str = "CAPTION_COLLECT_METADATA";
pub const ENV_EXPANSION_THREADS: &str = "CAPTION_EXPANSION_THREADS";
pub const ENV_LOG_LEVEL: &str = "CAPTION_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "CAPTION_LOG_FORMAT";

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Invalid config file: {0}")]
    Parse(String),
}

/// Decoder settings before they become a [`BeamSearchConfig`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecoderSettings {
    pub beam_width: usize,
    pub max_length: usize,
    pub length_normalization_factor: f64,
    pub collect_metadata: bool,
    /// 1 = sequential, 0 = one thread per CPU.
    pub expansion_threads: usize,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        let defaults = BeamSearchConfig::default();
        Self {
            beam_width: defaults.beam_width,
            max_length: defaults.max_length,
            length_normalization_factor: defaults.length_normalization_factor,
            collect_metadata: defaults.collect_metadata,
            expansion_threads: 1,
        }
    }
}

impl DecoderSettings {
    pub fn to_beam_config(&self) -> BeamSearchConfig {
        BeamSearchConfig {
            beam_width: self.beam_width,
            max_length: self.max_length,
            length_normalization_factor: self.length_normalization_factor,
            collect_metadata: self.collect_metadata,
            expansion: ExpansionMode::from_threads(self.expansion_threads),
        }
    }
}

/// All configuration for one process.
#[derive(Debug, Clone, Default)]
pub struct CaptionConfig {
    pub decoder: DecoderSettings,
    pub logging: LogConfig,
}

/// Serializable summary of effective values, for `config show`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub beam_width: usize,
    pub max_length: usize,
    pub length_normalization_factor: f64,
    pub collect_metadata: bool,
    pub expansion_threads: usize,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    decoder: FileDecoder,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileDecoder {
    beam_width: Option<usize>,
    max_length: Option<usize>,
    length_normalization_factor: Option<f64>,
    collect_metadata: Option<bool>,
    expansion_threads: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
    output_path: Option<PathBuf>,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an `f64` env var, returning `default` on missing, invalid or non-finite.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0`, `true/false`, `yes/no`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn apply_env_decoder(base: DecoderSettings) -> DecoderSettings {
    DecoderSettings {
        beam_width: parse_usize(ENV_BEAM_WIDTH, base.beam_width),
        max_length: parse_usize(ENV_MAX_LENGTH, base.max_length),
        length_normalization_factor: parse_f64(ENV_LENGTH_NORM, base.length_normalization_factor),
        collect_metadata: parse_bool(ENV_COLLECT_METADATA, base.collect_metadata),
        expansion_threads: parse_usize(ENV_EXPANSION_THREADS, base.expansion_threads),
    }
}

fn apply_env_logging(base: LogConfig) -> LogConfig {
    let level = std::env::var(ENV_LOG_LEVEL)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(base.level);
    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(base.format);
    LogConfig {
        format,
        level,
        output_path: base.output_path,
    }
}

/// Load configuration from defaults and environment variables.
pub fn load() -> CaptionConfig {
    CaptionConfig {
        decoder: apply_env_decoder(DecoderSettings::default()),
        logging: apply_env_logging(LogConfig::default()),
    }
}

/// Load configuration from defaults, a TOML file, then the environment.
pub fn load_with_file(path: Option<&Path>) -> Result<CaptionConfig, ConfigError> {
    let base = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            from_toml(&content)?
        }
        None => CaptionConfig::default(),
    };
    Ok(CaptionConfig {
        decoder: apply_env_decoder(base.decoder),
        logging: apply_env_logging(base.logging),
    })
}

/// Parse a TOML document over the built-in defaults. Ignores the environment.
pub fn from_toml(content: &str) -> Result<CaptionConfig, ConfigError> {
    let file: FileConfig = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = CaptionConfig::default();

    let d = file.decoder;
    let decoder = DecoderSettings {
        beam_width: d.beam_width.unwrap_or(defaults.decoder.beam_width),
        max_length: d.max_length.unwrap_or(defaults.decoder.max_length),
        length_normalization_factor: d
            .length_normalization_factor
            .unwrap_or(defaults.decoder.length_normalization_factor),
        collect_metadata: d.collect_metadata.unwrap_or(defaults.decoder.collect_metadata),
        expansion_threads: d.expansion_threads.unwrap_or(defaults.decoder.expansion_threads),
    };

    let l = file.logging;
    let logging = LogConfig {
        format: l.format.unwrap_or(defaults.logging.format),
        level: l.level.unwrap_or(defaults.logging.level),
        output_path: l.output_path.or(defaults.logging.output_path),
    };

    Ok(CaptionConfig { decoder, logging })
}

impl CaptionConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            beam_width: self.decoder.beam_width,
            max_length: self.decoder.max_length,
            length_normalization_factor: self.decoder.length_normalization_factor,
            collect_metadata: self.decoder.collect_metadata,
            expansion_threads: self.decoder.expansion_threads,
            log_level: self.logging.level.clone(),
            log_format: match self.logging.format {
                LogFormat::Pretty => "pretty".to_string(),
                LogFormat::Json => "json".to_string(),
            },
        }
    }

    /// Check that a decoder can be built from these settings.
    pub fn validate(&self) -> Result<(), DecodeError> {
        self.decoder.to_beam_config().validate()
    }
}

/// Serializes tests that read or mutate `CAPTION_*` variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: &[&str] = &[
        ENV_BEAM_WIDTH,
        ENV_MAX_LENGTH,
        ENV_LENGTH_NORM,
        ENV_COLLECT_METADATA,
        ENV_EXPANSION_THREADS,
        ENV_LOG_LEVEL,
        ENV_LOG_FORMAT,
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.decoder.beam_width, 3);
        assert_eq!(cfg.decoder.max_length, 20);
        assert_eq!(cfg.decoder.length_normalization_factor, 0.0);
        assert!(!cfg.decoder.collect_metadata);
        assert_eq!(cfg.decoder.expansion_threads, 1);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        std::env::set_var(ENV_BEAM_WIDTH, "5");
        std::env::set_var(ENV_LENGTH_NORM, "0.7");
        std::env::set_var(ENV_COLLECT_METADATA, "yes");
        std::env::set_var(ENV_LOG_FORMAT, "json");
        let cfg = load();
        clear_env_vars();

        assert_eq!(cfg.decoder.beam_width, 5);
        assert_eq!(cfg.decoder.length_normalization_factor, 0.7);
        assert!(cfg.decoder.collect_metadata);
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_env_falls_back() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        std::env::set_var(ENV_BEAM_WIDTH, "wide");
        std::env::set_var(ENV_LENGTH_NORM, "NaN");
        std::env::set_var(ENV_LOG_FORMAT, "xml");
        let cfg = load();
        clear_env_vars();

        assert_eq!(cfg.decoder.beam_width, 3);
        assert_eq!(cfg.decoder.length_normalization_factor, 0.0);
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_zero_beam_width_fails_validation() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        std::env::set_var(ENV_BEAM_WIDTH, "0");
        let cfg = load();
        clear_env_vars();

        assert_eq!(cfg.decoder.beam_width, 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caption.toml");
        std::fs::write(&path, "[decoder]\nbeam_width = 7\nmax_length = 12\n").unwrap();

        std::env::set_var(ENV_MAX_LENGTH, "30");
        let cfg = load_with_file(Some(&path)).unwrap();
        clear_env_vars();

        assert_eq!(cfg.decoder.beam_width, 7);
        assert_eq!(cfg.decoder.max_length, 30);
    }

    #[test]
    fn test_from_toml_partial_tables() {
        let cfg = from_toml("[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();
        assert_eq!(cfg.decoder, DecoderSettings::default());
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = from_toml("[decoder]\nbeam_size = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_with_file(Some(Path::new("/nonexistent/caption.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_effective_config_reflects_values() {
        let cfg = CaptionConfig::default();
        let eff = cfg.effective_config();
        assert_eq!(eff.beam_width, 3);
        assert_eq!(eff.log_format, "pretty");
    }
}
