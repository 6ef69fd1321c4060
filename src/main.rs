// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Caption-Core command-line entry point.
//!
//! ## Subcommands
//!
//! - `decode` - Run beam search against a scripted model
//! - `config show|defaults|validate` - Inspect configuration
//! - `version`, `help`

use std::process::ExitCode;

use caption_core::cli::{self, config_cmd};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(2..).unwrap_or(&[]);

    match command {
        "decode" => exit(cli::run_decode(rest)),
        "config" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
            let sub_args = rest.get(1..).unwrap_or(&[]);
            match subcommand {
                "show" => exit(config_cmd::run_show(sub_args)),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => exit(config_cmd::run_validate(sub_args)),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_usage();
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("caption-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "caption-core {} - beam search caption decoder

USAGE:
    caption-core-cli <COMMAND> [OPTIONS]

COMMANDS:
    decode       Decode captions from a scripted model
    config       Show or validate configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

DECODE OPTIONS:
    --script FILE        JSON step script ({{\"steps\": [{{\"distribution\": [...]}}]}})
    --vocab FILE         Word-counts vocabulary for text output
    --image FILE         Encoded image passed to the model
    --config FILE        TOML configuration file
    --beam-width N       Beam width
    --max-length N       Max caption length, start token included
    --length-norm F      Length normalization factor (0 = off)
    --start-id N         Start token id, only without --vocab (default 0)
    --end-id N           End token id, only without --vocab (default 1)
    --metadata           Collect per-token metadata
    --json               Print results as JSON

CONFIG OPTIONS:
    --file FILE          TOML configuration file

ENVIRONMENT:
    CAPTION_BEAM_WIDTH, CAPTION_MAX_LENGTH, CAPTION_LENGTH_NORM,
    CAPTION_COLLECT_METADATA, CAPTION_EXPANSION_THREADS,
    CAPTION_LOG_LEVEL, CAPTION_LOG_FORMAT

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
",
        version
    );
}
