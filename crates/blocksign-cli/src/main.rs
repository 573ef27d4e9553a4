//! BlockSign CLI: offline signing for remote-wallet withdrawals
//!
//! Takes a signing request saved from the API, signs the inputs our keys
//! own, and prints the `signature_data` to submit for finalization.
//!
//! # Usage
//!
//! ```bash
//! blocksign --config blocksign.toml sign --request withdraw.json
//! blocksign sweep-sign --wif 5Hue... --request sweep.json
//! blocksign pubkey --passphrase 00112233445566778899aabbccddeeff
//! blocksign --config blocksign.toml --validate
//! ```

mod commands;
mod config;

use anyhow::{Context, Result};
use commands::KeySource;
use std::path::{Path, PathBuf};

enum Command {
    PinKey,
    Sign { request: PathBuf },
    SweepSign { wif: String, request: PathBuf },
    Pubkey(KeySource),
}

fn main() -> Result<()> {
    // Keep key material out of core files
    blocksign_core::memory::disable_core_dumps();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut validate_only = false;
    let mut command_name: Option<String> = None;
    let mut request: Option<PathBuf> = None;
    let mut wif: Option<String> = None;
    let mut passphrase: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(next_value(&args, &mut i, "--config")?));
            }
            "--request" | "-r" => {
                request = Some(PathBuf::from(next_value(&args, &mut i, "--request")?));
            }
            "--wif" => {
                wif = Some(next_value(&args, &mut i, "--wif")?);
            }
            "--passphrase" => {
                passphrase = Some(next_value(&args, &mut i, "--passphrase")?);
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("blocksign {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if !other.starts_with('-') && command_name.is_none() => {
                command_name = Some(other.to_string());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut cli_config = match config_path {
        Some(ref path) => config::CliConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::CliConfig::default(),
    };

    // Apply env overrides
    cli_config.apply_env_overrides();

    // Validate
    cli_config
        .validate()
        .context("Configuration validation failed")?;

    env_logger::Builder::new()
        .parse_filters(&cli_config.log.level)
        .init();

    if validate_only {
        println!("✅ Configuration is valid.");
        println!("  Host:        {}", cli_config.client.hostname);
        println!("  API version: {}", cli_config.client.version);
        println!("  API key set: {}", !cli_config.client.api_key.is_empty());
        println!("  PIN set:     {}", cli_config.security.pin.is_some());
        println!("  PBKDF2:      {} iterations", cli_config.security.pbkdf2_iterations);
        return Ok(());
    }

    let command = match command_name.as_deref() {
        Some("pin-key") => Command::PinKey,
        Some("sign") => Command::Sign {
            request: request.context("sign requires --request <FILE>")?,
        },
        Some("sweep-sign") => Command::SweepSign {
            wif: wif.context("sweep-sign requires --wif <WIF>")?,
            request: request.context("sweep-sign requires --request <FILE>")?,
        },
        Some("pubkey") => match (wif, passphrase) {
            (Some(wif), None) => Command::Pubkey(KeySource::Wif(wif)),
            (None, Some(hex)) => Command::Pubkey(KeySource::Passphrase(hex)),
            _ => anyhow::bail!("pubkey requires exactly one of --wif or --passphrase"),
        },
        Some(other) => anyhow::bail!("Unknown command: {}", other),
        None => {
            print_help();
            return Ok(());
        }
    };

    match command {
        Command::PinKey => {
            println!("{}", commands::pin_key(&cli_config)?);
        }
        Command::Sign { request } => {
            let json = read_request(&request)?;
            let outcome = commands::sign(&cli_config, &json)?;
            log::info!(
                "signed {} slot(s), {} pending",
                outcome.signed,
                outcome.pending
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::SweepSign { wif, request } => {
            let json = read_request(&request)?;
            let outcome = commands::sweep_sign(&wif, &json)?;
            log::info!(
                "signed {} slot(s), {} pending",
                outcome.signed,
                outcome.pending
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Pubkey(source) => {
            println!("{}", commands::pubkey(&source)?);
        }
    }

    Ok(())
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .with_context(|| format!("{} requires an argument", flag))
}

fn read_request(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))
}

fn print_help() {
    println!(
        r#"BlockSign: offline signing for remote-wallet withdrawals

USAGE:
    blocksign [OPTIONS] <COMMAND>

COMMANDS:
    pin-key                         Print the AES key derived from the Secret PIN
    sign --request <FILE>           Sign a withdrawal request with the PIN-protected key
    sweep-sign --wif <WIF> --request <FILE>
                                    Sign a sweep request with a WIF private key
    pubkey --wif <WIF>              Print the public key for a WIF key
    pubkey --passphrase <HEX>       Print the public key for a hex passphrase

OPTIONS:
    -c, --config <PATH>   Config file path (TOML)
    --validate            Validate configuration and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    BLOCKSIGN_API_KEY       API key
    BLOCKSIGN_PIN           Secret PIN
    BLOCKSIGN_HOSTNAME      API host (default: block.io)
    BLOCKSIGN_API_VERSION   API version, 1 or 2 (default: 2)
    BLOCKSIGN_LOG_LEVEL     Log level (error/warn/info/debug/trace)
"#
    );
}
