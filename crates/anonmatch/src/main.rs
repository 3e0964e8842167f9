// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anonmatch - anonymous partner-matching chat bot for PNJ students.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use anonmatch_config::{AnonmatchConfig, ConfigError};
use clap::{Parser, Subcommand};

/// Anonmatch - anonymous partner-matching chat bot.
#[derive(Parser, Debug)]
#[command(name = "anonmatch", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot: long polling, background workers and the health gateway.
    Serve,
    /// Validate configuration and print a summary.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing .env is normal in production.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("anonmatch: failed to read .env: {e}");
        }
    }

    let config = match anonmatch_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            anonmatch_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if config.bot.token().is_none() {
                anonmatch_config::render_errors(&[ConfigError::missing_token()]);
                std::process::exit(1);
            }
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("anonmatch: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => print_summary(&config),
        None => {
            println!("anonmatch: use --help for available commands");
        }
    }
}

fn print_summary(config: &AnonmatchConfig) {
    println!("anonmatch: configuration is valid");
    println!(
        "  bot token:     {}",
        if config.bot.token().is_some() { "set" } else { "MISSING (serve will fail)" }
    );
    println!(
        "  storage:       {} ({})",
        config.storage.db_type, config.storage.database_path
    );
    println!(
        "  workers:       {} (queue {})",
        config.bot.max_update_workers, config.bot.max_update_queue
    );
    println!(
        "  moderation:    {}",
        if config.moderation.is_enabled() { "enabled" } else { "disabled" }
    );
    println!(
        "  gateway:       {}",
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".to_string()
        }
    );
    println!("  log level:     {}", config.bot.effective_log_level());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["anonmatch", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
        let cli = Cli::try_parse_from(["anonmatch", "check-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
        assert!(Cli::try_parse_from(["anonmatch", "frobnicate"]).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = anonmatch_config::load_and_validate_str("").unwrap();
        assert_eq!(config.bot.max_update_workers, 16);
        assert_eq!(config.storage.db_type, "sqlite");
    }
}
