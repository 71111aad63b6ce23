// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapline - phone-number-scoped message relay with webhook delivery.
//!
//! Binary entry point.

use clap::{Parser, Subcommand};

mod serve;

/// Zapline - phone-number-scoped message relay with webhook delivery.
#[derive(Parser, Debug)]
#[command(name = "zapline", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match zapline_config::load_and_validate() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("zapline: invalid configuration: {error}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) | None => {
            if let Err(error) = serve::run_serve(config).await {
                eprintln!("zapline: {error}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(error) => {
                eprintln!("zapline: failed to render configuration: {error}");
                std::process::exit(1);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_serve() {
        let cli = Cli::parse_from(["zapline", "serve"]);
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }

    #[test]
    fn cli_defaults_to_no_subcommand() {
        let cli = Cli::parse_from(["zapline"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn default_config_renders_as_toml() {
        let config = zapline_config::ZaplineConfig::default();
        let rendered = toml::to_string_pretty(&config).expect("default config serializes");
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("[webhook]"));
    }
}
