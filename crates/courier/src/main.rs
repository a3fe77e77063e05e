// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - session supervisor and outbound dispatch for a browser-driven
//! messaging channel.
//!
//! This is the binary entry point.

mod app;
mod qr;
mod send;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use courier_config::{CourierConfig, ConfigError};
use tracing::error;

/// Courier - session supervisor and outbound dispatch.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the autostart sessions until interrupted.
    Serve,
    /// Send one message through a session.
    Send(send::SendArgs),
    /// Bring a session up and print its status as JSON.
    Status {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: String,
    },
    /// Manage Courier configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and print the effective values.
    Check,
}

fn load(cli: &Cli) -> Result<CourierConfig, Vec<ConfigError>> {
    match &cli.config {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    if let Commands::Config {
        command: ConfigCommand::Check,
    } = &cli.command
    {
        return match toml::to_string_pretty(&config) {
            Ok(rendered) => {
                eprintln!("courier: configuration is valid");
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("courier: failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        };
    }

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Send(args) => send::run_send(config, args).await,
        Commands::Status { user, session } => status::run_status(config, &user, &session).await,
        Commands::Config { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
