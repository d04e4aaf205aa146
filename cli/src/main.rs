use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod services;
mod synth;
mod ui;
mod validation;

use cli::{Cli, Commands};
use commands::{names, synth as synth_command, verify};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Synth { stage, app, out } => {
            synth_command::execute(config, &stage, &app, &out).await
        }
        Commands::Names { stage, json } => names::execute(config, &stage, json).await,
        Commands::Verify => verify::execute(config).await,
    };

    if let Err(e) = result {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
