//! CLI definitions for stagecraft
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stagecraft",
    version,
    about = "Stage-aware infrastructure synthesizer",
    long_about = "Synthesizes stage-qualified CloudFormation stacks (beta or production)\nfrom one project definition, so both environments deploy side by side."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project configuration file (defaults to ./stagecraft.yaml when present)
    #[arg(long, global = true, env = "STAGECRAFT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the cloud assembly for one stage
    Synth {
        /// Deployment stage (beta, prod)
        #[arg(long, env = "STAGE", default_value = "beta")]
        stage: String,

        /// Which stacks to synthesize (service, components)
        #[arg(long, default_value = "service")]
        app: String,

        /// Output directory for templates and manifest
        #[arg(long, default_value = "cdk.out")]
        out: PathBuf,
    },

    /// Print every resource name derived for a stage
    Names {
        /// Deployment stage (beta, prod)
        #[arg(long, env = "STAGE", default_value = "beta")]
        stage: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check that beta and production never share a resource name
    Verify,
}
