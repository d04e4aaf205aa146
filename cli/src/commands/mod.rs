//! Subcommand implementations

pub mod names;
pub mod synth;
pub mod verify;

use crate::domain::{get_stage, Stage};
use crate::error::StagecraftError;

/// Parse a `--stage` argument, rejecting anything that is not a known stage
pub fn resolve_stage(value: &str) -> Result<Stage, StagecraftError> {
    Ok(get_stage(value)?)
}
