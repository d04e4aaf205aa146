//! Synthesis layer - stack builders and the cloud assembly
//!
//! Each stack builder is a flat function taking a [`SynthContext`] plus the
//! typed outputs of the stacks it depends on, and returning its
//! [`Template`](template::Template) together with its own outputs. A
//! consumer therefore cannot be built before its producers.

pub mod api;
pub mod assembly;
pub mod auth;
pub mod bucket;
pub mod codebuild;
pub mod codepipeline;
pub mod components;
pub mod pipeline;
pub mod storage;
pub mod template;

pub use assembly::{App, Assembly};

use chrono::{DateTime, Utc};

use crate::config::StagecraftConfig;
use crate::domain::{ResourceNames, Stage};
use template::ExportedValue;

/// Everything a stack builder needs besides its producers' outputs
#[derive(Debug, Clone)]
pub struct SynthContext<'a> {
    pub stage: Stage,
    pub config: &'a StagecraftConfig,
    pub names: ResourceNames,
    /// Synthesis clock, fixed once per run
    pub now: DateTime<Utc>,
}

impl<'a> SynthContext<'a> {
    pub fn new(stage: Stage, config: &'a StagecraftConfig, now: DateTime<Utc>) -> Self {
        Self {
            stage,
            config,
            names: ResourceNames::derive(stage, &config.project),
            now,
        }
    }
}

/// Typed outputs of a stack that other stacks may import
pub trait StackOutputs {
    fn exports(&self) -> Vec<&ExportedValue>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Context with a fixed clock (2025-01-01T00:00:00Z)
    pub fn context(stage: Stage, config: &StagecraftConfig) -> SynthContext<'_> {
        let now = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap();
        SynthContext::new(stage, config, now)
    }

    #[test]
    fn test_context_derives_names_for_stage() {
        let config = StagecraftConfig::default();
        let ctx = context(Stage::Beta, &config);
        assert_eq!(ctx.names.stage, Stage::Beta);
        assert_eq!(ctx.names.users_table, "betaUsersTable");
        assert_eq!(ctx.now.timestamp(), 1_735_689_600);
    }
}
