//! Synth service - orchestrates a synthesis run
//!
//! Resolves names for the requested stage, builds the app's stacks and
//! writes the cloud assembly, reporting each stack as it lands.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::config::StagecraftConfig;
use crate::domain::Stage;
use crate::synth::{App, Assembly, SynthContext};

/// Result of one synthesis run
#[derive(Debug)]
pub struct SynthReport {
    pub stage: Stage,
    pub app: App,
    pub stacks: Vec<String>,
    pub files: Vec<PathBuf>,
}

/// Service for synthesizing cloud assemblies
pub struct SynthService<'a> {
    config: &'a StagecraftConfig,
    now: DateTime<Utc>,
}

impl<'a> SynthService<'a> {
    /// Create a service using the current time as the synthesis clock
    pub fn new(config: &'a StagecraftConfig) -> Self {
        Self::with_clock(config, Utc::now())
    }

    pub fn with_clock(config: &'a StagecraftConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    /// Build the assembly for `stage` without writing it
    pub fn assemble(&self, stage: Stage, app: App) -> Result<Assembly> {
        let ctx = SynthContext::new(stage, self.config, self.now);
        info!(
            "Synthesizing {} app for stage {} (account {}, region {})",
            app,
            stage,
            self.config.environment.account(),
            self.config.environment.region
        );
        Assembly::synthesize(&ctx, app)
    }

    /// Build and write the assembly into `out_dir`
    pub async fn execute(&self, stage: Stage, app: App, out_dir: &Path) -> Result<SynthReport> {
        let start = Instant::now();
        let assembly = self.assemble(stage, app)?;

        for stack in assembly.stacks() {
            info!(
                "{} {} ({} resources, {} exports)",
                "📦".cyan(),
                stack.name(),
                stack.template.resources.len(),
                stack.exports.len()
            );
        }

        let files = assembly.write(out_dir).await?;
        info!(
            "{} Wrote {} file(s) to {} in {:.2}s",
            "✅".green(),
            files.len(),
            out_dir.display(),
            start.elapsed().as_secs_f64()
        );

        Ok(SynthReport {
            stage,
            app,
            stacks: assembly
                .stacks()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap()
    }

    #[tokio::test]
    async fn test_execute_writes_stage_assembly() {
        let config = StagecraftConfig::default();
        let dir = tempfile::tempdir().unwrap();

        let report = SynthService::with_clock(&config, clock())
            .execute(Stage::Beta, App::Components, dir.path())
            .await
            .unwrap();

        assert_eq!(report.stage, Stage::Beta);
        assert_eq!(
            report.stacks,
            vec!["betaKiroApiPipelineStack", "betaKiroWebPipelineStack"]
        );
        assert_eq!(report.files.len(), 3);
        assert!(dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_assemble_is_clock_deterministic() {
        let config = StagecraftConfig::default();
        let service = SynthService::with_clock(&config, clock());
        let first = service.assemble(Stage::Beta, App::Service).unwrap().render().unwrap();
        let second = service.assemble(Stage::Beta, App::Service).unwrap().render().unwrap();
        assert_eq!(first.templates, second.templates);
    }
}
