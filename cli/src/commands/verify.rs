//! Verify command - prove the stages can be deployed side by side
//!
//! Every app is assembled in memory for every stage (running the full name
//! and assembly validation), then the names of each pair of stages are
//! compared. Any shared name means one stage would overwrite the other.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::StagecraftConfig;
use crate::domain::{find_collisions, Component, ComponentNames, NameEntry, ResourceNames, Stage};
use crate::error::{StagecraftError, SynthError};
use crate::services::SynthService;
use crate::synth::App;
use crate::ui::{print_header, print_stack, print_success};

/// Every name one stage registers across both apps
pub fn stage_entries(stage: Stage, config: &StagecraftConfig) -> Vec<NameEntry> {
    let mut entries = ResourceNames::derive(stage, &config.project).entries();
    for component in Component::ALL {
        entries.extend(ComponentNames::derive(stage, &config.components, component).entries());
    }
    entries
}

fn collision(stage: Stage, other: Stage, names: Vec<String>) -> StagecraftError {
    SynthError::StageCollision {
        stage: stage.to_string(),
        other: other.to_string(),
        names: names.join(", "),
    }
    .into()
}

/// Check that no name is registered twice, within a stage or across stages
pub fn check_isolation(config: &StagecraftConfig) -> Result<(), StagecraftError> {
    for stage in Stage::ALL {
        let mut seen = BTreeSet::new();
        let duplicates: Vec<String> = stage_entries(stage, config)
            .into_iter()
            .filter(|e| !seen.insert((e.kind, e.name.clone())))
            .map(|e| e.name)
            .collect();
        if !duplicates.is_empty() {
            return Err(collision(stage, stage, duplicates));
        }
    }

    for (i, stage) in Stage::ALL.iter().enumerate() {
        for other in &Stage::ALL[i + 1..] {
            let shared = find_collisions(
                &stage_entries(*stage, config),
                &stage_entries(*other, config),
            );
            debug!("{} vs {}: {} shared name(s)", stage, other, shared.len());
            if !shared.is_empty() {
                return Err(collision(*stage, *other, shared));
            }
        }
    }

    Ok(())
}

pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = StagecraftConfig::load(config_path)?;
    print_header("Verify stage isolation", None);

    let service = SynthService::new(&config);
    for stage in Stage::ALL {
        for app in [App::Service, App::Components] {
            let assembly = service.assemble(stage, app)?;
            info!("{} {}: {} stack(s) valid", stage, app, assembly.stacks().len());
            for stack in assembly.stacks() {
                print_stack(stack.name(), &format!("{} {}", stage, app));
            }
        }
    }

    check_isolation(&config)?;
    print_success(&format!(
        "Stages {} are isolated ({} names each)",
        Stage::ALL
            .iter()
            .map(Stage::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        stage_entries(Stage::Beta, &config).len()
    ));

    Ok(())
}
