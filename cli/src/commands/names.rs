//! Names command - print every name derived for a stage

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use std::path::Path;

use super::resolve_stage;
use crate::config::StagecraftConfig;
use crate::domain::{Component, ComponentNames, NameEntry, ResourceNames, Stage};
use crate::ui::print_header;

fn print_table(title: &str, entries: &[NameEntry]) {
    println!("{}", title.bold());
    for entry in entries {
        let marker = if entry.kind.is_global() {
            "global".yellow()
        } else {
            "".normal()
        };
        println!(
            "  {:<16} {:<22} {} {}",
            entry.kind.name().dimmed(),
            entry.role,
            entry.name.bright_white(),
            marker
        );
    }
    println!();
}

fn component_names(stage: Stage, config: &StagecraftConfig) -> Vec<(Component, ComponentNames)> {
    Component::ALL
        .iter()
        .map(|c| (*c, ComponentNames::derive(stage, &config.components, *c)))
        .collect()
}

/// Render the name listing as JSON
pub fn to_json(stage: Stage, config: &StagecraftConfig) -> Result<String> {
    let service = ResourceNames::derive(stage, &config.project);
    let components: serde_json::Map<String, serde_json::Value> = component_names(stage, config)
        .into_iter()
        .map(|(component, names)| {
            (component.key().to_string(), json!(names.entries()))
        })
        .collect();

    Ok(serde_json::to_string_pretty(&json!({
        "stage": stage.label(),
        "service": service.entries(),
        "components": components,
    }))?)
}

pub async fn execute(config_path: Option<&Path>, stage: &str, json: bool) -> Result<()> {
    let stage = resolve_stage(stage)?;
    let config = StagecraftConfig::load(config_path)?;

    if json {
        println!("{}", to_json(stage, &config)?);
        return Ok(());
    }

    print_header("Resource names", Some(stage));
    print_table("Service", &ResourceNames::derive(stage, &config.project).entries());
    for (component, names) in component_names(stage, &config) {
        print_table(&format!("{} component", component.title()), &names.entries());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_listing() {
        let config = StagecraftConfig::default();
        let rendered: serde_json::Value =
            serde_json::from_str(&to_json(Stage::Beta, &config).unwrap()).unwrap();

        assert_eq!(rendered["stage"], "beta");
        let service = rendered["service"].as_array().unwrap();
        assert!(service
            .iter()
            .any(|e| e["role"] == "users_table" && e["name"] == "betaUsersTable" && e["kind"] == "table"));
        assert_eq!(rendered["components"]["web"][3]["name"], "betaKiroWebPipelineStack");
    }
}
