//! Synth command - write the cloud assembly for one stage

use anyhow::Result;
use std::path::Path;

use super::resolve_stage;
use crate::config::StagecraftConfig;
use crate::services::SynthService;
use crate::synth::App;
use crate::ui::{print_detail, print_header, print_stack, print_success};

pub async fn execute(config_path: Option<&Path>, stage: &str, app: &str, out: &Path) -> Result<()> {
    let stage = resolve_stage(stage)?;
    let app: App = app.parse()?;
    let config = StagecraftConfig::load(config_path)?;

    print_header(&format!("Synth {} app", app), Some(stage));

    let report = SynthService::new(&config).execute(stage, app, out).await?;

    for stack in &report.stacks {
        print_stack(stack, &format!("{}.template.json", stack));
    }
    println!();
    print_detail("Assembly", &out.display().to_string());
    print_success(&format!(
        "Synthesized {} stack(s) of the {} app for {}, {} file(s)",
        report.stacks.len(),
        report.app,
        report.stage,
        report.files.len()
    ));

    Ok(())
}
