//! Cloud assembly - the stacks of one app, ready for the provisioning engine
//!
//! Stacks are added in declaration order. A stack may only depend on stacks
//! added before it, and every export name is owned by exactly one stack.
//! Writing produces one `<StackName>.template.json` per stack plus a
//! `manifest.json` describing them.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::template::{ExportedValue, Template};
use super::{api, auth, components, pipeline, storage, StackOutputs, SynthContext};
use crate::domain::{Component, ComponentNames, NameEntry, Stage};
use crate::error::SynthError;
use crate::validation::validate_entries;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Which set of stacks to synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum App {
    /// Storage, Auth, Api and the service pipeline
    Service,
    /// Standalone Api and Web component pipelines
    Components,
}

impl App {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Components => "components",
        }
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for App {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "components" => Ok(Self::Components),
            other => anyhow::bail!("Unknown app '{}'. Expected one of: service, components", other),
        }
    }
}

/// One stack in the assembly
#[derive(Debug, Clone)]
pub struct StackArtifact {
    pub template: Template,
    pub dependencies: Vec<String>,
    pub exports: Vec<ExportedValue>,
    pub tags: BTreeMap<String, String>,
    pub environment: String,
}

impl StackArtifact {
    pub fn name(&self) -> &str {
        self.template.stack_name()
    }

    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStack {
    #[serde(rename = "type")]
    pub artifact_type: &'static str,
    pub environment: String,
    pub template_file: String,
    pub template_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub version: &'static str,
    pub stage: String,
    pub app: String,
    pub artifacts: BTreeMap<String, ManifestStack>,
}

/// Rendered assembly contents, ready to write
#[derive(Debug, Clone)]
pub struct RenderedAssembly {
    pub manifest: Manifest,
    /// (file name, template JSON) per stack, in declaration order
    pub templates: Vec<(String, String)>,
}

/// Ordered, validated set of stacks for one stage
#[derive(Debug, Clone)]
pub struct Assembly {
    stage: Stage,
    app: App,
    stacks: Vec<StackArtifact>,
}

impl Assembly {
    pub fn new(stage: Stage, app: App) -> Self {
        Self {
            stage,
            app,
            stacks: Vec::new(),
        }
    }

    /// Build every stack of `app` for the context's stage
    pub fn synthesize(ctx: &SynthContext<'_>, app: App) -> Result<Self> {
        let mut assembly = Self::new(ctx.stage, app);
        let tags = ctx.config.stack_tags(ctx.stage.label());
        let environment = ctx.config.environment.uri();

        match app {
            App::Service => {
                assembly.validate_names(&ctx.names.entries())?;

                let (storage_template, storage_outputs) = storage::build(ctx)?;
                let (auth_template, auth_outputs) = auth::build(ctx)?;
                let (api_template, api_outputs) = api::build(ctx, &storage_outputs, &auth_outputs)?;
                let (pipeline_template, pipeline_outputs) = pipeline::build(ctx)?;

                let storage_name = storage_template.stack_name().to_string();
                let auth_name = auth_template.stack_name().to_string();

                assembly.add_stack(storage_template, &[], &storage_outputs, &tags, &environment)?;
                assembly.add_stack(auth_template, &[], &auth_outputs, &tags, &environment)?;
                assembly.add_stack(
                    api_template,
                    &[storage_name.as_str(), auth_name.as_str()],
                    &api_outputs,
                    &tags,
                    &environment,
                )?;
                assembly.add_stack(pipeline_template, &[], &pipeline_outputs, &tags, &environment)?;
            }
            App::Components => {
                for component in Component::ALL {
                    let names = ComponentNames::derive(ctx.stage, &ctx.config.components, component);
                    assembly.validate_names(&names.entries())?;

                    let template = components::build(ctx, component)?;
                    assembly.add_stack(template, &[], &NoOutputs, &tags, &environment)?;
                }
            }
        }

        info!(
            "Synthesized {} app for {}: {} stack(s)",
            app,
            ctx.stage,
            assembly.stacks.len()
        );
        Ok(assembly)
    }

    fn validate_names(&self, entries: &[NameEntry]) -> Result<(), SynthError> {
        debug!("Validating {} derived name(s)", entries.len());
        validate_entries(entries)
    }

    /// Append a stack; its dependencies must already be in the assembly
    pub fn add_stack(
        &mut self,
        template: Template,
        dependencies: &[&str],
        outputs: &dyn StackOutputs,
        tags: &BTreeMap<String, String>,
        environment: &str,
    ) -> Result<(), SynthError> {
        let name = template.stack_name().to_string();

        if self.stack(&name).is_some() {
            return Err(SynthError::DuplicateStack { name });
        }

        for dependency in dependencies {
            if dependency == &name || self.stack(dependency).is_none() {
                return Err(SynthError::MissingDependency {
                    stack: name,
                    dependency: dependency.to_string(),
                });
            }
        }

        let declared = template.export_names();
        let exports: Vec<ExportedValue> = outputs.exports().into_iter().cloned().collect();
        for export in &exports {
            if !declared.contains(&export.export_name.as_str()) {
                return Err(SynthError::UndeclaredExport {
                    stack: name,
                    name: export.export_name.clone(),
                });
            }
        }

        for export_name in &declared {
            if let Some(owner) = self.export_owner(export_name) {
                return Err(SynthError::DuplicateExport {
                    name: export_name.to_string(),
                    first: owner.to_string(),
                    second: name,
                });
            }
        }

        debug!(
            "Added stack {} ({} resources, depends on {:?})",
            name,
            template.resources.len(),
            dependencies
        );

        self.stacks.push(StackArtifact {
            template,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            exports,
            tags: tags.clone(),
            environment: environment.to_string(),
        });
        Ok(())
    }

    fn export_owner(&self, export_name: &str) -> Option<&str> {
        self.stacks
            .iter()
            .find(|s| s.template.export_names().contains(&export_name))
            .map(StackArtifact::name)
    }

    pub fn stacks(&self) -> &[StackArtifact] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    /// Render templates and build the manifest
    pub fn render(&self) -> Result<RenderedAssembly, SynthError> {
        let mut artifacts = BTreeMap::new();
        let mut templates = Vec::with_capacity(self.stacks.len());

        for stack in &self.stacks {
            let body = stack
                .template
                .to_json_pretty()
                .map_err(|e| SynthError::Render {
                    what: format!("template for {}", stack.name()),
                    message: e.to_string(),
                })?;

            artifacts.insert(
                stack.name().to_string(),
                ManifestStack {
                    artifact_type: STACK_ARTIFACT_TYPE,
                    environment: stack.environment.clone(),
                    template_file: stack.template_file(),
                    template_hash: template_hash(&body),
                    description: stack.template.description.clone(),
                    tags: stack.tags.clone(),
                    dependencies: stack.dependencies.clone(),
                    exports: stack.exports.iter().map(|e| e.export_name.clone()).collect(),
                },
            );
            templates.push((stack.template_file(), body));
        }

        Ok(RenderedAssembly {
            manifest: Manifest {
                version: MANIFEST_VERSION,
                stage: self.stage.label().to_string(),
                app: self.app.name().to_string(),
                artifacts,
            },
            templates,
        })
    }

    /// Write templates and manifest into `out_dir`, returning written paths
    pub async fn write(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let rendered = self.render()?;

        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

        let mut written = Vec::with_capacity(rendered.templates.len() + 1);
        for (file_name, body) in &rendered.templates {
            let path = out_dir.join(file_name);
            tokio::fs::write(&path, body)
                .await
                .with_context(|| format!("Failed to write template: {}", path.display()))?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        let manifest_path = out_dir.join(MANIFEST_FILE);
        let manifest = serde_json::to_string_pretty(&rendered.manifest)
            .context("Failed to serialize assembly manifest")?;
        tokio::fs::write(&manifest_path, manifest)
            .await
            .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;
        written.push(manifest_path);

        Ok(written)
    }
}

/// Outputs of a stack that exports nothing
struct NoOutputs;

impl StackOutputs for NoOutputs {
    fn exports(&self) -> Vec<&ExportedValue> {
        Vec::new()
    }
}

/// Hex SHA-256 of a rendered template
pub fn template_hash(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}
