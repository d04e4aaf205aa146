//! # Project Configuration
//!
//! One YAML file (`stagecraft.yaml`) describes the whole project. Every
//! field has a default, so an empty file (or no file at all) synthesizes
//! the reference project.
//!
//! ## Sections
//!
//! - **project**: display name, slug and service name that seed every resource name
//! - **environment**: target account and region
//! - **source**: GitHub repository and per-stage branches for the service pipeline
//! - **api**: GraphQL schema and resolver function settings
//! - **pipeline**: build images, source directories, approval gate placement
//! - **components**: standalone API/Web component pipelines
//! - **tags**: extra stack tags
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let config = StagecraftConfig::load(Some(Path::new("stagecraft.yaml")))?;
//! let names = ResourceNames::derive(Stage::Beta, &config.project);
//! ```

mod api;
mod pipeline;
mod project;

pub use api::ApiConfig;
pub use pipeline::{ApprovalPlacement, ComponentsConfig, PipelineConfig};
pub use project::{EnvironmentConfig, ProjectConfig, SourceConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, StagecraftError};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "stagecraft.yaml";

/// Tags every stack carries unless overridden in `tags`
pub const MANAGED_BY: &str = "stagecraft";

/// Tag carrying the stage label; reserved, never taken from `tags`
pub const STAGE_TAG: &str = "Stage";

/// Complete project configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StagecraftConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub components: ComponentsConfig,

    /// Extra stack tags (override the Project/ManagedBy defaults; Stage is reserved)
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl StagecraftConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `stagecraft.yaml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(StagecraftError::from(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    })
                    .into());
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    info!(
                        "No {} found, using built-in project defaults",
                        DEFAULT_CONFIG_FILE
                    );
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| {
            format!(
                "Failed to parse config: {}\n  Check YAML syntax and field names.",
                path.display()
            )
        })
    }

    /// Parse configuration from YAML text (empty text yields defaults)
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.project.validate()?;
        self.environment.validate()?;
        self.source.validate()?;
        self.api.validate()?;
        self.pipeline.validate()?;
        self.components.validate()?;

        for (key, value) in &self.tags {
            if key == STAGE_TAG || key.trim().is_empty() || key.len() > 128 {
                return Err(ConfigError::InvalidValue {
                    field: "tags".to_string(),
                    value: key.clone(),
                }
                .into());
            }
            if value.len() > 256 {
                return Err(ConfigError::InvalidValue {
                    field: format!("tags.{}", key),
                    value: value.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Stack tags for a stage label: Project and ManagedBy, then overrides.
    /// Stage always comes from `stage_label`.
    pub fn stack_tags(&self, stage_label: &str) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        tags.insert("Project".to_string(), self.project.name.clone());
        tags.insert("ManagedBy".to_string(), MANAGED_BY.to_string());
        for (key, value) in &self.tags {
            tags.insert(key.clone(), value.clone());
        }
        tags.insert(STAGE_TAG.to_string(), stage_label.to_string());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StagecraftConfig::default();
        assert_eq!(config.project.name, "MyProject");
        assert_eq!(config.project.slug, "my-project");
        assert_eq!(config.environment.region, project::default_region());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
project:
  name: Acme
  slug: acme
environment:
  region: eu-central-1
tags:
  CostCenter: "42"
"#;
        let config = StagecraftConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.project.name, "Acme");
        assert_eq!(config.project.service, "MyService");
        assert_eq!(config.environment.region, "eu-central-1");
        assert_eq!(config.api.memory_mb, 512);
        assert_eq!(config.tags.get("CostCenter").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = StagecraftConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.source.repo, "AWS-project");
    }

    #[test]
    fn test_stack_tags_include_stage_and_overrides() {
        let mut config = StagecraftConfig::default();
        config
            .tags
            .insert("ManagedBy".to_string(), "platform-team".to_string());
        let tags = config.stack_tags("prod");
        assert_eq!(tags["Project"], "MyProject");
        assert_eq!(tags["Stage"], "prod");
        assert_eq!(tags["ManagedBy"], "platform-team");
    }

    #[test]
    fn test_stage_tag_cannot_be_overridden() {
        let config = StagecraftConfig::from_yaml("tags:\n  Stage: prod\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidValue { field, .. }) if field == "tags"
        ));
        assert_eq!(config.stack_tags("beta")["Stage"], "beta");
    }

    #[test]
    fn test_load_missing_explicit_path_errors() {
        let err = StagecraftConfig::load(Some(Path::new("/nonexistent/stagecraft.yaml")))
            .unwrap_err();
        let config_err = err.downcast_ref::<StagecraftError>();
        assert!(matches!(
            config_err,
            Some(StagecraftError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagecraft.yaml");
        std::fs::write(&path, "source:\n  repo: infra\n").unwrap();
        let config = StagecraftConfig::load(Some(&path)).unwrap();
        assert_eq!(config.source.repo, "infra");
    }

    #[test]
    fn test_invalid_section_fails_validation() {
        let config = StagecraftConfig::from_yaml("api:\n  memory_mb: 64\n").unwrap();
        assert!(config.validate().is_err());
    }
}
