//! CI/CD pipeline configuration for the service pipeline and the
//! standalone component pipelines.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::project::default_token_secret;

/// Where the production manual-approval gate sits in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPlacement {
    /// Gate runs once deployments have finished
    AfterDeploy,
    /// Gate blocks the deploy stages
    BeforeDeploy,
}

/// Service pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Placement of the production approval gate
    #[serde(default = "default_approval")]
    pub approval: ApprovalPlacement,

    /// Message shown to the approver
    #[serde(default = "default_approval_message")]
    pub approval_message: String,

    /// Node.js runtime version used by build projects
    #[serde(default = "default_node_version")]
    pub node_version: u32,

    /// CodeBuild image
    #[serde(default = "default_build_image")]
    pub build_image: String,

    /// Infrastructure source directory inside the repository
    #[serde(default = "default_infra_dir")]
    pub infra_dir: String,

    /// API source directory inside the repository
    #[serde(default = "default_api_dir")]
    pub api_dir: String,

    /// Web source directory inside the repository
    #[serde(default = "default_web_dir")]
    pub web_dir: String,
}

fn default_approval() -> ApprovalPlacement {
    ApprovalPlacement::AfterDeploy
}

fn default_approval_message() -> String {
    "Review the beta environment before promoting to production".to_string()
}

fn default_node_version() -> u32 {
    20
}

fn default_build_image() -> String {
    "aws/codebuild/standard:7.0".to_string()
}

fn default_infra_dir() -> String {
    "my-project-infrastructure".to_string()
}

fn default_api_dir() -> String {
    "my-project-api".to_string()
}

fn default_web_dir() -> String {
    "my-project-web".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            approval: default_approval(),
            approval_message: default_approval_message(),
            node_version: default_node_version(),
            build_image: default_build_image(),
            infra_dir: default_infra_dir(),
            api_dir: default_api_dir(),
            web_dir: default_web_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.node_version < 16 {
            bail!(
                "pipeline.node_version must be 16 or newer, got {}",
                self.node_version
            );
        }
        for (field, value) in [
            ("pipeline.build_image", &self.build_image),
            ("pipeline.infra_dir", &self.infra_dir),
            ("pipeline.api_dir", &self.api_dir),
            ("pipeline.web_dir", &self.web_dir),
        ] {
            if value.trim().is_empty() {
                bail!("{} cannot be empty", field);
            }
        }
        Ok(())
    }
}

/// Standalone API/Web component pipelines, each tracking its own repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsConfig {
    /// Lowercase prefix for component resource names (e.g., "kiro")
    #[serde(default = "default_component_prefix")]
    pub prefix: String,

    /// PascalCase prefix for component stack names (e.g., "Kiro")
    #[serde(default = "default_component_stack_prefix")]
    pub stack_prefix: String,

    /// GitHub owner of the component repositories
    #[serde(default = "default_component_owner")]
    pub owner: String,

    /// Branch both component pipelines track
    #[serde(default = "default_component_branch")]
    pub branch: String,

    /// API component repository
    #[serde(default = "default_api_repo")]
    pub api_repo: String,

    /// Web component repository
    #[serde(default = "default_web_repo")]
    pub web_repo: String,

    /// Secrets Manager secret holding the GitHub OAuth token
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
}

fn default_component_prefix() -> String {
    "kiro".to_string()
}

fn default_component_stack_prefix() -> String {
    "Kiro".to_string()
}

fn default_component_owner() -> String {
    "Abdillamit".to_string()
}

fn default_component_branch() -> String {
    "main".to_string()
}

fn default_api_repo() -> String {
    "kiro-api".to_string()
}

fn default_web_repo() -> String {
    "kiro-web".to_string()
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            prefix: default_component_prefix(),
            stack_prefix: default_component_stack_prefix(),
            owner: default_component_owner(),
            branch: default_component_branch(),
            api_repo: default_api_repo(),
            web_repo: default_web_repo(),
            token_secret: default_token_secret(),
        }
    }
}

impl ComponentsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty()
            || !self
                .prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            bail!(
                "components.prefix must be lowercase letters, digits and hyphens, got '{}'",
                self.prefix
            );
        }
        if self.stack_prefix.is_empty() || !self.stack_prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            bail!(
                "components.stack_prefix must be alphanumeric, got '{}'",
                self.stack_prefix
            );
        }
        for (field, value) in [
            ("components.owner", &self.owner),
            ("components.branch", &self.branch),
            ("components.api_repo", &self.api_repo),
            ("components.web_repo", &self.web_repo),
        ] {
            if value.trim().is_empty() {
                bail!("{} cannot be empty", field);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.approval, ApprovalPlacement::AfterDeploy);
        assert_eq!(config.node_version, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_approval_placement_parses_snake_case() {
        let config: PipelineConfig = serde_yaml::from_str("approval: before_deploy").unwrap();
        assert_eq!(config.approval, ApprovalPlacement::BeforeDeploy);
    }

    #[test]
    fn test_components_rejects_uppercase_prefix() {
        let config = ComponentsConfig {
            prefix: "Kiro".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
