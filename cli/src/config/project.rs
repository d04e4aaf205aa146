//! Project identity, target environment and source repository configuration.

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::Stage;
use crate::ui::print_warning;

/// Placeholder used when no account is configured (matches the provisioning
/// engine's own convention for environment-agnostic stacks).
pub const UNKNOWN_ACCOUNT: &str = "unknown-account";

/// Project identity used to derive every resource name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// PascalCase display name (e.g., "MyProject")
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Lowercase, hyphenated slug for globally-namespaced resources (e.g., "my-project")
    #[serde(default = "default_project_slug")]
    pub slug: String,

    /// Service name used for stack names (e.g., "MyService")
    #[serde(default = "default_service_name")]
    pub service: String,
}

fn default_project_name() -> String {
    "MyProject".to_string()
}

fn default_project_slug() -> String {
    "my-project".to_string()
}

fn default_service_name() -> String {
    "MyService".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            slug: default_project_slug(),
            service: default_service_name(),
        }
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<()> {
        let pascal = Regex::new(r"^[A-Za-z][A-Za-z0-9]*$")?;
        if !pascal.is_match(&self.name) {
            bail!(
                "project.name must be alphanumeric and start with a letter, got '{}'",
                self.name
            );
        }
        if !pascal.is_match(&self.service) {
            bail!(
                "project.service must be alphanumeric and start with a letter, got '{}'",
                self.service
            );
        }

        let slug = Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$")?;
        if !slug.is_match(&self.slug) {
            bail!(
                "project.slug must be lowercase letters, digits and hyphens, got '{}'",
                self.slug
            );
        }

        Ok(())
    }
}

/// Target account and region for every stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// AWS account id. Falls back to CDK_DEFAULT_ACCOUNT when unset.
    #[serde(default)]
    pub account: Option<String>,

    /// AWS region. Falls back to CDK_DEFAULT_REGION, then us-west-2.
    #[serde(default = "default_region")]
    pub region: String,
}

const FALLBACK_REGION: &str = "us-west-2";

pub(crate) fn default_region() -> String {
    region_or_fallback(std::env::var("CDK_DEFAULT_REGION").ok())
}

fn region_or_fallback(region: Option<String>) -> String {
    region
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| FALLBACK_REGION.to_string())
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            account: None,
            region: default_region(),
        }
    }
}

impl EnvironmentConfig {
    /// Resolved account id
    pub fn account(&self) -> String {
        self.account
            .clone()
            .or_else(|| std::env::var("CDK_DEFAULT_ACCOUNT").ok())
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string())
    }

    /// Environment URI recorded in the assembly manifest
    pub fn uri(&self) -> String {
        format!("aws://{}/{}", self.account(), self.region)
    }

    pub fn validate(&self) -> Result<()> {
        let region = Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$")?;
        if !region.is_match(&self.region) {
            bail!("environment.region is not a valid region: '{}'", self.region);
        }
        if let Some(account) = &self.account {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                bail!("environment.account must be a 12-digit id, got '{}'", account);
            }
        }
        Ok(())
    }
}

/// Source repository watched by the service pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// GitHub repository owner
    #[serde(default = "default_owner")]
    pub owner: String,

    /// GitHub repository name
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Branch deployed to beta
    #[serde(default = "default_beta_branch")]
    pub beta_branch: String,

    /// Branch deployed to production
    #[serde(default = "default_prod_branch")]
    pub prod_branch: String,

    /// Secrets Manager secret holding the GitHub OAuth token
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
}

fn default_owner() -> String {
    "Abdillamit".to_string()
}

fn default_repo() -> String {
    "AWS-project".to_string()
}

fn default_beta_branch() -> String {
    "beta".to_string()
}

fn default_prod_branch() -> String {
    "main".to_string()
}

pub(crate) fn default_token_secret() -> String {
    "GithubToken".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            beta_branch: default_beta_branch(),
            prod_branch: default_prod_branch(),
            token_secret: default_token_secret(),
        }
    }
}

impl SourceConfig {
    /// Branch that triggers the pipeline for `stage`
    pub fn branch(&self, stage: Stage) -> &str {
        match stage {
            Stage::Beta => &self.beta_branch,
            Stage::Production => &self.prod_branch,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("source.owner", &self.owner),
            ("source.repo", &self.repo),
            ("source.beta_branch", &self.beta_branch),
            ("source.prod_branch", &self.prod_branch),
            ("source.token_secret", &self.token_secret),
        ] {
            if value.trim().is_empty() {
                bail!("{} cannot be empty", field);
            }
        }
        if self.beta_branch == self.prod_branch {
            print_warning(&format!(
                "beta and prod pipelines both track branch '{}'",
                self.beta_branch
            ));
        }
        Ok(())
    }
}
