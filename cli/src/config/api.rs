//! GraphQL API and resolver function configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Schema used when no schema file is configured
pub const DEFAULT_SCHEMA: &str = include_str!("../../graphql/schema.graphql");

/// API stack configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Path to the GraphQL schema, relative to the working directory
    #[serde(default)]
    pub schema: Option<PathBuf>,

    /// Resolver function runtime identifier
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Resolver function timeout (e.g., "30s")
    #[serde(default = "default_function_timeout")]
    pub function_timeout: String,

    /// Resolver function memory in MB
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,

    /// API key lifetime (e.g., "365days")
    #[serde(default = "default_api_key_expiry")]
    pub api_key_expiry: String,

    /// Enable X-Ray tracing on the API
    #[serde(default = "default_true")]
    pub xray_enabled: bool,
}

fn default_runtime() -> String {
    "nodejs22.x".to_string()
}

fn default_function_timeout() -> String {
    "30s".to_string()
}

fn default_memory_mb() -> u32 {
    512
}

fn default_api_key_expiry() -> String {
    "365days".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            schema: None,
            runtime: default_runtime(),
            function_timeout: default_function_timeout(),
            memory_mb: default_memory_mb(),
            api_key_expiry: default_api_key_expiry(),
            xray_enabled: true,
        }
    }
}

impl ApiConfig {
    pub fn function_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.function_timeout).with_context(|| {
            format!(
                "api.function_timeout is not a duration: '{}'",
                self.function_timeout
            )
        })
    }

    pub fn api_key_expiry(&self) -> Result<Duration> {
        humantime::parse_duration(&self.api_key_expiry).with_context(|| {
            format!(
                "api.api_key_expiry is not a duration: '{}'",
                self.api_key_expiry
            )
        })
    }

    /// Schema definition, read from disk when a path is configured
    pub fn schema_definition(&self) -> Result<String> {
        match &self.schema {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read GraphQL schema: {}", path.display())),
            None => Ok(DEFAULT_SCHEMA.to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let timeout = self.function_timeout()?;
        if timeout < Duration::from_secs(1) || timeout > Duration::from_secs(900) {
            bail!(
                "api.function_timeout must be between 1s and 15m, got {}",
                self.function_timeout
            );
        }

        if !(128..=10240).contains(&self.memory_mb) {
            bail!(
                "api.memory_mb must be between 128 and 10240, got {}",
                self.memory_mb
            );
        }

        let expiry = self.api_key_expiry()?;
        if expiry < Duration::from_secs(24 * 3600) || expiry > Duration::from_secs(365 * 24 * 3600) {
            bail!(
                "api.api_key_expiry must be between 1 day and 365 days, got {}",
                self.api_key_expiry
            );
        }

        if self.runtime.trim().is_empty() {
            bail!("api.runtime cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let api = ApiConfig::default();
        assert_eq!(api.function_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(
            api.api_key_expiry().unwrap(),
            Duration::from_secs(365 * 24 * 3600)
        );
        assert!(api.validate().is_ok());
    }

    #[test]
    fn test_rejects_unparseable_timeout() {
        let api = ApiConfig {
            function_timeout: "soon".to_string(),
            ..Default::default()
        };
        assert!(api.validate().is_err());
    }

    #[test]
    fn test_rejects_long_timeout() {
        let api = ApiConfig {
            function_timeout: "20m".to_string(),
            ..Default::default()
        };
        let err = api.validate().unwrap_err();
        assert!(err.to_string().contains("function_timeout"));
    }

    #[test]
    fn test_default_schema_declares_hello() {
        let api = ApiConfig::default();
        let schema = api.schema_definition().unwrap();
        assert!(schema.contains("hello"));
    }

    #[test]
    fn test_missing_schema_file_errors() {
        let api = ApiConfig {
            schema: Some(PathBuf::from("/nonexistent/schema.graphql")),
            ..Default::default()
        };
        assert!(api.schema_definition().is_err());
    }
}
