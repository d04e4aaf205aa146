//! Deployment stage domain types
//!
//! A stage isolates an otherwise identical set of resources. Production
//! resources keep their canonical base names; every other stage prefixes
//! them with its tag so the two environments never collide on a
//! globally-namespaced resource (S3 buckets in particular).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StageError;

/// Named deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Pre-production environment, names prefixed with `beta`
    Beta,
    /// Production environment, canonical unprefixed names
    #[serde(rename = "prod")]
    Production,
}

impl Stage {
    /// Every stage, in promotion order
    pub const ALL: [Stage; 2] = [Stage::Beta, Stage::Production];

    /// Prefix stamped onto resource names (empty for production)
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Beta => "beta",
            Self::Production => "",
        }
    }

    /// Human-facing label used in tags, descriptions and build variables
    pub fn label(&self) -> &'static str {
        match self {
            Self::Beta => "beta",
            Self::Production => "prod",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beta" => Ok(Self::Beta),
            "prod" | "production" => Ok(Self::Production),
            _ => Err(StageError::Unrecognized {
                value: s.to_string(),
            }),
        }
    }
}

/// Prefix `name` with the stage tag and `separator`.
///
/// Production returns `name` unchanged.
pub fn stagify(stage: Stage, name: &str, separator: &str) -> String {
    match stage {
        Stage::Production => name.to_string(),
        Stage::Beta => format!("{}{}{}", stage.prefix(), separator, name),
    }
}

/// Resolve a stage string, rejecting anything that is not a known stage.
pub fn get_stage(value: &str) -> Result<Stage, StageError> {
    value.parse()
}
