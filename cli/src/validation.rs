//! Naming rules for managed resources
//!
//! The provisioning engine only reports an invalid physical name when it
//! tries to create the resource, often deep into a deployment. Checking the
//! derived names up front turns those into synthesis errors.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{NameEntry, ResourceKind};
use crate::error::SynthError;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("name rule pattern is a valid regex")
}

static BUCKET: LazyLock<Regex> = LazyLock::new(|| compile(r"^[a-z0-9][a-z0-9.-]*[a-z0-9]$"));
static TABLE: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9_.-]+$"));
static FUNCTION: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9_-]+$"));
static BUILD_PROJECT: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9][A-Za-z0-9_-]+$"));
static PIPELINE: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9.@_-]+$"));
static STACK: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z][A-Za-z0-9-]*$"));
static USER_POOL: LazyLock<Regex> = LazyLock::new(|| compile(r"^[\w\s+=,.@-]+$"));
static IDENTITY_POOL: LazyLock<Regex> = LazyLock::new(|| compile(r"^[\w ]+$"));
static GRAPHQL_API: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9_ -]+$"));
static EXPORT: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9:-]+$"));
static IP_ADDRESS: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d+\.\d+\.\d+\.\d+$"));

/// Length bounds and character pattern for one kind of name
struct NameRule {
    min: usize,
    max: usize,
    pattern: &'static LazyLock<Regex>,
    description: &'static str,
}

fn rule_for(kind: ResourceKind) -> NameRule {
    match kind {
        ResourceKind::Bucket => NameRule {
            min: 3,
            max: 63,
            pattern: &BUCKET,
            description: "lowercase letters, digits, dots and hyphens; must start and end alphanumeric",
        },
        ResourceKind::Table => NameRule {
            min: 3,
            max: 255,
            pattern: &TABLE,
            description: "letters, digits, underscores, dots and hyphens",
        },
        ResourceKind::Function => NameRule {
            min: 1,
            max: 64,
            pattern: &FUNCTION,
            description: "letters, digits, underscores and hyphens",
        },
        ResourceKind::BuildProject => NameRule {
            min: 2,
            max: 255,
            pattern: &BUILD_PROJECT,
            description: "letters, digits, underscores and hyphens; must start alphanumeric",
        },
        ResourceKind::Pipeline => NameRule {
            min: 1,
            max: 100,
            pattern: &PIPELINE,
            description: "letters, digits, dots, at signs, underscores and hyphens",
        },
        ResourceKind::Stack => NameRule {
            min: 1,
            max: 128,
            pattern: &STACK,
            description: "letters, digits and hyphens; must start with a letter",
        },
        ResourceKind::UserPool | ResourceKind::UserPoolClient => NameRule {
            min: 1,
            max: 128,
            pattern: &USER_POOL,
            description: "word characters, whitespace and +=,.@-",
        },
        ResourceKind::IdentityPool => NameRule {
            min: 1,
            max: 128,
            pattern: &IDENTITY_POOL,
            description: "word characters and spaces",
        },
        ResourceKind::GraphqlApi => NameRule {
            min: 1,
            max: 65536,
            pattern: &GRAPHQL_API,
            description: "letters, digits, underscores, spaces and hyphens",
        },
        ResourceKind::Export => NameRule {
            min: 1,
            max: 255,
            pattern: &EXPORT,
            description: "letters, digits, colons and hyphens",
        },
    }
}

fn invalid(kind: ResourceKind, name: &str, reason: impl Into<String>) -> SynthError {
    SynthError::InvalidName {
        kind: kind.name().to_string(),
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a physical name against its service's naming rules
pub fn validate_resource_name(kind: ResourceKind, name: &str) -> Result<(), SynthError> {
    let rule = rule_for(kind);

    if name.len() < rule.min || name.len() > rule.max {
        return Err(invalid(
            kind,
            name,
            format!("length {} outside {}..={}", name.len(), rule.min, rule.max),
        ));
    }

    if !rule.pattern.is_match(name) {
        return Err(invalid(kind, name, format!("allowed: {}", rule.description)));
    }

    if kind == ResourceKind::Bucket {
        if name.contains("..") {
            return Err(invalid(kind, name, "consecutive dots"));
        }
        if IP_ADDRESS.is_match(name) {
            return Err(invalid(kind, name, "formatted as an IP address"));
        }
    }

    Ok(())
}

/// Validate every entry, returning the first failure
pub fn validate_entries(entries: &[NameEntry]) -> Result<(), SynthError> {
    entries
        .iter()
        .try_for_each(|entry| validate_resource_name(entry.kind, &entry.name))
}
