//! Centralized error types for stagecraft
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for stagecraft operations
#[derive(Error, Debug)]
pub enum StagecraftError {
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Synthesis error: {0}")]
    Synth(#[from] SynthError),
}

/// Stage resolution errors
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Unrecognized stage '{value}'. Expected one of: beta, prod")]
    Unrecognized { value: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },
}

/// Template and assembly synthesis errors
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Duplicate stack name in assembly: {name}")]
    DuplicateStack { name: String },

    #[error("Export {name} declared by both {first} and {second}")]
    DuplicateExport {
        name: String,
        first: String,
        second: String,
    },

    #[error("Stack {stack} depends on {dependency}, which is not declared before it")]
    MissingDependency { stack: String, dependency: String },

    #[error("Stack {stack} hands out export {name} without declaring it")]
    UndeclaredExport { stack: String, name: String },

    #[error("Duplicate logical id {logical_id} in {stack}")]
    DuplicateLogicalId { stack: String, logical_id: String },

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("Invalid pipeline {pipeline}: {reason}")]
    InvalidPipeline { pipeline: String, reason: String },

    #[error("Failed to render {what}: {message}")]
    Render { what: String, message: String },

    #[error("Stage {stage} names collide with stage {other}: {names}")]
    StageCollision {
        stage: String,
        other: String,
        names: String,
    },
}
