//! Domain layer - pure naming logic
//!
//! This module contains the stage model and name derivation with no I/O.
//! Types and functions here can be unit tested without fixtures.

pub mod naming;
pub mod stage;

// Re-export commonly used types
pub use naming::{find_collisions, Component, ComponentNames, NameEntry, ResourceKind, ResourceNames};
pub use stage::{get_stage, Stage};
