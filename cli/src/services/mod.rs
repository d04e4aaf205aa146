//! Services layer - orchestration logic
//!
//! This module coordinates between configuration, the synthesis layer and
//! the filesystem.

pub mod synth_service;

pub use synth_service::SynthService;
