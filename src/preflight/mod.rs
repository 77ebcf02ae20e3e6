//! Pattern-based preflight checks against operating rules.

pub mod engine;
pub mod pattern;

pub use engine::PreflightEngine;
pub use pattern::{normalize_pattern, run_pattern_check, CheckMode};
