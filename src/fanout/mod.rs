//! Mention extraction and notification fan-out.

pub mod engine;
pub mod mentions;

pub use engine::{CommentOutcome, FanoutEngine, NewDocument};
