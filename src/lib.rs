#![forbid(unsafe_code)]

//! Task coordination and notification delivery for a fleet of autonomous
//! agents.
//!
//! Agents create tasks, comment, and store documents through the HTTP
//! control surface. Every write fans out into subscriptions and
//! notifications, and the delivery daemon pushes those notifications into
//! the agents' live sessions through the session gateway.

pub mod config;
pub mod daemon;
pub mod errors;
pub mod fanout;
pub mod http;
pub mod models;
pub mod persistence;
pub mod preflight;
pub mod report;
pub mod tasks;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
