//! Domain model module declarations.

pub mod activity;
pub mod agent;
pub mod decision;
pub mod document;
pub mod message;
pub mod notification;
pub mod preflight;
pub mod rule;
pub mod standing_order;
pub mod subscription;
pub mod task;
