//! Notification delivery daemon and its gateway plumbing.

pub mod blocked;
pub mod delivery;
pub mod gateway;
pub mod prompts;
pub mod reply;

pub use blocked::BlockedAlertCache;
pub use delivery::{
    route_for, spawn_delivery_daemon, CycleReport, DaemonSettings, DeliveryDaemon, DeliveryRoute,
};
pub use gateway::{GatewayRequest, GatewayResponse, GatewayTool, HttpGateway, SessionGateway};
pub use reply::{parse_reply, GatewayReply, ParsedReply};
