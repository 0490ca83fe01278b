//! Utility re-exports for the Obstacle-Avoidance Bot.
//!
//! - `sensors`: ultrasonic ranging behind the `RangeSensor` trait
//! - `controllers`: servo mount and differential drive
//! - `control`: configuration and the avoidance policy
//! - `connection`: best-effort telemetry sink

pub mod connection;
pub mod control;
pub mod controllers;
pub mod sensors;

pub use connection::telemetry::{ChannelSink, NoTelemetry, TelemetrySink, TELEMETRY_CHANNEL};
pub use control::{AvoidanceConfig, AvoidancePolicy};
pub use controllers::HardwareError;
pub use embassy_time::Duration;
