//! Decision layer of the obstacle-avoidance controller.
//!
//! - `config`: thresholds, speeds, timing and telemetry settings.
//! - `policy`: the per-cycle sense-decide-act state machine.

pub mod config;
pub mod policy;

pub use config::{AvoidanceConfig, ConfigError, Regime};
pub use policy::{AvoidancePolicy, CycleReport, Maneuver, ScanResult};
