//! Module Exports
//!
//! # Modules
//! - `telemetry`: best-effort turn notifications handed to the host connection.

pub mod telemetry;
