//! Tunable parameters of the avoidance controller.
//!
//! Every section deserializes with defaults for missing fields, so a config
//! file only needs to name what it changes:
//!
//! ```rust
//! use oab_core::utils::control::config::AvoidanceConfig;
//! let cfg: AvoidanceConfig =
//!     serde_json::from_str(r#"{ "thresholds": { "blocked_cm": 12.0 } }"#).unwrap();
//! assert_eq!(cfg.thresholds.blocked_cm, 12.0);
//! assert_eq!(cfg.thresholds.slow_cm, 20.0);
//! ```

use alloc::string::String;
use core::fmt;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::controllers::servo::SettleDelays;
use crate::utils::sensors::DistanceReading;

/// Distance band a reading falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// At or beyond the slow limit.
    Clear,
    /// Between the blocked and slow limits.
    Caution,
    /// Closer than the blocked limit.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Readings below this stop the robot and trigger a scan.
    pub blocked_cm: f32,
    /// Readings below this (and at or above `blocked_cm`) slow the robot down.
    pub slow_cm: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            blocked_cm: 15.0,
            slow_cm: 20.0,
        }
    }
}

impl Thresholds {
    pub fn classify(
        &self,
        reading: DistanceReading,
    ) -> Regime {
        let cm = reading.centimeters();
        if cm >= self.slow_cm {
            Regime::Clear
        } else if cm >= self.blocked_cm {
            Regime::Caution
        } else {
            Regime::Blocked
        }
    }

    /// Whether a reading is too close to drive towards.
    pub fn is_blocked(
        &self,
        reading: DistanceReading,
    ) -> bool {
        reading.centimeters() < self.blocked_cm
    }
}

/// Duty-cycle magnitudes, 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speeds {
    /// Forward speed in the clear; also used when reversing.
    pub cruise: u8,
    /// Forward speed in the caution band.
    pub reduced: u8,
    /// Speed of both wheels when pivoting.
    pub turn: u8,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            cruise: 150,
            reduced: 100,
            turn: 170,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// How long a reverse or turn runs before the robot stops again.
    pub maneuver_ms: u32,
    /// Servo settle time after swinging out to a side.
    pub far_settle_ms: u32,
    /// Servo settle time after returning to center.
    pub center_settle_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            maneuver_ms: 500,
            far_settle_ms: 500,
            center_settle_ms: 100,
        }
    }
}

impl Timing {
    pub fn settle_delays(&self) -> SettleDelays {
        SettleDelays {
            far: Duration::from_millis(self.far_settle_ms as u64),
            center: Duration::from_millis(self.center_settle_ms as u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Publish a message on every turn decision.
    pub enabled: bool,
    /// Topic the host-side publisher sends turn messages to.
    pub topic: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            topic: String::from("oab/car/turns"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceConfig {
    pub thresholds: Thresholds,
    pub speeds: Speeds,
    pub timing: Timing,
    pub telemetry: TelemetryConfig,
}

impl AvoidanceConfig {
    /// Reject limits that cannot describe the three distance bands.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Thresholds {
            blocked_cm,
            slow_cm,
        } = self.thresholds;
        for (name, value) in [("blocked_cm", blocked_cm), ("slow_cm", slow_cm)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidLimit { name, value });
            }
        }
        if slow_cm < blocked_cm {
            return Err(ConfigError::SlowBelowBlocked {
                slow_cm,
                blocked_cm,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    InvalidLimit { name: &'static str, value: f32 },
    SlowBelowBlocked { slow_cm: f32, blocked_cm: f32 },
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::InvalidLimit { name, value } => {
                write!(f, "{} must be a non-negative distance, got {}", name, value)
            }
            ConfigError::SlowBelowBlocked {
                slow_cm,
                blocked_cm,
            } => write!(
                f,
                "slow_cm ({}) must not be below blocked_cm ({})",
                slow_cm, blocked_cm
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_inclusive_lower_bounds() {
        let t = Thresholds::default();
        assert_eq!(t.classify(DistanceReading::Measured(20.0)), Regime::Clear);
        assert_eq!(t.classify(DistanceReading::Measured(19.99)), Regime::Caution);
        assert_eq!(t.classify(DistanceReading::Measured(15.0)), Regime::Caution);
        assert_eq!(t.classify(DistanceReading::Measured(14.99)), Regime::Blocked);
        assert_eq!(t.classify(DistanceReading::Measured(0.0)), Regime::Blocked);
        assert_eq!(t.classify(DistanceReading::OutOfRange), Regime::Clear);
    }

    #[test]
    fn equal_limits_leave_no_caution_band() {
        let t = Thresholds {
            blocked_cm: 15.0,
            slow_cm: 15.0,
        };
        assert_eq!(t.classify(DistanceReading::Measured(15.0)), Regime::Clear);
        assert_eq!(t.classify(DistanceReading::Measured(14.0)), Regime::Blocked);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(AvoidanceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn slow_limit_below_blocked_is_rejected() {
        let mut cfg = AvoidanceConfig::default();
        cfg.thresholds.slow_cm = 10.0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::SlowBelowBlocked {
                slow_cm: 10.0,
                blocked_cm: 15.0
            })
        );
    }

    #[test]
    fn nan_limit_is_rejected() {
        let mut cfg = AvoidanceConfig::default();
        cfg.thresholds.blocked_cm = f32::NAN;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidLimit {
                name: "blocked_cm",
                ..
            })
        ));
    }

    #[test]
    fn settle_delays_follow_timing() {
        let timing = Timing::default();
        let settle = timing.settle_delays();
        assert_eq!(settle.far, Duration::from_millis(500));
        assert_eq!(settle.center, Duration::from_millis(100));
    }
}
