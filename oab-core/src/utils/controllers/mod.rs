//! Module Exports
//!
//! Actuator drivers for the obstacle-avoidance controller.
//!
//! - `drive`: differential drive over two H-bridge channels.
//! - `servo`: pivoting mount that aims the range sensor.

pub mod drive;
pub mod servo;

use core::fmt;

use embedded_hal::{digital, pwm};

pub use drive::{DifferentialDrive, DriveTrain, MotionCommand, Motor};
pub use servo::{DirectionalActuator, Heading, Servo, ServoBuilder, ServoConfigError, SettleDelays};

/// Errors raised by pin-level actuator writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    Pin(digital::ErrorKind),
    Pwm(pwm::ErrorKind),
}

impl HardwareError {
    pub fn pin<E: digital::Error>(error: E) -> Self {
        HardwareError::Pin(error.kind())
    }

    pub fn pwm<E: pwm::Error>(error: E) -> Self {
        HardwareError::Pwm(error.kind())
    }
}

impl fmt::Display for HardwareError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            HardwareError::Pin(kind) => write!(f, "digital pin error: {:?}", kind),
            HardwareError::Pwm(kind) => write!(f, "pwm error: {:?}", kind),
        }
    }
}

impl core::error::Error for HardwareError {}
