//! Differential drive over two H-bridge channels.
//!
//! Each side of the robot has one motor with two direction inputs (IN1/IN2 on an
//! L298N style bridge) and one enable line carrying the PWM speed. Commands are
//! applied immediately and without ramping; the newest command fully replaces
//! whatever was applied before.

use embedded_hal::{
    digital::{OutputPin, PinState},
    pwm::SetDutyCycle,
};
use serde::{Deserialize, Serialize};

use super::HardwareError;
use crate::utils::control::config::Speeds;

/// Motion primitives understood by the drive train.
///
/// `Forward` carries its duty-cycle speed (0-255); the other motions run at the
/// drive train's configured cruise or turn speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionCommand {
    Forward(u8),
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

/// Anything that can execute a `MotionCommand`.
pub trait DriveTrain {
    fn apply(
        &mut self,
        command: MotionCommand,
    ) -> Result<(), HardwareError>;

    /// The last command that was applied successfully, or `Stop` after a
    /// failed write made the drive fall back to coasting.
    fn current(&self) -> MotionCommand;
}

impl<T: DriveTrain + ?Sized> DriveTrain for &mut T {
    fn apply(
        &mut self,
        command: MotionCommand,
    ) -> Result<(), HardwareError> {
        (**self).apply(command)
    }

    fn current(&self) -> MotionCommand {
        (**self).current()
    }
}

/// Rotation of a single wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Forward,
    Reverse,
    /// Both direction inputs low, the motor freewheels.
    Coast,
}

/// One motor on one half of an H-bridge.
pub struct Motor<F, R, P> {
    forward: F,
    reverse: R,
    enable: P,
}

impl<F, R, P> Motor<F, R, P>
where
    F: OutputPin,
    R: OutputPin,
    P: SetDutyCycle,
{
    pub fn new(
        forward: F,
        reverse: R,
        enable: P,
    ) -> Self {
        Self {
            forward,
            reverse,
            enable,
        }
    }

    /// Set the enable duty cycle, then the direction inputs.
    pub fn set(
        &mut self,
        spin: Spin,
        speed: u8,
    ) -> Result<(), HardwareError> {
        self.enable
            .set_duty_cycle_fraction(speed as u16, u8::MAX as u16)
            .map_err(HardwareError::pwm)?;

        let (forward, reverse) = match spin {
            Spin::Forward => (PinState::High, PinState::Low),
            Spin::Reverse => (PinState::Low, PinState::High),
            Spin::Coast => (PinState::Low, PinState::Low),
        };
        self.forward.set_state(forward).map_err(HardwareError::pin)?;
        self.reverse.set_state(reverse).map_err(HardwareError::pin)
    }
}

/// Two-sided skid-steer drive.
pub struct DifferentialDrive<F, R, P> {
    left: Motor<F, R, P>,
    right: Motor<F, R, P>,
    speeds: Speeds,
    last: MotionCommand,
}

impl<F, R, P> DifferentialDrive<F, R, P>
where
    F: OutputPin,
    R: OutputPin,
    P: SetDutyCycle,
{
    /// Create a drive that starts out stopped. Nothing is written until the
    /// first `apply`.
    pub fn new(
        left: Motor<F, R, P>,
        right: Motor<F, R, P>,
        speeds: Speeds,
    ) -> Self {
        Self {
            left,
            right,
            speeds,
            last: MotionCommand::Stop,
        }
    }

    /// Best-effort fallback after a failed write, so one side is never left
    /// running a command the other side did not take. `current` reports `Stop`
    /// afterwards.
    fn coast(&mut self) {
        if let Err(error) = self.left.set(Spin::Coast, 0) {
            tracing::error!(?error, "left side did not coast");
        }
        if let Err(error) = self.right.set(Spin::Coast, 0) {
            tracing::error!(?error, "right side did not coast");
        }
        self.last = MotionCommand::Stop;
    }

    /// Per-side (spin, speed) for a command, left first.
    pub fn wheel_plan(
        &self,
        command: MotionCommand,
    ) -> ((Spin, u8), (Spin, u8)) {
        let cruise = self.speeds.cruise;
        let turn = self.speeds.turn;
        match command {
            MotionCommand::Forward(speed) => ((Spin::Forward, speed), (Spin::Forward, speed)),
            MotionCommand::Backward => ((Spin::Reverse, cruise), (Spin::Reverse, cruise)),
            MotionCommand::TurnLeft => ((Spin::Reverse, turn), (Spin::Forward, turn)),
            MotionCommand::TurnRight => ((Spin::Forward, turn), (Spin::Reverse, turn)),
            MotionCommand::Stop => ((Spin::Coast, 0), (Spin::Coast, 0)),
        }
    }
}

impl<F, R, P> DriveTrain for DifferentialDrive<F, R, P>
where
    F: OutputPin,
    R: OutputPin,
    P: SetDutyCycle,
{
    fn apply(
        &mut self,
        command: MotionCommand,
    ) -> Result<(), HardwareError> {
        let ((left_spin, left_speed), (right_spin, right_speed)) = self.wheel_plan(command);
        tracing::debug!(?command, "drive apply");
        let written = self
            .left
            .set(left_spin, left_speed)
            .and_then(|()| self.right.set(right_spin, right_speed));

        match written {
            Ok(()) => {
                self.last = command;
                Ok(())
            }
            Err(error) => {
                tracing::error!(?command, ?error, "drive write failed, coasting both sides");
                self.coast();
                Err(error)
            }
        }
    }

    fn current(&self) -> MotionCommand {
        self.last
    }
}
