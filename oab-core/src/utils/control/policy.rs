//! Reactive obstacle-avoidance policy.
//!
//! One control cycle reads the forward distance and maps it to a drive command:
//!
//! - clear (at or beyond the slow limit): forward at cruise speed
//! - caution (between the limits): forward at reduced speed
//! - blocked (below the blocked limit): stop, look left then right (returning
//!   the sensor to center after each look), then reverse if both sides are
//!   blocked, otherwise turn towards the side with more room. Equal room turns
//!   right. Reverse and turns run for the configured maneuver time and end in a
//!   stop.
//!
//! The cycle is blocking end to end and keeps no readings between cycles. A
//! sensor timeout reads as maximal clearance, so sensor faults never halt the
//! robot: the controller fails open and keeps advancing.

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use super::config::{AvoidanceConfig, ConfigError, Regime, Speeds, Thresholds};
use crate::utils::{
    connection::telemetry::{NoTelemetry, TelemetrySink, TurnEvent},
    controllers::{DirectionalActuator, DriveTrain, HardwareError, Heading, MotionCommand},
    sensors::{DistanceReading, RangeSensor},
};

/// What the robot decided to do in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    Advance,
    Creep,
    Reverse,
    TurnLeft,
    TurnRight,
}

impl Maneuver {
    /// The drive command that carries out this maneuver.
    pub fn command(
        self,
        speeds: &Speeds,
    ) -> MotionCommand {
        match self {
            Maneuver::Advance => MotionCommand::Forward(speeds.cruise),
            Maneuver::Creep => MotionCommand::Forward(speeds.reduced),
            Maneuver::Reverse => MotionCommand::Backward,
            Maneuver::TurnLeft => MotionCommand::TurnLeft,
            Maneuver::TurnRight => MotionCommand::TurnRight,
        }
    }

    pub fn is_turn(self) -> bool {
        matches!(self, Maneuver::TurnLeft | Maneuver::TurnRight)
    }
}

/// Side readings taken while blocked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanResult {
    pub left: DistanceReading,
    pub right: DistanceReading,
}

impl ScanResult {
    /// Pick the escape maneuver. Ties go right.
    pub fn choose(
        &self,
        thresholds: &Thresholds,
    ) -> Maneuver {
        if thresholds.is_blocked(self.left) && thresholds.is_blocked(self.right) {
            Maneuver::Reverse
        } else if self.right.centimeters() >= self.left.centimeters() {
            Maneuver::TurnRight
        } else {
            Maneuver::TurnLeft
        }
    }
}

/// Outcome of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub forward: DistanceReading,
    pub regime: Regime,
    pub scan: Option<ScanResult>,
    pub maneuver: Maneuver,
}

/// The sense-decide-act loop over a range sensor, its mount and the drive train.
///
/// `W` supplies the blocking wait for timed maneuvers. `T` receives a text
/// message on every turn when telemetry is enabled in the config.
pub struct AvoidancePolicy<S, A, D, W, T = NoTelemetry> {
    sensor: S,
    actuator: A,
    drive: D,
    delay: W,
    telemetry: T,
    config: AvoidanceConfig,
}

impl<S, A, D, W> AvoidancePolicy<S, A, D, W, NoTelemetry>
where
    S: RangeSensor,
    A: DirectionalActuator,
    D: DriveTrain,
    W: DelayNs,
{
    pub fn new(
        sensor: S,
        actuator: A,
        drive: D,
        delay: W,
        config: AvoidanceConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            sensor,
            actuator,
            drive,
            delay,
            telemetry: NoTelemetry,
            config,
        })
    }
}

impl<S, A, D, W, T> AvoidancePolicy<S, A, D, W, T>
where
    S: RangeSensor,
    A: DirectionalActuator,
    D: DriveTrain,
    W: DelayNs,
    T: TelemetrySink,
{
    /// Attach a telemetry sink. It is only used while `telemetry.enabled` is set.
    pub fn with_telemetry<T2: TelemetrySink>(
        self,
        telemetry: T2,
    ) -> AvoidancePolicy<S, A, D, W, T2> {
        AvoidancePolicy {
            sensor: self.sensor,
            actuator: self.actuator,
            drive: self.drive,
            delay: self.delay,
            telemetry,
            config: self.config,
        }
    }

    pub fn config(&self) -> &AvoidanceConfig {
        &self.config
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Run one sense-decide-act cycle.
    ///
    /// Only actuator and drive faults are returned; sensor faults have already
    /// been folded into an out-of-range reading. A mount left off center by an
    /// earlier failed cycle is brought back before the forward reading.
    pub fn run_cycle(&mut self) -> Result<CycleReport, HardwareError> {
        self.recenter()?;
        let forward = self.sensor.measure();
        let regime = self.config.thresholds.classify(forward);
        tracing::debug!(
            cm = forward.centimeters(),
            timed_out = forward.is_out_of_range(),
            ?regime,
            "forward reading"
        );

        let (maneuver, scan) = match regime {
            Regime::Clear => (self.advance(Maneuver::Advance)?, None),
            Regime::Caution => (self.advance(Maneuver::Creep)?, None),
            Regime::Blocked => {
                self.drive.apply(MotionCommand::Stop)?;
                let scan = self.scan()?;
                let maneuver = scan.choose(&self.config.thresholds);
                self.escape(maneuver, &scan)?;
                (maneuver, Some(scan))
            }
        };

        tracing::info!(?regime, ?maneuver, "cycle complete");
        Ok(CycleReport {
            forward,
            regime,
            scan,
            maneuver,
        })
    }

    /// Run cycles forever. Hardware faults abort the current cycle only.
    pub fn run(&mut self) -> ! {
        loop {
            if let Err(error) = self.run_cycle() {
                tracing::error!(?error, "control cycle aborted");
            }
        }
    }

    fn recenter(&mut self) -> Result<(), HardwareError> {
        let heading = self.actuator.heading();
        if heading != Heading::Center {
            tracing::warn!(?heading, "sensor mount off center, re-homing");
            self.actuator.point(Heading::Center)?;
        }
        Ok(())
    }

    fn advance(
        &mut self,
        maneuver: Maneuver,
    ) -> Result<Maneuver, HardwareError> {
        self.drive.apply(maneuver.command(&self.config.speeds))?;
        Ok(maneuver)
    }

    fn scan(&mut self) -> Result<ScanResult, HardwareError> {
        let left = self.look(Heading::Left)?;
        let right = self.look(Heading::Right)?;
        tracing::debug!(left_cm = left.centimeters(), right_cm = right.centimeters(), "scan");
        Ok(ScanResult { left, right })
    }

    /// Aim the sensor, measure, and bring it back to center.
    fn look(
        &mut self,
        heading: Heading,
    ) -> Result<DistanceReading, HardwareError> {
        self.actuator.point(heading)?;
        let reading = self.sensor.measure();
        self.actuator.point(Heading::Center)?;
        Ok(reading)
    }

    /// Run a timed reverse or turn, then stop.
    fn escape(
        &mut self,
        maneuver: Maneuver,
        scan: &ScanResult,
    ) -> Result<(), HardwareError> {
        self.drive.apply(maneuver.command(&self.config.speeds))?;
        if maneuver.is_turn() {
            self.notify(maneuver, scan);
        }
        self.delay.delay_ms(self.config.timing.maneuver_ms);
        self.drive.apply(MotionCommand::Stop)
    }

    fn notify(
        &mut self,
        maneuver: Maneuver,
        scan: &ScanResult,
    ) {
        if !self.config.telemetry.enabled {
            return;
        }
        let event = TurnEvent {
            maneuver,
            left_cm: scan.left.centimeters(),
            right_cm: scan.right.centimeters(),
        };
        match serde_json::to_string(&event) {
            Ok(payload) => self.telemetry.publish(&payload),
            Err(error) => tracing::warn!(?error, "could not encode turn event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(
        left: f32,
        right: f32,
    ) -> ScanResult {
        ScanResult {
            left: DistanceReading::Measured(left),
            right: DistanceReading::Measured(right),
        }
    }

    #[test]
    fn both_sides_blocked_reverses() {
        let t = Thresholds::default();
        assert_eq!(scan(8.0, 14.9).choose(&t), Maneuver::Reverse);
    }

    #[test]
    fn one_open_side_wins_even_if_the_other_is_blocked() {
        let t = Thresholds::default();
        assert_eq!(scan(8.0, 22.0).choose(&t), Maneuver::TurnRight);
        assert_eq!(scan(30.0, 3.0).choose(&t), Maneuver::TurnLeft);
    }

    #[test]
    fn equal_clearance_turns_right() {
        let t = Thresholds::default();
        assert_eq!(scan(40.0, 40.0).choose(&t), Maneuver::TurnRight);
        assert_eq!(scan(15.0, 15.0).choose(&t), Maneuver::TurnRight);
    }

    #[test]
    fn timed_out_side_counts_as_open() {
        let t = Thresholds::default();
        let s = ScanResult {
            left: DistanceReading::OutOfRange,
            right: DistanceReading::Measured(100.0),
        };
        assert_eq!(s.choose(&t), Maneuver::TurnLeft);
    }

    #[test]
    fn maneuvers_map_to_configured_speeds() {
        let speeds = Speeds::default();
        assert_eq!(Maneuver::Advance.command(&speeds), MotionCommand::Forward(150));
        assert_eq!(Maneuver::Creep.command(&speeds), MotionCommand::Forward(100));
        assert_eq!(Maneuver::Reverse.command(&speeds), MotionCommand::Backward);
        assert!(Maneuver::TurnLeft.is_turn());
        assert!(!Maneuver::Reverse.is_turn());
    }
}
