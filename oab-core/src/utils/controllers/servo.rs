//! Pivoting sensor mount driven by a hobby servo.
//!
//! The ultrasonic sensor sits on a servo that can face forward, full left or
//! full right. There is no position feedback: after each move the driver sleeps
//! for a fixed settle delay and the next reading is trusted as-is. A delay that
//! is too short for the mechanics silently yields a reading from the wrong
//! direction.

use core::fmt;

use embassy_time::Duration;
use embedded_hal::{delay::DelayNs, pwm::SetDutyCycle};
use serde::{Deserialize, Serialize};

use super::HardwareError;

const DEFAULT_MIN_PULSE_WIDTH_US: u32 = 500;
const DEFAULT_MAX_PULSE_WIDTH_US: u32 = 2400;
const DEFAULT_MAX_DEGREE_ROTATION: f32 = 180.0;
/// 50 Hz servo frame.
const REFRESH_INTERVAL_US: u32 = 20_000;

/// Commanded direction of the sensor mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    #[default]
    Center,
    Left,
    Right,
}

impl Heading {
    /// Servo angle for this heading (0° = full right, 180° = full left).
    pub const fn angle(self) -> f32 {
        match self {
            Heading::Center => 90.0,
            Heading::Left => 180.0,
            Heading::Right => 0.0,
        }
    }
}

/// A mount that can aim the range sensor.
///
/// `point` blocks until the mount is expected to have arrived.
pub trait DirectionalActuator {
    fn point(
        &mut self,
        heading: Heading,
    ) -> Result<(), HardwareError>;

    /// Last heading successfully commanded.
    fn heading(&self) -> Heading;
}

impl<T: DirectionalActuator + ?Sized> DirectionalActuator for &mut T {
    fn point(
        &mut self,
        heading: Heading,
    ) -> Result<(), HardwareError> {
        (**self).point(heading)
    }

    fn heading(&self) -> Heading {
        (**self).heading()
    }
}

/// Settle delays after a move. Swinging out to a side travels 90° and needs
/// longer than the return to center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    pub far: Duration,
    pub center: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            far: Duration::from_millis(500),
            center: Duration::from_millis(100),
        }
    }
}

pub struct ServoBuilder<P, D> {
    pwm: P,
    delay: D,
    period_us: u32,
    min_pulse_width_us: u32,
    max_pulse_width_us: u32,
    max_degree_rotation: f32,
    settle: SettleDelays,
}

impl<P, D> ServoBuilder<P, D>
where
    P: SetDutyCycle,
    D: DelayNs,
{
    pub fn new(
        pwm: P,
        delay: D,
    ) -> Self {
        Self {
            pwm,
            delay,
            period_us: REFRESH_INTERVAL_US,
            min_pulse_width_us: DEFAULT_MIN_PULSE_WIDTH_US,
            max_pulse_width_us: DEFAULT_MAX_PULSE_WIDTH_US,
            max_degree_rotation: DEFAULT_MAX_DEGREE_ROTATION,
            settle: SettleDelays::default(),
        }
    }

    pub fn set_min_pulse_width(
        mut self,
        us: u32,
    ) -> Self {
        self.min_pulse_width_us = us;
        self
    }

    pub fn set_max_pulse_width(
        mut self,
        us: u32,
    ) -> Self {
        self.max_pulse_width_us = us;
        self
    }

    pub fn set_max_degree_rotation(
        mut self,
        degree: f32,
    ) -> Self {
        self.max_degree_rotation = degree;
        self
    }

    pub fn set_settle_delays(
        mut self,
        settle: SettleDelays,
    ) -> Self {
        self.settle = settle;
        self
    }

    /// Check the calibration and build the servo. The mount is not moved until
    /// the first `point` or `home`.
    pub fn build(self) -> Result<Servo<P, D>, ServoConfigError> {
        if self.min_pulse_width_us > self.max_pulse_width_us {
            return Err(ServoConfigError::PulseRange {
                min_us: self.min_pulse_width_us,
                max_us: self.max_pulse_width_us,
            });
        }
        if !(self.max_degree_rotation.is_finite() && self.max_degree_rotation > 0.0) {
            return Err(ServoConfigError::Rotation(self.max_degree_rotation));
        }
        Ok(Servo {
            pwm: self.pwm,
            delay: self.delay,
            period_us: self.period_us,
            min_pulse_width_us: self.min_pulse_width_us,
            max_pulse_width_us: self.max_pulse_width_us,
            max_degree_rotation: self.max_degree_rotation,
            settle: self.settle,
            heading: Heading::Center,
        })
    }
}

/// Servo calibration that cannot map an angle to a pulse width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoConfigError {
    /// Minimum pulse width above the maximum.
    PulseRange { min_us: u32, max_us: u32 },
    /// Rotation range that is zero, negative or not finite.
    Rotation(f32),
}

impl fmt::Display for ServoConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ServoConfigError::PulseRange { min_us, max_us } => {
                write!(f, "min pulse width {} us exceeds max pulse width {} us", min_us, max_us)
            }
            ServoConfigError::Rotation(degree) => {
                write!(f, "rotation range must be a positive angle, got {}", degree)
            }
        }
    }
}

impl core::error::Error for ServoConfigError {}

/// Position servo on a PWM output whose period is one servo frame.
pub struct Servo<P, D> {
    pwm: P,
    delay: D,
    period_us: u32,
    min_pulse_width_us: u32,
    max_pulse_width_us: u32,
    max_degree_rotation: f32,
    settle: SettleDelays,
    heading: Heading,
}

impl<P, D> Servo<P, D>
where
    P: SetDutyCycle,
    D: DelayNs,
{
    /// Face forward and wait for the mount to get there.
    pub fn home(&mut self) -> Result<(), HardwareError> {
        self.point(Heading::Center)
    }

    /// Pulse width for the given angle, clamped to the calibrated range.
    pub fn pulse_width_us(
        &self,
        degree: f32,
    ) -> u32 {
        let degree = degree.clamp(0.0, self.max_degree_rotation);
        let span = (self.max_pulse_width_us - self.min_pulse_width_us) as f32;
        let pulse = self.min_pulse_width_us as f32 + degree / self.max_degree_rotation * span;
        (libm::roundf(pulse) as u32).min(self.max_pulse_width_us)
    }

    fn rotate(
        &mut self,
        degree: f32,
    ) -> Result<(), HardwareError> {
        let pulse_us = self.pulse_width_us(degree);
        let max_duty = self.pwm.max_duty_cycle();
        let duty = duty_for_pulse(pulse_us, self.period_us, max_duty);
        tracing::debug!(degree, pulse_us, duty, "servo rotate");
        self.pwm.set_duty_cycle(duty).map_err(HardwareError::pwm)
    }
}

impl<P, D> DirectionalActuator for Servo<P, D>
where
    P: SetDutyCycle,
    D: DelayNs,
{
    fn point(
        &mut self,
        heading: Heading,
    ) -> Result<(), HardwareError> {
        self.rotate(heading.angle())?;
        let settle = match heading {
            Heading::Center => self.settle.center,
            Heading::Left | Heading::Right => self.settle.far,
        };
        self.delay.delay_ms(settle.as_millis() as u32);
        self.heading = heading;
        Ok(())
    }

    fn heading(&self) -> Heading {
        self.heading
    }
}

/// Duty cycle that holds the output high for `pulse_us` of every `period_us`.
fn duty_for_pulse(
    pulse_us: u32,
    period_us: u32,
    max_duty: u16,
) -> u16 {
    let duty = libm::roundf(pulse_us as f32 / period_us as f32 * max_duty as f32);
    duty.min(max_duty as f32) as u16
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;

    struct NullPwm;

    impl embedded_hal::pwm::ErrorType for NullPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for NullPwm {
        fn max_duty_cycle(&self) -> u16 {
            u16::MAX
        }

        fn set_duty_cycle(
            &mut self,
            _duty: u16,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct NullDelay;

    impl DelayNs for NullDelay {
        fn delay_ns(
            &mut self,
            _ns: u32,
        ) {
        }
    }

    #[test]
    fn headings_map_to_distinct_angles() {
        assert_eq!(Heading::Center.angle(), 90.0);
        assert_eq!(Heading::Left.angle(), 180.0);
        assert_eq!(Heading::Right.angle(), 0.0);
        assert_eq!(Heading::default(), Heading::Center);
    }

    #[test]
    fn builder_rejects_calibration_it_cannot_map() {
        let inverted = ServoBuilder::new(NullPwm, NullDelay)
            .set_min_pulse_width(2400)
            .set_max_pulse_width(500)
            .build();
        assert!(matches!(
            inverted,
            Err(ServoConfigError::PulseRange {
                min_us: 2400,
                max_us: 500
            })
        ));

        for degree in [0.0, -90.0, f32::NAN, f32::INFINITY] {
            let result = ServoBuilder::new(NullPwm, NullDelay)
                .set_max_degree_rotation(degree)
                .build();
            assert!(matches!(result, Err(ServoConfigError::Rotation(_))));
        }

        let fixed = ServoBuilder::new(NullPwm, NullDelay)
            .set_min_pulse_width(1500)
            .set_max_pulse_width(1500)
            .build();
        assert!(fixed.is_ok());
    }

    #[test]
    fn pulse_of_one_and_a_half_ms_is_seven_and_a_half_percent_duty() {
        assert_eq!(duty_for_pulse(1500, 20_000, 10_000), 750);
        assert_eq!(duty_for_pulse(20_000, 20_000, 4095), 4095);
        assert_eq!(duty_for_pulse(0, 20_000, 4095), 0);
    }
}
