//! Ultrasonic ranging for the Obstacle-Avoidance Bot.
//!
//! `RangeSensor` is the seam the avoidance policy reads distances through.
//! `Hcsr04` is the blocking backend for HC-SR04 style modules: it bit-bangs the
//! trigger pulse, then busy-polls the echo line and reads both edges off a
//! monotonic [`Clock`]. Both the pulse width and the echo budget are elapsed
//! time, including the cost of the pin reads.
//!
//! A missing echo is not an error. It is reported as [`DistanceReading::OutOfRange`],
//! which compares as farther away than any obstacle threshold, so a disconnected
//! sensor lets the robot keep driving (fail-open).

use embassy_time::{Duration, Instant};
use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, InputPin, OutputPin},
};

/// Distance reported for a missing echo, larger than any obstacle threshold.
pub const OUT_OF_RANGE_CM: f32 = 999.0;
/// Speed of sound in air, in centimeters per microsecond.
pub const SOUND_SPEED_CM_PER_US: f32 = 0.0343;
/// Upper bound on waiting for, and timing, the echo pulse.
pub const ECHO_TIMEOUT_US: u32 = 30_000;

/// Low time before the trigger pulse.
const TRIGGER_SETTLE_US: u32 = 2;
/// High time of the trigger pulse.
const TRIGGER_PULSE_US: u32 = 10;

/// A single distance sample, produced fresh on every measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceReading {
    /// Echo received; distance in centimeters.
    Measured(f32),
    /// No echo within [`ECHO_TIMEOUT_US`].
    OutOfRange,
}

impl DistanceReading {
    /// Convert a round-trip echo time into a one-way distance.
    pub fn from_echo_us(echo_us: u32) -> Self {
        DistanceReading::Measured(echo_us as f32 * SOUND_SPEED_CM_PER_US / 2.0)
    }

    /// Distance in centimeters, [`OUT_OF_RANGE_CM`] for a missing echo.
    pub fn centimeters(self) -> f32 {
        match self {
            DistanceReading::Measured(cm) => cm,
            DistanceReading::OutOfRange => OUT_OF_RANGE_CM,
        }
    }

    pub fn is_out_of_range(self) -> bool {
        matches!(self, DistanceReading::OutOfRange)
    }
}

/// Anything that can report the distance to the nearest object in front of it.
pub trait RangeSensor {
    fn measure(&mut self) -> DistanceReading;
}

impl<T: RangeSensor + ?Sized> RangeSensor for &mut T {
    fn measure(&mut self) -> DistanceReading {
        (**self).measure()
    }
}

/// Monotonic time source used to time the echo pulse.
pub trait Clock {
    fn now(&mut self) -> Instant;
}

/// The embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> Instant {
        Instant::now()
    }
}

/// Blocking HC-SR04 driver over a trigger output, an echo input, a delay
/// source for the trigger pulse and a clock for the echo.
pub struct Hcsr04<Trig, Echo, D, C = SystemClock> {
    trigger: Trig,
    echo: Echo,
    delay: D,
    clock: C,
}

impl<Trig, Echo, D> Hcsr04<Trig, Echo, D, SystemClock>
where
    Trig: OutputPin,
    Echo: InputPin,
    D: DelayNs,
{
    pub fn new(
        trigger: Trig,
        echo: Echo,
        delay: D,
    ) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock: SystemClock,
        }
    }
}

impl<Trig, Echo, D, C> Hcsr04<Trig, Echo, D, C>
where
    Trig: OutputPin,
    Echo: InputPin,
    D: DelayNs,
    C: Clock,
{
    /// Time the echo against another clock, e.g. a hardware timer.
    pub fn with_clock<C2: Clock>(
        self,
        clock: C2,
    ) -> Hcsr04<Trig, Echo, D, C2> {
        Hcsr04 {
            trigger: self.trigger,
            echo: self.echo,
            delay: self.delay,
            clock,
        }
    }

    /// Emit the 10 µs trigger pulse, preceded by a 2 µs low reset.
    fn fire_trigger(&mut self) -> Result<(), ErrorKind> {
        self.trigger.set_low().map_err(|e| e.kind())?;
        self.delay.delay_us(TRIGGER_SETTLE_US);
        self.trigger.set_high().map_err(|e| e.kind())?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger.set_low().map_err(|e| e.kind())
    }

    /// Width of the echo pulse in microseconds.
    ///
    /// Waiting for the rising edge and timing the high phase share one
    /// [`ECHO_TIMEOUT_US`] budget, measured from the end of the trigger pulse.
    /// Returns `Ok(None)` once the budget runs out.
    pub fn echo_width_us(&mut self) -> Result<Option<u32>, ErrorKind> {
        let budget = Duration::from_micros(ECHO_TIMEOUT_US as u64);
        let start = self.clock.now();

        while !self.echo.is_high().map_err(|e| e.kind())? {
            if self.clock.now().saturating_duration_since(start) >= budget {
                return Ok(None);
            }
        }
        let rise = self.clock.now();

        while self.echo.is_high().map_err(|e| e.kind())? {
            if self.clock.now().saturating_duration_since(start) >= budget {
                return Ok(None);
            }
        }
        let width = self.clock.now().saturating_duration_since(rise);
        Ok(Some(width.as_micros() as u32))
    }

    fn ping(&mut self) -> Result<Option<u32>, ErrorKind> {
        self.fire_trigger()?;
        self.echo_width_us()
    }
}

impl<Trig, Echo, D, C> RangeSensor for Hcsr04<Trig, Echo, D, C>
where
    Trig: OutputPin,
    Echo: InputPin,
    D: DelayNs,
    C: Clock,
{
    fn measure(&mut self) -> DistanceReading {
        match self.ping() {
            Ok(Some(width)) if width > 0 => {
                let reading = DistanceReading::from_echo_us(width);
                tracing::debug!(echo_us = width, cm = reading.centimeters(), "echo received");
                reading
            }
            Ok(_) => {
                tracing::warn!("no echo within {} us, reporting out of range", ECHO_TIMEOUT_US);
                DistanceReading::OutOfRange
            }
            Err(kind) => {
                tracing::error!(?kind, "range sensor pin fault, reporting out of range");
                DistanceReading::OutOfRange
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_time_converts_to_one_way_distance() {
        // 583 µs round trip is roughly 10 cm each way
        let cm = DistanceReading::from_echo_us(583).centimeters();
        assert!((cm - 9.998).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_exceeds_any_realistic_threshold() {
        assert_eq!(DistanceReading::OutOfRange.centimeters(), OUT_OF_RANGE_CM);
        assert!(DistanceReading::OutOfRange.centimeters() > 400.0);
        assert!(DistanceReading::OutOfRange.is_out_of_range());
        assert!(!DistanceReading::Measured(12.0).is_out_of_range());
    }

    #[test]
    fn longest_timed_echo_stays_below_sentinel() {
        let cm = DistanceReading::from_echo_us(ECHO_TIMEOUT_US).centimeters();
        assert!(cm < OUT_OF_RANGE_CM);
    }
}
