//! Sensor drivers for the Obstacle-Avoidance Bot.
//!
//! - `ultrasonic`: HC-SR04 echo timing and the `RangeSensor` abstraction.

pub mod ultrasonic;

pub use ultrasonic::{Clock, DistanceReading, Hcsr04, RangeSensor, SystemClock, OUT_OF_RANGE_CM};
