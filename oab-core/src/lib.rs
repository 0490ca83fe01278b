//! Core drivers and avoidance policy for the Obstacle-Avoidance Bot on no-std
//! embedded platforms.
//!
//! For a runnable host simulation, see `oab-app/mock-mcu`.
#![no_std]

extern crate alloc;

pub mod utils;
