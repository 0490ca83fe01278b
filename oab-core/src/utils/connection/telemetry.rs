//! Outbound turn notifications.
//!
//! The controller never waits on the network. On every turn it hands a short
//! JSON text to a `TelemetrySink`; what happens next (MQTT, WebSocket, serial
//! log) belongs to the host. Delivery is best effort: no acknowledgement, no
//! retry.

use alloc::string::String;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use serde::{Deserialize, Serialize};

use crate::utils::control::policy::Maneuver;

/// Pending telemetry payloads, drained by whatever task owns the connection.
pub static TELEMETRY_CHANNEL: Channel<CriticalSectionRawMutex, String, 4> = Channel::new();

/// Fire-and-forget text publisher.
pub trait TelemetrySink {
    fn publish(
        &mut self,
        payload: &str,
    );
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn publish(
        &mut self,
        payload: &str,
    ) {
        (**self).publish(payload)
    }
}

/// Sink for builds without a connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl TelemetrySink for NoTelemetry {
    fn publish(
        &mut self,
        _payload: &str,
    ) {
    }
}

/// Queues payloads on `TELEMETRY_CHANNEL`. A full queue drops the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelSink;

impl TelemetrySink for ChannelSink {
    fn publish(
        &mut self,
        payload: &str,
    ) {
        if TELEMETRY_CHANNEL.try_send(String::from(payload)).is_err() {
            tracing::warn!("telemetry queue full, dropping turn message");
        }
    }
}

/// Payload published on each turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    pub maneuver: Maneuver,
    pub left_cm: f32,
    pub right_cm: f32,
}
