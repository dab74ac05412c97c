//! Event system for UI decoupling.
//!
//! Allows front ends to subscribe to session events without tight coupling
//! to the protocol logic.

use std::fmt;

use crate::protocol::constants::command_name;
use crate::state::CaptureState;

/// Events emitted by an IR session.
#[derive(Debug, Clone)]
pub enum IrEvent {
    /// Capture state changed.
    StateChanged { from: CaptureState, to: CaptureState },
    /// Progress of a multi-packet operation.
    Progress {
        operation: String,
        current: u64,
        total: u64,
    },
    /// Packet sent/received.
    Packet {
        direction: PacketDirection,
        command: u8,
        data: Vec<u8>,
    },
    /// Captured waveform fully read back.
    CaptureRead { pairs: usize, replies: usize },
    /// Device accepted the trigger.
    Transmitted { pairs: usize, frequency: u32 },
    /// Operation failed.
    Error { message: String },
}

/// Packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Device
    Rx, // Device -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait IrObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &IrEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl IrObserver for NullObserver {
    fn on_event(&self, _event: &IrEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl IrObserver for TracingObserver {
    fn on_event(&self, event: &IrEvent) {
        match event {
            IrEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Capture state changed");
            }
            IrEvent::Progress {
                operation,
                current,
                total,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    100
                };
                tracing::debug!(operation = %operation, progress = %format!("{}%", pct), "Progress");
            }
            IrEvent::Packet {
                direction,
                command,
                data,
            } => {
                tracing::trace!(
                    dir = %direction,
                    cmd = %command_name(*command),
                    head = ?&data[..data.len().min(8)],
                    "HID report"
                );
            }
            IrEvent::CaptureRead { pairs, replies } => {
                tracing::info!(pairs, replies, "Capture read complete");
            }
            IrEvent::Transmitted { pairs, frequency } => {
                tracing::info!(pairs, frequency, "Transmit complete");
            }
            IrEvent::Error { message } => {
                tracing::error!("Error: {}", message);
            }
        }
    }
}
