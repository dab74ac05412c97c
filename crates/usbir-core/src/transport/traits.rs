//! HID report transport abstraction.
//!
//! Defines the `HidTransport` trait for exchanging fixed-size reports,
//! allowing different implementations (nusb, mock, etc.).

use thiserror::Error;

use crate::protocol::Packet;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Endpoint not found: type={ep_type}, direction={direction}")]
    EndpointNotFound { ep_type: String, direction: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transport already closed")]
    Closed,
}

/// Abstract report transport.
///
/// One call moves exactly one 65-byte packet. The report marker at byte 0 is
/// host-side only; implementations decide whether it goes over the wire.
pub trait HidTransport: Send + Sync {
    /// Write one packet to the device.
    fn write_packet(&self, packet: &Packet) -> Result<(), TransportError>;

    /// Read one packet from the device into `packet`.
    ///
    /// After a `Timeout` the request's reply is gone for good: a reply that
    /// arrives late must never be returned by a later read.
    fn read_packet(&self, packet: &mut Packet) -> Result<(), TransportError>;

    /// Write `request`, then read exactly one reply.
    fn round_trip(&self, request: &Packet) -> Result<Packet, TransportError> {
        self.write_packet(request)?;
        let mut reply = Packet::empty();
        self.read_packet(&mut reply)?;
        Ok(reply)
    }

    /// Release the device handle. Called once by the owning session.
    fn close(&self) {}
}
