//! UsbIr-Core: protocol driver for USB infrared remote transceivers.
//!
//! This crate captures IR waveforms from, and transmits IR waveforms through,
//! a USB HID infrared transceiver. The device speaks a fixed 65-byte
//! request/response protocol, so long waveforms are split into chunks on the
//! way out and reassembled from chunks on the way in.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Command codes, packet layout, encode/decode
//! - **Waveform**: Duration pairs and outbound chunk planning
//! - **Capture**: Reassembly of captured waveforms
//! - **Transport**: HID report abstraction (nusb, mock)
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: Capture/transmit state machine
//!
//! # Example
//!
//! ```no_run
//! use usbir_core::{IrSession, SessionConfig, Waveform};
//!
//! let config = SessionConfig::default();
//! let mut session = IrSession::open(&config).expect("no device");
//!
//! session.start_capture(config.frequency).expect("start failed");
//! // ... point a remote at the receiver ...
//! session.stop_capture().expect("stop failed");
//! let waveform: Waveform = session.read_capture().expect("read failed");
//!
//! session.transmit(&waveform, config.frequency).expect("transmit failed");
//! ```

pub mod capture;
pub mod config;
pub mod events;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;
pub mod waveform;

// Re-exports for convenience
pub use capture::{CaptureAccumulator, CaptureStep};
pub use config::SessionConfig;
pub use events::{IrEvent, IrObserver, NullObserver, PacketDirection, TracingObserver};
pub use protocol::{Packet, ProtocolError};
pub use session::{IrSession, SessionError};
pub use state::CaptureState;
pub use transport::{HidTransport, MockTransport, NusbTransport, TransportError};
pub use waveform::{ChunkPlan, DurationPair, Waveform, WaveformError, plan_chunks};
