//! IR Session - capture/transmit orchestrator.
//!
//! Every operation is a series of strict write-then-read round trips. The
//! protocol carries no request identifiers, so a session owns its transport
//! exclusively and all operations take `&mut self`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::capture::{CaptureAccumulator, CaptureStep};
use crate::config::SessionConfig;
use crate::events::{IrEvent, IrObserver, PacketDirection, TracingObserver};
use crate::protocol::constants::*;
use crate::protocol::{
    Packet, ProtocolError, decode_response, encode_begin_capture, encode_end_capture,
    encode_read_chunk, encode_transmit_chunk, encode_trigger_transmit,
};
use crate::state::CaptureState;
use crate::transport::{HidTransport, NusbTransport, TransportError, find_device};
use crate::waveform::{Waveform, WaveformError, plan_chunks};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid waveform: {0}")]
    Waveform(#[from] WaveformError),

    #[error("Frequency {frequency} Hz out of range 25000..=50000")]
    FrequencyOutOfRange { frequency: u32 },

    #[error("{operation} is not valid in state {state}")]
    InvalidSessionState {
        operation: &'static str,
        state: CaptureState,
    },

    #[error("Device rejected transmit chunk at pair {start_index} (status 0x{status:02X})")]
    TransmitChunkRejected { start_index: usize, status: u8 },

    #[error("Device rejected transmit trigger (status 0x{status:02X})")]
    TransmitRejected { status: u8 },

    #[error("Capture read did not terminate within {rounds} round trips")]
    CaptureReadLimitExceeded { rounds: usize },
}

impl SessionError {
    /// Whether repeating the whole operation from a clean state may succeed.
    ///
    /// Only I/O failures qualify; protocol and validation errors mean the
    /// session or the input must change first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(e) if !matches!(
                e,
                TransportError::DeviceNotFound { .. } | TransportError::Closed
            )
        )
    }
}

/// Session with a USB-IR transceiver.
pub struct IrSession<T: HidTransport, O: IrObserver = TracingObserver> {
    transport: Option<T>,
    observer: Arc<O>,
    state: CaptureState,
    max_read_rounds: usize,
}

impl IrSession<NusbTransport, TracingObserver> {
    /// Discover the device described by `config` and open it.
    #[instrument(skip(config))]
    pub fn open(config: &SessionConfig) -> Result<Self, SessionError> {
        let device_info =
            find_device(config.vendor_id, config.product_id).map_err(|e| match e {
                TransportError::DeviceNotFound { vid, pid } => {
                    SessionError::DeviceNotFound { vid, pid }
                }
                other => other.into(),
            })?;
        let transport = NusbTransport::open(&device_info, config.interface, config.timeout())?;
        Ok(Self::new(transport, config))
    }
}

impl<T: HidTransport> IrSession<T, TracingObserver> {
    /// Create a session over an already-open transport.
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        Self::with_observer(transport, config, Arc::new(TracingObserver))
    }
}

impl<T: HidTransport, O: IrObserver> IrSession<T, O> {
    /// Create a session with a custom observer.
    pub fn with_observer(transport: T, config: &SessionConfig, observer: Arc<O>) -> Self {
        Self {
            transport: Some(transport),
            observer,
            state: CaptureState::Idle,
            max_read_rounds: config.max_read_rounds,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// Start recording at `frequency`. Valid from any state.
    #[instrument(skip(self))]
    pub fn start_capture(&mut self, frequency: u32) -> Result<(), SessionError> {
        check_frequency(frequency)?;

        let reply = self.exchange(&encode_begin_capture(
            frequency,
            CAPTURE_STOP_FLAG,
            CAPTURE_STOP_ON_TICKS,
            CAPTURE_STOP_OFF_TICKS,
        ))?;
        decode_response(CMD_BEGIN_CAPTURE, &reply)?;

        self.goto_state(CaptureState::Capturing);
        Ok(())
    }

    /// Stop recording. The device must echo the command with status 0.
    #[instrument(skip(self))]
    pub fn stop_capture(&mut self) -> Result<(), SessionError> {
        let reply = self.exchange(&encode_end_capture())?;
        decode_response(CMD_END_CAPTURE, &reply)?.expect_ok()?;

        self.goto_state(CaptureState::Captured);
        Ok(())
    }

    /// Read the recorded waveform back. Only valid after `stop_capture`.
    #[instrument(skip(self))]
    pub fn read_capture(&mut self) -> Result<Waveform, SessionError> {
        if !self.state.can_read() {
            return Err(SessionError::InvalidSessionState {
                operation: "ReadCapture",
                state: self.state,
            });
        }

        let request = encode_read_chunk();
        let mut acc = CaptureAccumulator::new();

        loop {
            if acc.replies() >= self.max_read_rounds {
                warn!(rounds = acc.replies(), "Capture read limit reached");
                self.emit(IrEvent::Error {
                    message: format!("capture read exceeded {} round trips", self.max_read_rounds),
                });
                return Err(SessionError::CaptureReadLimitExceeded {
                    rounds: acc.replies(),
                });
            }

            let reply = self.exchange(&request)?;
            let view = decode_response(CMD_READ_CHUNK, &reply)?;
            let chunk = view.as_read_chunk()?;
            let total = chunk.total_pairs() as u64;

            match acc.push(chunk)? {
                CaptureStep::Continue => {
                    self.emit(IrEvent::Progress {
                        operation: "Read capture".to_string(),
                        current: acc.pairs_received() as u64,
                        total,
                    });
                }
                CaptureStep::Complete(waveform) => {
                    self.emit(IrEvent::CaptureRead {
                        pairs: waveform.len(),
                        replies: acc.replies(),
                    });
                    return Ok(waveform);
                }
            }
        }
    }

    /// Load `waveform` into the device chunk by chunk, then fire it.
    ///
    /// Chunks already accepted are not rolled back on failure; the device is
    /// left partially loaded and the whole transmit must be repeated.
    #[instrument(skip(self, waveform), fields(pairs = waveform.len()))]
    pub fn transmit(&mut self, waveform: &Waveform, frequency: u32) -> Result<(), SessionError> {
        check_frequency(frequency)?;
        let total = waveform.total_pairs()?;

        let plan = plan_chunks(waveform, MAX_CHUNK_PAIRS);
        let chunks = plan.total() as u64;

        for (n, (start, chunk)) in plan.enumerate() {
            let reply = self.exchange(&encode_transmit_chunk(total, start as u16, chunk))?;
            let status = decode_response(CMD_TRANSMIT_CHUNK, &reply)?.status();
            if status != STATUS_OK {
                return Err(SessionError::TransmitChunkRejected {
                    start_index: start,
                    status,
                });
            }

            debug!(start, len = chunk.len(), total, "Chunk loaded");
            self.emit(IrEvent::Progress {
                operation: "Transmit".to_string(),
                current: n as u64 + 1,
                total: chunks,
            });
        }

        let reply = self.exchange(&encode_trigger_transmit(frequency, total))?;
        let status = decode_response(CMD_TRIGGER_TRANSMIT, &reply)?.status();
        if status != STATUS_OK {
            return Err(SessionError::TransmitRejected { status });
        }

        self.emit(IrEvent::Transmitted {
            pairs: waveform.len(),
            frequency,
        });
        Ok(())
    }

    /// Release the transport. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
            info!(state = %self.state, "Session closed");
        }
    }

    /// One write-then-read round trip, with packet events.
    fn exchange(&self, request: &Packet) -> Result<Packet, TransportError> {
        let transport = self.transport.as_ref().ok_or(TransportError::Closed)?;

        let reply = transport.round_trip(request)?;
        debug!(
            cmd = command_name(request.command()),
            reply = command_name(reply.command()),
            "Round trip"
        );

        self.emit(IrEvent::Packet {
            direction: PacketDirection::Tx,
            command: request.command(),
            data: request.report().to_vec(),
        });
        self.emit(IrEvent::Packet {
            direction: PacketDirection::Rx,
            command: reply.command(),
            data: reply.report().to_vec(),
        });

        Ok(reply)
    }

    fn goto_state(&mut self, to: CaptureState) {
        let from = self.state;
        self.state = to;
        self.emit(IrEvent::StateChanged { from, to });
    }

    fn emit(&self, event: IrEvent) {
        self.observer.on_event(&event);
    }
}

impl<T: HidTransport, O: IrObserver> Drop for IrSession<T, O> {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_frequency(frequency: u32) -> Result<(), SessionError> {
    if is_valid_frequency(frequency) {
        Ok(())
    } else {
        Err(SessionError::FrequencyOutOfRange { frequency })
    }
}
