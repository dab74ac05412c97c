//! Fixed-size command packets.
//!
//! Every exchange with the device is one 65-byte report out and one 65-byte
//! report back. Byte 0 is the report marker (always 0), byte 1 the command,
//! the rest command-specific payload. Multi-byte fields are big-endian.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

use super::constants::*;
use crate::waveform::DurationPair;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Command mismatch: expected 0x{expected:02X}, device echoed 0x{actual:02X}")]
    CommandMismatch { expected: u8, actual: u8 },

    #[error("Unexpected status 0x{status:02X} for command 0x{command:02X}")]
    UnexpectedStatus { command: u8, status: u8 },

    #[error("Chunk count {count} exceeds packet capacity of {max} pairs")]
    ChunkCountOutOfRange { count: u8, max: usize },
}

/// One 65-byte report buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet([u8; PACKET_SIZE]);

impl Packet {
    /// Zeroed packet carrying `command`.
    pub fn new(command: u8) -> Self {
        let mut buf = [0u8; PACKET_SIZE];
        buf[OFFSET_COMMAND] = command;
        Self(buf)
    }

    /// Zeroed buffer to read a response into.
    pub fn empty() -> Self {
        Self([0u8; PACKET_SIZE])
    }

    pub fn from_bytes(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn command(&self) -> u8 {
        self.0[OFFSET_COMMAND]
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; PACKET_SIZE] {
        &mut self.0
    }

    /// The bytes that travel over the wire (report marker stripped).
    pub fn report(&self) -> &[u8] {
        &self.0[OFFSET_COMMAND..]
    }

    pub fn report_mut(&mut self) -> &mut [u8] {
        &mut self.0[OFFSET_COMMAND..]
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        BigEndian::write_u16(&mut self.0[offset..offset + 2], value);
    }

    fn get_u16(&self, offset: usize) -> u16 {
        BigEndian::read_u16(&self.0[offset..offset + 2])
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet(0x{:02X} {}, {:02X?})",
            self.command(),
            command_name(self.command()),
            &self.0[OFFSET_STATUS..OFFSET_CHUNK_DATA]
        )
    }
}

// ============================================================================
// Encoding (Host -> Device)
// ============================================================================

/// Begin recording at `frequency`, with the given auto-stop parameters.
///
/// The frequency field is 16 bits wide; callers validate the range first.
pub fn encode_begin_capture(
    frequency: u32,
    stop_flag: u8,
    on_delay_ticks: u16,
    off_delay_ticks: u16,
) -> Packet {
    let mut p = Packet::new(CMD_BEGIN_CAPTURE);
    p.put_u16(2, frequency as u16);
    p.0[4] = stop_flag;
    p.put_u16(5, on_delay_ticks);
    p.put_u16(7, off_delay_ticks);
    p
}

pub fn encode_end_capture() -> Packet {
    Packet::new(CMD_END_CAPTURE)
}

pub fn encode_read_chunk() -> Packet {
    Packet::new(CMD_READ_CHUNK)
}

/// Load one chunk of an outbound waveform into the device.
///
/// Panics if `chunk` holds more than [`MAX_CHUNK_PAIRS`] pairs.
pub fn encode_transmit_chunk(
    total_pairs: u16,
    start_pair_index: u16,
    chunk: &[DurationPair],
) -> Packet {
    assert!(
        chunk.len() <= MAX_CHUNK_PAIRS,
        "transmit chunk of {} pairs exceeds {MAX_CHUNK_PAIRS}",
        chunk.len()
    );

    let mut p = Packet::new(CMD_TRANSMIT_CHUNK);
    p.put_u16(OFFSET_TOTAL_PAIRS, total_pairs);
    p.put_u16(OFFSET_START_INDEX, start_pair_index);
    p.0[OFFSET_CHUNK_COUNT] = chunk.len() as u8;
    for (i, pair) in chunk.iter().enumerate() {
        let at = OFFSET_CHUNK_DATA + i * PAIR_SIZE;
        pair.write_to(&mut p.0[at..at + PAIR_SIZE]);
    }
    p
}

pub fn encode_trigger_transmit(frequency: u32, total_pairs: u16) -> Packet {
    let mut p = Packet::new(CMD_TRIGGER_TRANSMIT);
    p.put_u16(2, frequency as u16);
    p.put_u16(4, total_pairs);
    p
}

// ============================================================================
// Decoding (Device -> Host)
// ============================================================================

/// Typed, borrowed view of a response packet.
#[derive(Debug, Clone, Copy)]
pub enum ResponseView<'a> {
    /// Status-only reply (begin/end capture, transmit chunk, trigger).
    Status { command: u8, status: u8 },
    /// Reply to a read-chunk request.
    ReadChunk(ReadChunkView<'a>),
}

impl<'a> ResponseView<'a> {
    /// Status byte at offset 2. For read-chunk replies this is the high byte
    /// of `total_pairs`.
    pub fn status(&self) -> u8 {
        match self {
            ResponseView::Status { status, .. } => *status,
            ResponseView::ReadChunk(view) => view.packet.0[OFFSET_STATUS],
        }
    }

    /// Fail with `UnexpectedStatus` unless the status byte is zero.
    pub fn expect_ok(&self) -> Result<(), ProtocolError> {
        match self.status() {
            STATUS_OK => Ok(()),
            status => Err(ProtocolError::UnexpectedStatus {
                command: self.command(),
                status,
            }),
        }
    }

    pub fn command(&self) -> u8 {
        match self {
            ResponseView::Status { command, .. } => *command,
            ResponseView::ReadChunk(_) => CMD_READ_CHUNK,
        }
    }

    /// Chunk view of a read-chunk reply, `CommandMismatch` for anything else.
    pub fn as_read_chunk(&self) -> Result<&ReadChunkView<'a>, ProtocolError> {
        match self {
            ResponseView::ReadChunk(view) => Ok(view),
            ResponseView::Status { command, .. } => Err(ProtocolError::CommandMismatch {
                expected: CMD_READ_CHUNK,
                actual: *command,
            }),
        }
    }
}

/// Chunk metadata and payload of a read-chunk reply.
#[derive(Debug, Clone, Copy)]
pub struct ReadChunkView<'a> {
    packet: &'a Packet,
}

impl<'a> ReadChunkView<'a> {
    pub fn total_pairs(&self) -> u16 {
        self.packet.get_u16(OFFSET_TOTAL_PAIRS)
    }

    pub fn start_pair_index(&self) -> u16 {
        self.packet.get_u16(OFFSET_START_INDEX)
    }

    pub fn chunk_count(&self) -> u8 {
        self.packet.0[OFFSET_CHUNK_COUNT]
    }

    /// Pair payload of this chunk.
    ///
    /// The count is only checked against the packet capacity here, since a
    /// terminating reply may carry a meaningless count.
    pub fn pairs(&self) -> Result<impl Iterator<Item = DurationPair> + use<'a>, ProtocolError> {
        let packet: &'a Packet = self.packet;
        let count = self.chunk_count();
        if count as usize > MAX_CHUNK_PAIRS {
            return Err(ProtocolError::ChunkCountOutOfRange {
                count,
                max: MAX_CHUNK_PAIRS,
            });
        }
        let end = OFFSET_CHUNK_DATA + count as usize * PAIR_SIZE;
        Ok(packet.0[OFFSET_CHUNK_DATA..end]
            .chunks_exact(PAIR_SIZE)
            .map(DurationPair::from_bytes))
    }
}

/// Validate the echoed command and return a typed view of `packet`.
pub fn decode_response(expected: u8, packet: &Packet) -> Result<ResponseView<'_>, ProtocolError> {
    let actual = packet.command();
    if actual != expected {
        return Err(ProtocolError::CommandMismatch { expected, actual });
    }

    Ok(match actual {
        CMD_READ_CHUNK => ResponseView::ReadChunk(ReadChunkView { packet }),
        command => ResponseView::Status {
            command,
            status: packet.0[OFFSET_STATUS],
        },
    })
}
