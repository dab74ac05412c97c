//! Protocol module - USB-IR command definitions and packet codec.

pub mod constants;
pub mod packet;

pub use constants::*;
pub use packet::{
    Packet, ProtocolError, ReadChunkView, ResponseView, decode_response, encode_begin_capture,
    encode_end_capture, encode_read_chunk, encode_transmit_chunk, encode_trigger_transmit,
};
