//! Protocol constants for the USB-IR transceiver firmware.

// ============================================================================
// Device Identification
// ============================================================================

/// Vendor ID of the USB-IR remote controller.
pub const USBIR_VENDOR_ID: u16 = 0x22EA;

/// Product ID of the USB-IR remote controller.
pub const USBIR_PRODUCT_ID: u16 = 0x003A;

/// The device is composite; the IR command channel is HID interface 3.
pub const USBIR_HID_INTERFACE: u8 = 3;

// ============================================================================
// Packet Layout
// ============================================================================

/// Size of one report buffer including the leading report marker.
pub const PACKET_SIZE: usize = 65;

/// Bytes actually carried over the interrupt endpoints (report marker stripped).
pub const REPORT_SIZE: usize = PACKET_SIZE - 1;

pub const OFFSET_REPORT_ID: usize = 0;
pub const OFFSET_COMMAND: usize = 1;
pub const OFFSET_STATUS: usize = 2;
pub const OFFSET_TOTAL_PAIRS: usize = 2;
pub const OFFSET_START_INDEX: usize = 4;
pub const OFFSET_CHUNK_COUNT: usize = 6;
pub const OFFSET_CHUNK_DATA: usize = 7;

/// Serialized size of one on/off duration pair.
pub const PAIR_SIZE: usize = 4;

/// Maximum pairs per transmit or read chunk: (65 - 7) / 4.
pub const MAX_CHUNK_PAIRS: usize = 14;

// ============================================================================
// Commands (Host -> Device, echoed back at byte 1)
// ============================================================================

pub const CMD_BEGIN_CAPTURE: u8 = 0x31;
pub const CMD_END_CAPTURE: u8 = 0x32;
pub const CMD_READ_CHUNK: u8 = 0x33;
pub const CMD_TRANSMIT_CHUNK: u8 = 0x34;
pub const CMD_TRIGGER_TRANSMIT: u8 = 0x35;

/// Status byte value meaning "accepted".
pub const STATUS_OK: u8 = 0x00;

// ============================================================================
// Carrier Frequency
// ============================================================================

pub const FREQ_MIN: u32 = 25_000;
pub const FREQ_MAX: u32 = 50_000;
pub const FREQ_DEFAULT: u32 = 38_000;

// ============================================================================
// Capture Stop Parameters
// ============================================================================

/// Stop recording automatically once the off-time threshold is reached.
pub const CAPTURE_STOP_FLAG: u8 = 1;
pub const CAPTURE_STOP_ON_TICKS: u16 = 0x0000;
pub const CAPTURE_STOP_OFF_TICKS: u16 = 0x0A00;

/// Capture buffer of the firmware, in bytes.
pub const CAPTURE_BUFFER_SIZE: usize = 9600;

/// Pairs that fit in the capture buffer.
pub const MAX_CAPTURE_PAIRS: usize = CAPTURE_BUFFER_SIZE / PAIR_SIZE;

/// Returns `true` if `frequency` is an accepted carrier frequency.
#[inline]
pub const fn is_valid_frequency(frequency: u32) -> bool {
    frequency >= FREQ_MIN && frequency <= FREQ_MAX
}

/// Human-readable name of a command byte.
pub fn command_name(command: u8) -> &'static str {
    match command {
        CMD_BEGIN_CAPTURE => "BeginCapture",
        CMD_END_CAPTURE => "EndCapture",
        CMD_READ_CHUNK => "ReadChunk",
        CMD_TRANSMIT_CHUNK => "TransmitChunk",
        CMD_TRIGGER_TRANSMIT => "TriggerTransmit",
        _ => "Unknown",
    }
}
