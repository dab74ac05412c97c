//! Capture state of an IR session.

use std::fmt;

/// Where the device is in the record/read cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureState {
    /// No capture started.
    #[default]
    Idle,
    /// Device is recording.
    Capturing,
    /// Recording stopped; the capture can be read back.
    Captured,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "IDLE"),
            CaptureState::Capturing => write!(f, "CAPTURING"),
            CaptureState::Captured => write!(f, "CAPTURED"),
        }
    }
}

impl CaptureState {
    /// Check if the captured waveform can be read.
    pub fn can_read(&self) -> bool {
        matches!(self, CaptureState::Captured)
    }
}
