//! Reassembly of a captured waveform from read-chunk replies.
//!
//! The device reports the total capture length with every reply. The host
//! keeps requesting chunks while the reply describes a non-empty chunk that
//! lies inside that total; the first reply that does not is the terminator.

use tracing::{debug, trace};

use crate::protocol::{ProtocolError, ReadChunkView};
use crate::waveform::{DurationPair, Waveform};

/// Outcome of feeding one reply into the accumulator.
#[derive(Debug, PartialEq, Eq)]
pub enum CaptureStep {
    /// Chunk appended; request another one.
    Continue,
    /// Capture complete.
    Complete(Waveform),
}

/// Accumulates read-chunk replies into a waveform.
#[derive(Debug, Default)]
pub struct CaptureAccumulator {
    pairs: Vec<DurationPair>,
    replies: usize,
}

impl CaptureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies fed so far, the terminating one included.
    pub fn replies(&self) -> usize {
        self.replies
    }

    /// Pairs appended so far.
    pub fn pairs_received(&self) -> usize {
        self.pairs.len()
    }

    /// Feed one read-chunk reply.
    ///
    /// On termination the result is sized to exactly the reported total:
    /// surplus pairs are dropped and missing ones are zero-filled.
    pub fn push(&mut self, chunk: &ReadChunkView<'_>) -> Result<CaptureStep, ProtocolError> {
        self.replies += 1;

        let total = chunk.total_pairs() as usize;
        let start = chunk.start_pair_index() as usize;
        let count = chunk.chunk_count() as usize;

        if total > 0 && total >= start + count && count > 0 {
            self.pairs.extend(chunk.pairs()?);
            trace!(start, count, total, "Capture chunk appended");
            return Ok(CaptureStep::Continue);
        }

        if self.pairs.len() != total {
            debug!(
                received = self.pairs.len(),
                total, "Resizing capture to reported total"
            );
        }
        let mut pairs = std::mem::take(&mut self.pairs);
        pairs.resize(total, DurationPair::default());
        Ok(CaptureStep::Complete(Waveform::new(pairs)))
    }
}
