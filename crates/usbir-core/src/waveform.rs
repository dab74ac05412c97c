//! IR waveform model and outbound chunk planning.
//!
//! A waveform is a sequence of on/off duration pairs in device ticks. On the
//! wire (and in saved capture files) each pair takes four bytes:
//! `[onHi, onLo, offHi, offLo]`.
//!
//! Shared waveforms travel as base64 text, optionally gzip-compressed first.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use byteorder::{BigEndian, ByteOrder};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

use crate::protocol::constants::{MAX_CHUNK_PAIRS, PAIR_SIZE};

#[derive(Error, Debug)]
pub enum WaveformError {
    #[error("Malformed waveform: {len} bytes is not a multiple of 4")]
    Malformed { len: usize },
    #[error("Waveform too long: {pairs} pairs, maximum {max}")]
    TooLong { pairs: usize, max: usize },
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid gzip data: {0}")]
    Gzip(#[from] std::io::Error),
}

/// One IR on/off interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DurationPair {
    pub on_ticks: u16,
    pub off_ticks: u16,
}

impl DurationPair {
    pub const fn new(on_ticks: u16, off_ticks: u16) -> Self {
        Self {
            on_ticks,
            off_ticks,
        }
    }

    /// Decode from the first four bytes of `bytes`.
    ///
    /// Panics if `bytes` is shorter than four bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            on_ticks: BigEndian::read_u16(&bytes[0..2]),
            off_ticks: BigEndian::read_u16(&bytes[2..4]),
        }
    }

    /// Encode into the first four bytes of `out`.
    pub fn write_to(&self, out: &mut [u8]) {
        BigEndian::write_u16(&mut out[0..2], self.on_ticks);
        BigEndian::write_u16(&mut out[2..4], self.off_ticks);
    }

    pub fn to_bytes(&self) -> [u8; PAIR_SIZE] {
        let mut buf = [0u8; PAIR_SIZE];
        self.write_to(&mut buf);
        buf
    }
}

/// An ordered sequence of duration pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Waveform {
    pairs: Vec<DurationPair>,
}

impl Waveform {
    /// Largest pair count the 16-bit `totalPairs` field can describe.
    pub const MAX_PAIRS: usize = u16::MAX as usize;

    pub fn new(pairs: Vec<DurationPair>) -> Self {
        Self { pairs }
    }

    /// Parse the raw byte form. The length must be a multiple of four.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WaveformError> {
        if data.len() % PAIR_SIZE != 0 {
            return Err(WaveformError::Malformed { len: data.len() });
        }
        Ok(Self {
            pairs: data
                .chunks_exact(PAIR_SIZE)
                .map(DurationPair::from_bytes)
                .collect(),
        })
    }

    /// Rebuild a waveform by concatenating payload fragments in order.
    pub fn from_fragments<'a, I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = &'a [DurationPair]>,
    {
        let mut pairs = Vec::new();
        for fragment in fragments {
            pairs.extend_from_slice(fragment);
        }
        Self { pairs }
    }

    pub fn from_base64(text: &str) -> Result<Self, WaveformError> {
        let bytes = STANDARD.decode(text.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Parse a gzip-compressed raw byte form.
    pub fn from_gzip(data: &[u8]) -> Result<Self, WaveformError> {
        let mut raw = Vec::new();
        GzDecoder::new(data).read_to_end(&mut raw)?;
        Self::from_bytes(&raw)
    }

    pub fn from_base64_gzip(text: &str) -> Result<Self, WaveformError> {
        let bytes = STANDARD.decode(text.trim())?;
        Self::from_gzip(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.pairs.len() * PAIR_SIZE];
        for (pair, out) in self.pairs.iter().zip(buf.chunks_exact_mut(PAIR_SIZE)) {
            pair.write_to(out);
        }
        buf
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn to_gzip(&self) -> Result<Vec<u8>, WaveformError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.to_bytes())?;
        Ok(encoder.finish()?)
    }

    pub fn to_base64_gzip(&self) -> Result<String, WaveformError> {
        Ok(STANDARD.encode(self.to_gzip()?))
    }

    pub fn pairs(&self) -> &[DurationPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pair count as carried in the `totalPairs` field.
    pub fn total_pairs(&self) -> Result<u16, WaveformError> {
        u16::try_from(self.pairs.len()).map_err(|_| WaveformError::TooLong {
            pairs: self.pairs.len(),
            max: Self::MAX_PAIRS,
        })
    }

    /// Round every serialized byte to the nearest multiple of `unit`.
    ///
    /// Captured timings jitter by a few ticks; clipping makes repeated
    /// captures of the same button byte-identical. A remainder of at least
    /// `unit / 2` rounds up, unless that would overflow the byte.
    pub fn clip(&self, unit: u8) -> Self {
        if unit <= 1 {
            return self.clone();
        }
        let bytes: Vec<u8> = self
            .to_bytes()
            .into_iter()
            .map(|b| clip_byte(b, unit))
            .collect();
        Self {
            pairs: bytes
                .chunks_exact(PAIR_SIZE)
                .map(DurationPair::from_bytes)
                .collect(),
        }
    }
}

impl From<Vec<DurationPair>> for Waveform {
    fn from(pairs: Vec<DurationPair>) -> Self {
        Self::new(pairs)
    }
}

fn clip_byte(value: u8, unit: u8) -> u8 {
    let remainder = value % unit;
    if remainder == 0 {
        return value;
    }
    if remainder >= unit / 2
        && let Some(up) = value.checked_add(unit - remainder)
    {
        return up;
    }
    value - remainder
}

/// Lazy plan of outbound chunks.
///
/// Yields `(start_index, pairs)` where `start_index` is the position of the
/// first pair of the chunk within the whole waveform.
#[derive(Debug, Clone)]
pub struct ChunkPlan<'a> {
    pairs: &'a [DurationPair],
    chunk_size: usize,
    offset: usize,
}

impl<'a> ChunkPlan<'a> {
    /// Total number of chunks the plan yields.
    pub fn total(&self) -> usize {
        self.pairs.len().div_ceil(self.chunk_size)
    }
}

impl<'a> Iterator for ChunkPlan<'a> {
    type Item = (usize, &'a [DurationPair]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.pairs.len() {
            return None;
        }

        let start = self.offset;
        let remaining = self.pairs.len() - start;
        let chunk_len = remaining.min(self.chunk_size);

        self.offset += chunk_len;
        Some((start, &self.pairs[start..start + chunk_len]))
    }
}

/// Split `waveform` into chunks of at most `max_pairs_per_chunk` pairs.
///
/// Panics if `max_pairs_per_chunk` is zero or larger than what fits in a
/// transmit packet.
pub fn plan_chunks(waveform: &Waveform, max_pairs_per_chunk: usize) -> ChunkPlan<'_> {
    assert!(
        (1..=MAX_CHUNK_PAIRS).contains(&max_pairs_per_chunk),
        "chunk size must be in 1..={MAX_CHUNK_PAIRS}"
    );
    ChunkPlan {
        pairs: waveform.pairs(),
        chunk_size: max_pairs_per_chunk,
        offset: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waveform_of(n: usize) -> Waveform {
        (0..n)
            .map(|i| DurationPair::new(i as u16, (i as u16).wrapping_mul(3)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_pair_byte_order() {
        let pair = DurationPair::new(0x1234, 0xABCD);
        assert_eq!(pair.to_bytes(), [0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(DurationPair::from_bytes(&[0x12, 0x34, 0xAB, 0xCD]), pair);
    }

    #[test]
    fn test_from_bytes_rejects_partial_pair() {
        let err = Waveform::from_bytes(&[0, 1, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(err, WaveformError::Malformed { len: 6 }));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let wf = waveform_of(5);
        let bytes = wf.to_bytes();
        assert_eq!(bytes.len(), 20);
        assert_eq!(Waveform::from_bytes(&bytes).unwrap(), wf);
    }

    #[test]
    fn test_plan_chunk_counts_and_offsets() {
        for n in [0usize, 1, 13, 14, 15, 20, 28, 29, 300] {
            let wf = waveform_of(n);
            let plan = plan_chunks(&wf, MAX_CHUNK_PAIRS);
            assert_eq!(plan.total(), n.div_ceil(14));

            let chunks: Vec<_> = plan.collect();
            assert_eq!(chunks.len(), n.div_ceil(14), "n = {n}");

            let mut expected_start = 0;
            for (start, pairs) in &chunks {
                assert_eq!(*start, expected_start);
                assert!(!pairs.is_empty() && pairs.len() <= 14);
                expected_start += pairs.len();
            }

            let rebuilt = Waveform::from_fragments(chunks.iter().map(|(_, p)| *p));
            assert_eq!(rebuilt, wf);
        }
    }

    #[test]
    fn test_plan_is_restartable() {
        let wf = waveform_of(30);
        let plan = plan_chunks(&wf, 14);
        let first: Vec<_> = plan.clone().map(|(s, p)| (s, p.len())).collect();
        let second: Vec<_> = plan.map(|(s, p)| (s, p.len())).collect();
        assert_eq!(first, vec![(0, 14), (14, 14), (28, 2)]);
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic]
    fn test_plan_rejects_oversized_chunks() {
        let wf = waveform_of(30);
        let _ = plan_chunks(&wf, 15);
    }

    #[test]
    fn test_total_pairs_limit() {
        assert_eq!(waveform_of(300).total_pairs().unwrap(), 300);
        let huge = Waveform::new(vec![DurationPair::default(); Waveform::MAX_PAIRS + 1]);
        assert!(matches!(
            huge.total_pairs(),
            Err(WaveformError::TooLong { .. })
        ));
    }

    #[test]
    fn test_clip_rounds_each_byte() {
        let wf = Waveform::from_bytes(&[0x00, 11, 0x00, 13, 0x01, 10, 0xFF, 254]).unwrap();
        let clipped = wf.clip(5);
        assert_eq!(clipped.to_bytes(), vec![0x00, 10, 0x00, 15, 0x00, 10, 0xFF, 255]);
    }

    #[test]
    fn test_clip_does_not_wrap() {
        assert_eq!(clip_byte(255, 7), 252);
        assert_eq!(clip_byte(250, 7), 252);
        assert_eq!(clip_byte(9, 1), 9);
    }

    #[test]
    fn test_clip_unit_one_is_identity() {
        let wf = waveform_of(4);
        assert_eq!(wf.clip(1), wf);
        assert_eq!(wf.clip(0), wf);
    }

    #[test]
    fn test_base64_roundtrip() {
        let wf = waveform_of(3);
        let text = wf.to_base64();
        assert_eq!(Waveform::from_base64(&text).unwrap(), wf);
        assert!(Waveform::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_gzip_base64() {
        let wf = waveform_of(40);
        let text = wf.to_base64_gzip().unwrap();
        assert_ne!(text, wf.to_base64());
        assert_eq!(Waveform::from_base64_gzip(&text).unwrap(), wf);

        // Gzip magic number leads the compressed form.
        assert_eq!(&wf.to_gzip().unwrap()[..2], &[0x1F, 0x8B]);
    }

    #[test]
    fn test_gzip_rejects_plain_bytes() {
        let wf = waveform_of(2);
        assert!(matches!(
            Waveform::from_gzip(&wf.to_bytes()),
            Err(WaveformError::Gzip(_))
        ));
        assert!(matches!(
            Waveform::from_base64_gzip(&wf.to_base64()),
            Err(WaveformError::Gzip(_))
        ));
    }
}
