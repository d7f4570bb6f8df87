//! Stateful re-framing of the `*`-delimited byte stream.
//!
//! TCP delivers arbitrary chunks with no message boundaries, so a chunk may
//! contain several complete units, a trailing partial unit, or only the
//! middle of one. [`Decoder`] buffers across chunks: everything up to the
//! last `*` seen so far is split into units and parsed, and the remainder is
//! kept as the prefix of the next chunk. Bytes that arrive before the first
//! `*` of the stream are discarded as garbage, and empty units (the `**`
//! between back-to-back messages) are skipped silently.
//!
//! The pending buffer is capped at [`MAX_PENDING_BYTES`]; a peer that
//! streams data with no delimiter cannot force unbounded allocation. On
//! overflow the buffer is dropped and a single [`DecodeError::Overflow`] is
//! reported.

use crate::frame::{DecodeError, Frame, parse_unit};

/// Sentinel byte that opens and closes every wire unit.
pub const DELIMITER: u8 = b'*';

/// Cap on bytes buffered while waiting for a closing delimiter (64 KiB).
/// The largest legitimate unit is a full 25-joint pose frame, well under
/// 2 KiB.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Incremental decoder for one connection's inbound byte stream.
#[derive(Debug, Default)]
pub struct Decoder {
    pending: Vec<u8>,
    /// Whether the stream's first delimiter has been consumed. Until then,
    /// buffered bytes are pre-protocol garbage; after, the buffer always
    /// starts inside a (possibly empty) unit.
    started: bool,
}

impl Decoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received chunk and collect every unit it completes.
    ///
    /// A malformed unit yields an `Err` entry without disturbing the units
    /// that follow it in the same chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Frame, DecodeError>> {
        self.pending.extend_from_slice(chunk);

        let mut results = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == DELIMITER) {
            if self.started {
                if pos > 0 {
                    let unit = String::from_utf8_lossy(&self.pending[..pos]);
                    results.push(parse_unit(&unit));
                }
                // pos == 0 is the empty gap between back-to-back units.
            }
            // !started: everything before the stream's first delimiter is
            // garbage and is dropped with it.
            self.pending.drain(..=pos);
            self.started = true;
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            let dropped = self.pending.len();
            self.pending.clear();
            // Resync on the next delimiter; the rest of the oversized unit
            // is junk.
            self.started = false;
            results.push(Err(DecodeError::Overflow { dropped }));
        }

        results
    }

    /// Number of bytes buffered awaiting a closing delimiter.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
