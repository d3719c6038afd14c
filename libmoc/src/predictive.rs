//! Predictive decompression
//!
//! Each line is a sequence of Huffman-coded residuals added (mod 256) to a prediction from the
//! pixel to the left, the pixel above, or both. When sync is enabled, every 128th line starts
//! at a word-aligned sync word followed by the line's pixels stored verbatim.

use tracing::{debug, instrument, trace, warn};

use crate::{bits::BitReader, huffman::DecodeTable, Error};

/// Lines between two sync words
pub const SYNC_INTERVAL: usize = 128;
/// Sync word MOC inserts in the predictive stream
pub const DEFAULT_SYNC: u16 = 0xf0ca;

/// Which neighbours predict a pixel
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    /// predict from the previous sample in the line (X)
    pub cross_track: bool,
    /// predict from the same sample in the previous line (Y)
    pub down_track: bool,
}

impl Prediction {
    /// Reads the X/Y flags from the low two bits of a compression byte
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            cross_track: bits & 1 != 0,
            down_track: bits & 2 != 0,
        }
    }
}

/// Result of decompressing a predictive image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictiveImage {
    /// decoded lines, row-major
    pub pixels: Vec<u8>,
    /// number of lines decoded
    pub height: usize,
    /// number of times the expected sync word was missing
    pub sync_losses: u32,
    /// true if decoding stopped because the data ran out
    pub past_eof: bool,
}

/// Line-by-line predictive decoder
#[derive(Debug, Clone, Copy)]
pub struct PredictiveDecoder<'t> {
    table: &'t DecodeTable,
    width: usize,
    prediction: Prediction,
    sync: Option<u16>,
}

impl<'t> PredictiveDecoder<'t> {
    /// Creates a decoder for lines `width` pixels wide
    ///
    /// `sync` is the sync word expected every [`SYNC_INTERVAL`] lines, or `None` to decode
    /// every line from the bit stream.
    #[must_use]
    pub const fn new(
        table: &'t DecodeTable,
        width: usize,
        prediction: Prediction,
        sync: Option<u16>,
    ) -> Self {
        Self {
            table,
            width,
            prediction,
            sync,
        }
    }

    /// Decodes up to `height` lines from `data`
    ///
    /// Decoding stops early when the bit stream runs out or when a sync word is missing and no
    /// later one can be found. The returned image holds every line decoded up to that point.
    #[instrument(skip(self, data), fields(len = data.len(), width = self.width))]
    pub fn decode(&self, data: &[u8], height: usize) -> PredictiveImage {
        let mut prev = vec![0u8; self.width];
        let mut cur = vec![0u8; self.width];
        let mut image = PredictiveImage {
            pixels: Vec::with_capacity(self.width * height),
            height: 0,
            sync_losses: 0,
            past_eof: false,
        };
        let mut bits = BitReader::new(data);
        let mut last_sync = 0;

        for y in 0..height {
            let line = match self.sync.filter(|_| y % SYNC_INTERVAL == 0) {
                Some(sync) => {
                    bits.align_to_word();
                    if bits.peek_u16_le() == Some(sync) {
                        last_sync = bits.position();
                    } else {
                        warn!("lost sync, line {y}");
                        image.sync_losses += 1;
                        let Some(found) = find_sync(data, last_sync + 1, sync) else {
                            image.past_eof = bits.is_past_end();
                            warn!("no sync found after byte {last_sync}, aborting at line {y}");
                            break;
                        };
                        debug!("resynchronised at byte {found}");
                        bits.seek(found);
                        last_sync = found;
                    }
                    self.decode_sync_line(&mut bits, &mut cur, &mut prev)
                }
                None => self.decode_line(&mut bits, &mut cur, &prev),
            };
            if let Err(e) = line {
                debug!("stopped at line {y}: {e}");
                image.past_eof = true;
                break;
            }
            prev.copy_from_slice(&cur);
            image.pixels.extend_from_slice(&cur);
            image.height = y + 1;
        }
        trace!("decoded {} lines, {} bytes consumed", image.height, bits.position());
        image
    }

    /// Decodes one line of residuals into `cur`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underrun`] if the stream ends inside the line.
    pub fn decode_line(
        &self,
        bits: &mut BitReader<'_>,
        cur: &mut [u8],
        prev: &[u8],
    ) -> Result<(), Error> {
        for i in 0..self.width {
            let residual = self.table.decode_residual(bits)?;
            let predicted = match (self.prediction.cross_track, self.prediction.down_track) {
                (false, false) => 0,
                (true, false) if i > 0 => cur[i - 1],
                (true, false) => 0,
                (false, true) => prev[i],
                (true, true) if i > 0 => {
                    // the mean of two bytes fits in a byte
                    ((u16::from(cur[i - 1]) + u16::from(prev[i])) / 2) as u8
                }
                (true, true) => prev[i],
            };
            cur[i] = predicted.wrapping_add(residual as u8);
        }
        Ok(())
    }

    /// Reads a sync line: the two sync bytes, then `width` literal pixels into both buffers
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underrun`] if fewer than `width` bytes follow the sync word.
    pub fn decode_sync_line(
        &self,
        bits: &mut BitReader<'_>,
        cur: &mut [u8],
        prev: &mut [u8],
    ) -> Result<(), Error> {
        bits.skip_bytes(2);
        let literal = bits.read_bytes(self.width)?;
        cur.copy_from_slice(literal);
        prev.copy_from_slice(literal);
        Ok(())
    }
}

/// Scans `data` from byte `from` for the little-endian sync word
#[must_use]
pub fn find_sync(data: &[u8], from: usize, sync: u16) -> Option<usize> {
    let pattern = sync.to_le_bytes();
    data.get(from..)?
        .windows(2)
        .position(|w| w == pattern)
        .map(|at| from + at)
}
