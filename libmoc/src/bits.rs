use crate::Error;

/// Largest number of bits a single [`BitReader::read_bits`] call may return
pub const MAX_READ_BITS: u32 = 24;

/// LSB-first bit reader over a byte buffer
///
/// The low-order bit of each byte is the first bit of the stream. Bits left over
/// from the most recently consumed byte are kept in a small queue, so the byte
/// position always points at the next byte that has not been touched yet.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
    queue: u32,
    count: u32,
}

impl<'a> BitReader<'a> {
    /// Creates a reader positioned at the first bit of `data`
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            queue: 0,
            count: 0,
        }
    }

    /// Reads `n` bits and returns them in the low bits of the result
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underrun`] if the buffer ends before `n` bits are available.
    ///
    /// # Panics
    ///
    /// Panics if `n` is larger than [`MAX_READ_BITS`].
    pub fn read_bits(&mut self, n: u32) -> Result<u32, Error> {
        assert!(
            n <= MAX_READ_BITS,
            "cannot read {n} bits at once (max {MAX_READ_BITS})"
        );
        while self.count < n {
            let Some(&byte) = self.data.get(self.position) else {
                return Err(Error::Underrun {
                    requested: n,
                    position: self.position,
                    length: self.data.len(),
                });
            };
            self.queue |= u32::from(byte) << self.count;
            self.position += 1;
            self.count += 8;
        }
        let value = self.queue & ((1u32 << n) - 1);
        self.queue >>= n;
        self.count -= n;
        Ok(value)
    }

    /// Reads a single bit
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underrun`] at the end of the buffer.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, Error> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Discards the rest of the partially consumed byte
    pub fn align_to_byte(&mut self) {
        self.queue = 0;
        self.count = 0;
    }

    /// Aligns to the next byte, then to the next even byte offset
    pub fn align_to_word(&mut self) {
        self.align_to_byte();
        if self.position & 1 == 1 {
            self.position += 1;
        }
    }

    /// Moves the reader to a byte offset, dropping any queued bits
    pub fn seek(&mut self, position: usize) {
        self.align_to_byte();
        self.position = position;
    }

    /// Returns the offset of the next untouched byte
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns true once the position has moved past the end of the buffer
    #[must_use]
    pub const fn is_past_end(&self) -> bool {
        self.position > self.data.len()
    }

    /// Reads a little-endian 16-bit word at the current byte position without consuming it
    #[must_use]
    pub fn peek_u16_le(&self) -> Option<u16> {
        let bytes = self.data.get(self.position..self.position + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Consumes `n` whole bytes; queued bits are dropped first
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underrun`] if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        self.align_to_byte();
        let data = self.data;
        let Some(bytes) = data.get(self.position..self.position + n) else {
            return Err(Error::Underrun {
                requested: u32::try_from(n.saturating_mul(8)).unwrap_or(u32::MAX),
                position: self.position,
                length: data.len(),
            });
        };
        self.position += n;
        Ok(bytes)
    }

    /// Skips `n` whole bytes, which may move the position past the end of the buffer
    pub fn skip_bytes(&mut self, n: usize) {
        self.align_to_byte();
        self.position += n;
    }
}
