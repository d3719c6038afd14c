//! Transform decompression
//!
//! A transform fragment is a grid of 16x16 blocks. Each block belongs to one of up to eight
//! quantization groups; a group carries the DC range of its blocks and a 3-bit variance class
//! per AC coefficient that selects the Huffman code book for that coefficient.

pub mod dct;
pub mod reorder;
pub mod wht;

use strum::IntoStaticStr;
use tracing::{debug, instrument, trace, warn};

use crate::{bits::BitReader, huffman::presets, Error};

/// Side of a transform block
pub const BLOCK_SIZE: usize = 16;
/// Number of coefficients in a transform block
pub const BLOCK_AREA: usize = BLOCK_SIZE * BLOCK_SIZE;
/// Largest number of quantization groups a fragment can use
pub const MAX_GROUPS: u8 = 8;

const GROUP_BITS: u32 = 3;
const VARIANCE_BITS: u32 = 3;

/// Inverse transform applied to each block
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum TransformKind {
    /// sequency-ordered Walsh-Hadamard transform
    #[strum(serialize = "wht")]
    Wht = 1,
    /// discrete cosine transform
    #[strum(serialize = "dct")]
    Dct = 2,
}

impl TransformKind {
    /// Short lowercase name of the transform
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    fn inverse_2d(self, coefficients: &[i32; BLOCK_AREA]) -> [u8; BLOCK_AREA] {
        match self {
            Self::Wht => wht::inverse_2d(coefficients),
            Self::Dct => dct::inverse_2d(coefficients),
        }
    }
}

impl TryFrom<u8> for TransformKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Wht),
            2 => Ok(Self::Dct),
            other => Err(Error::UnsupportedTransform(other)),
        }
    }
}

pub(crate) fn clamp_pixel(value: i64) -> u8 {
    // clamped into the byte range first
    value.clamp(0, 255) as u8
}

pub(crate) fn transpose<T: Copy>(block: &mut [[T; BLOCK_SIZE]; BLOCK_SIZE]) {
    for r in 0..BLOCK_SIZE {
        for c in r + 1..BLOCK_SIZE {
            let tmp = block[r][c];
            block[r][c] = block[c][r];
            block[c][r] = tmp;
        }
    }
}

/// DC range and per-coefficient code book classes shared by the blocks of one group
#[derive(Debug, Clone)]
struct Group {
    min_dc: u16,
    max_dc: u16,
    variance: [u8; BLOCK_AREA - 1],
}

impl Group {
    fn read(bits: &mut BitReader<'_>) -> Result<Self, Error> {
        let min_dc = bits.read_bits(16)? as u16;
        let max_dc = bits.read_bits(16)? as u16;
        let mut variance = [0; BLOCK_AREA - 1];
        for v in &mut variance {
            *v = bits.read_bits(VARIANCE_BITS)? as u8;
        }
        Ok(Self {
            min_dc,
            max_dc,
            variance,
        })
    }

    /// Maps an 8-bit DC code linearly onto the group's DC range
    fn dc(&self, code: u8) -> i32 {
        let span = f64::from(self.max_dc) - f64::from(self.min_dc);
        let dc = (f64::from(code) * span / 255.0 + f64::from(self.min_dc)).round();
        // float to int casts saturate, which is the u16 storage of the DC term
        i32::from(dc as u16)
    }
}

/// Pixels of a transform fragment and how far decoding got
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformTile {
    /// fragment pixels, row-major; blocks that were not decoded stay zero
    pub pixels: Vec<u8>,
    /// width in pixels
    pub width: usize,
    /// height in pixels
    pub height: usize,
    /// per block (raster order), whether it was decoded
    pub decoded: Vec<bool>,
    /// bytes of compressed data read
    pub consumed: usize,
}

impl TransformTile {
    /// Creates an all-zero tile
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let blocks = (width / BLOCK_SIZE) * (height / BLOCK_SIZE);
        Self {
            pixels: vec![0; width * height],
            width,
            height,
            decoded: vec![false; blocks],
            consumed: 0,
        }
    }

    fn blocks_across(&self) -> usize {
        self.width / BLOCK_SIZE
    }

    /// Number of leading block rows in which every block was decoded
    #[must_use]
    pub fn complete_rows(&self) -> usize {
        let across = self.blocks_across();
        if across == 0 {
            return 0;
        }
        self.decoded
            .chunks(across)
            .take_while(|row| row.iter().all(|&d| d))
            .count()
    }

    fn put_block(&mut self, index: usize, block: &[u8; BLOCK_AREA]) {
        let across = self.blocks_across();
        let (bx, by) = (index % across, index / across);
        for (r, line) in block.chunks(BLOCK_SIZE).enumerate() {
            let start = (by * BLOCK_SIZE + r) * self.width + bx * BLOCK_SIZE;
            self.pixels[start..start + BLOCK_SIZE].copy_from_slice(line);
        }
        self.decoded[index] = true;
    }
}

/// Block decoder for one transform fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformDecoder {
    kind: TransformKind,
    spacing: u16,
    groups: u8,
}

impl TransformDecoder {
    /// Creates a decoder for `groups` quantization groups and the given coefficient spacing
    #[must_use]
    pub const fn new(kind: TransformKind, spacing: u16, groups: u8) -> Self {
        Self {
            kind,
            spacing,
            groups,
        }
    }

    /// Decodes a whole fragment into `tile`
    ///
    /// Blocks are written into the tile as soon as they are decoded, so on error the tile
    /// holds every block finished before the failure.
    ///
    /// # Errors
    ///
    /// * [`Error::GroupOutOfRange`] if a block names a group the fragment does not have;
    ///   nothing is written to the tile in that case.
    /// * [`Error::Underrun`] if the compressed data ends early.
    #[instrument(skip(self, data, tile), fields(kind = self.kind.as_str(), len = data.len()))]
    pub fn decode_into(&self, data: &[u8], tile: &mut TransformTile) -> Result<(), Error> {
        let mut bits = BitReader::new(data);
        let result = self.decode_blocks(&mut bits, tile);
        tile.consumed = bits.position();
        result
    }

    fn decode_blocks(
        &self,
        bits: &mut BitReader<'_>,
        tile: &mut TransformTile,
    ) -> Result<(), Error> {
        let blocks = tile.decoded.len();
        let mut assignment = Vec::with_capacity(blocks);
        for _ in 0..blocks {
            assignment.push(bits.read_bits(GROUP_BITS)? as u8);
        }
        if let Some(&group) = assignment.iter().find(|&&g| g >= self.groups) {
            warn!("block group {group} but only {} groups", self.groups);
            return Err(Error::GroupOutOfRange {
                group,
                groups: self.groups,
            });
        }

        for g in 0..self.groups {
            if !assignment.contains(&g) {
                continue;
            }
            let group = Group::read(bits)?;
            trace!(g, min_dc = group.min_dc, max_dc = group.max_dc, "group header");
            for (index, _) in assignment.iter().enumerate().filter(|(_, &a)| a == g) {
                let block = self.decode_block(bits, &group)?;
                tile.put_block(index, &block);
            }
        }
        debug!("decoded {blocks} blocks, {} bytes", bits.position());
        Ok(())
    }

    fn decode_block(
        &self,
        bits: &mut BitReader<'_>,
        group: &Group,
    ) -> Result<[u8; BLOCK_AREA], Error> {
        let mut scan = [0i32; BLOCK_AREA];
        scan[0] = group.dc(bits.read_bits(8)? as u8);
        let zeros = bits.read_bits(8)? as usize;
        let spacing = i32::from(self.spacing);
        for k in 1..BLOCK_AREA - zeros {
            let table = presets::coefficient_table(group.variance[k - 1]);
            scan[k] = table.decode_coefficient(bits)? * spacing;
        }
        Ok(self.kind.inverse_2d(&reorder::to_row_major(&scan)))
    }
}
