//! Table-form Huffman decoding
//!
//! A [`DecodeTable`] stores a binary code tree as three parallel arrays. Node `i` has a zero
//! branch and a one branch; bit 0 (resp. bit 1) of `flags[i]` says whether that branch leads to
//! another node (set) or ends in a leaf value (clear).

pub mod presets;

use std::{fs::File, io::Read, path::Path};

use tracing::{debug, trace};

use crate::{bits::BitReader, Error};

/// Escape leaf: the next 15 bits hold a negative coefficient
pub const LARGE_NEGATIVE: u16 = 0x8000;
/// Escape leaf: the next 15 bits hold a positive coefficient
pub const LARGE_POSITIVE: u16 = 0x7fff;

/// Largest table a decode table file may hold
pub const MAX_FILE_TABLE_SIZE: usize = 256;

const ZERO: u8 = 1 << 0;
const ONE: u8 = 1 << 1;

/// Huffman tree in table form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeTable {
    flags: Vec<u8>,
    zero: Vec<u16>,
    one: Vec<u16>,
}

/// One entry of a code book: a leaf value and the code that reaches it
///
/// `code` is stored in transmission order: bit 0 is the first bit on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeWord {
    /// raw leaf value
    pub value: u16,
    /// code bits, first transmitted bit in the LSB
    pub code: u16,
    /// number of bits in `code`
    pub len: u8,
}

#[derive(Debug, Default)]
struct Node {
    value: u16,
    zero: Option<usize>,
    one: Option<usize>,
}

impl Node {
    const fn is_leaf(&self) -> bool {
        self.zero.is_none() && self.one.is_none()
    }
}

/// Pointer-free code tree used while building a [`DecodeTable`]
#[derive(Debug)]
struct CodeTree {
    nodes: Vec<Node>,
}

impl CodeTree {
    fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    fn insert(&mut self, word: CodeWord) {
        let mut node = 0;
        let mut code = word.code;
        for _ in 0..word.len {
            let next = self.nodes.len();
            let branch = if code & 1 == 0 {
                &mut self.nodes[node].zero
            } else {
                &mut self.nodes[node].one
            };
            let existing = *branch;
            node = if let Some(child) = existing {
                child
            } else {
                *branch = Some(next);
                self.nodes.push(Node::default());
                next
            };
            code >>= 1;
        }
        self.nodes[node].value = word.value;
    }

    /// Numbers internal nodes depth-first, zero branch before one branch
    fn tablefy(&self) -> DecodeTable {
        let internal = self.nodes.iter().filter(|n| !n.is_leaf()).count().max(1);
        let mut table = DecodeTable {
            flags: vec![0; internal],
            zero: vec![0; internal],
            one: vec![0; internal],
        };
        let mut next_index = 0;
        self.tablefy_node(0, &mut table, &mut next_index);
        table
    }

    fn tablefy_node(&self, node: usize, table: &mut DecodeTable, next_index: &mut usize) {
        let local = *next_index;
        for (child, mask) in [(self.nodes[node].zero, ZERO), (self.nodes[node].one, ONE)] {
            let Some(child) = child else { continue };
            let slot = if mask == ZERO {
                &mut table.zero
            } else {
                &mut table.one
            };
            if self.nodes[child].is_leaf() {
                table.flags[local] &= !mask;
                slot[local] = self.nodes[child].value;
            } else {
                *next_index += 1;
                table.flags[local] |= mask;
                // table indices never exceed the node count, which is bounded by the code books
                slot[local] = u16::try_from(*next_index).unwrap_or(u16::MAX);
                self.tablefy_node(child, table, next_index);
            }
        }
    }
}

impl DecodeTable {
    /// Builds a table from code words
    ///
    /// Words are inserted in order; a later word sharing a path with an earlier one overwrites
    /// the leaf value.
    #[must_use]
    pub fn from_code_words(words: impl IntoIterator<Item = CodeWord>) -> Self {
        let mut tree = CodeTree::new();
        for word in words {
            tree.insert(word);
        }
        let table = tree.tablefy();
        trace!("built decode table with {} nodes", table.len());
        table
    }

    /// Reads a decode table file: a little-endian `u32` size followed by the
    /// `flags`, `left` and `right` byte arrays of that size
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableFile`] if the size is zero or too large, or if the file is short.
    pub fn from_reader(mut r: impl Read) -> Result<Self, Error> {
        let mut size = [0; 4];
        r.read_exact(&mut size)
            .map_err(|e| Error::TableFile(format!("reading size: {e}")))?;
        let size = u32::from_le_bytes(size) as usize;
        if size == 0 || size > MAX_FILE_TABLE_SIZE {
            return Err(Error::TableFile(format!("table size {size} out of range")));
        }
        let mut arrays = [vec![0u8; size], vec![0u8; size], vec![0u8; size]];
        for (array, name) in arrays.iter_mut().zip(["flags", "left", "right"]) {
            r.read_exact(array)
                .map_err(|e| Error::TableFile(format!("reading {name} array: {e}")))?;
        }
        let [flags, zero, one] = arrays;
        debug!("loaded decode table of size {size}");
        Ok(Self {
            flags,
            zero: zero.into_iter().map(u16::from).collect(),
            one: one.into_iter().map(u16::from).collect(),
        })
    }

    /// Reads a decode table file from a path
    ///
    /// # Errors
    ///
    /// See [`Self::from_reader`]; also fails if the file cannot be opened.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Number of nodes in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if the table has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Walks the tree one bit at a time and returns the raw leaf value reached
    ///
    /// # Errors
    ///
    /// Returns [`Error::Underrun`] when the stream ends mid-code and
    /// [`Error::CorruptTable`] if a branch points outside the table.
    pub fn decode_raw(&self, bits: &mut BitReader<'_>) -> Result<u16, Error> {
        let mut node = 0usize;
        loop {
            if node >= self.flags.len() {
                return Err(Error::CorruptTable {
                    node,
                    size: self.flags.len(),
                });
            }
            let (mask, next) = if bits.read_bit()? {
                (ONE, self.one[node])
            } else {
                (ZERO, self.zero[node])
            };
            if self.flags[node] & mask == 0 {
                return Ok(next);
            }
            node = usize::from(next);
        }
    }

    /// Decodes one predictive residual
    ///
    /// # Errors
    ///
    /// See [`Self::decode_raw`].
    #[inline]
    pub fn decode_residual(&self, bits: &mut BitReader<'_>) -> Result<i8, Error> {
        // residual leaves carry a byte; the high bits of the slot are unused
        Ok(self.decode_raw(bits)? as u8 as i8)
    }

    /// Decodes one transform coefficient, following the escape leaves
    ///
    /// # Errors
    ///
    /// See [`Self::decode_raw`].
    pub fn decode_coefficient(&self, bits: &mut BitReader<'_>) -> Result<i32, Error> {
        match self.decode_raw(bits)? {
            LARGE_POSITIVE => Ok(bits.read_bits(15)? as i32),
            LARGE_NEGATIVE => Ok(bits.read_bits(15)? as i32 - 0x8000),
            value => Ok(i32::from(value as i16)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// LSB-first bit writer mirroring [`BitReader`]
    #[derive(Default)]
    pub(crate) struct BitWriter {
        pub(crate) bytes: Vec<u8>,
        used: u32,
    }

    impl BitWriter {
        pub(crate) fn put(&mut self, value: u32, n: u32) {
            for i in 0..n {
                if self.used == 0 {
                    self.bytes.push(0);
                }
                let bit = ((value >> i) & 1) as u8;
                *self.bytes.last_mut().unwrap() |= bit << self.used;
                self.used = (self.used + 1) % 8;
            }
        }

        pub(crate) fn put_word(&mut self, word: CodeWord) {
            self.put(u32::from(word.code), u32::from(word.len));
        }

        pub(crate) fn align(&mut self) {
            self.used = 0;
        }
    }

    fn word(value: u16, code: u16, len: u8) -> CodeWord {
        CodeWord { value, code, len }
    }

    #[test]
    fn builds_and_walks_small_tree() {
        // 0 -> 5, 10 -> 7 (bit order: first bit in LSB), 11 -> 9
        let table = DecodeTable::from_code_words([
            word(5, 0b0, 1),
            word(7, 0b01, 2),
            word(9, 0b11, 2),
        ]);
        assert_eq!(table.len(), 2);
        let mut w = BitWriter::default();
        for v in [word(5, 0b0, 1), word(9, 0b11, 2), word(7, 0b01, 2), word(5, 0, 1)] {
            w.put_word(v);
        }
        let mut r = BitReader::new(&w.bytes);
        let decoded: Vec<_> = (0..4).map(|_| table.decode_raw(&mut r).unwrap()).collect();
        assert_eq!(decoded, [5, 9, 7, 5]);
    }

    #[test]
    fn residual_leaves_are_signed_bytes() {
        let table = DecodeTable::from_code_words([word(0xff, 0, 1), word(0x7f, 1, 1)]);
        let data = [0b10];
        let mut r = BitReader::new(&data);
        assert_eq!(table.decode_residual(&mut r).unwrap(), -1);
        assert_eq!(table.decode_residual(&mut r).unwrap(), 127);
    }

    #[test]
    fn escapes_read_fifteen_more_bits() {
        let table = DecodeTable::from_code_words([
            word(LARGE_POSITIVE, 0, 1),
            word(LARGE_NEGATIVE, 0b01, 2),
            word(3, 0b11, 2),
        ]);
        for x in [0u32, 1, 0x1234, 0x7fff] {
            let mut w = BitWriter::default();
            w.put(0, 1);
            w.put(x, 15);
            w.put(0b01, 2);
            w.put(x, 15);
            w.put(0b11, 2);
            let mut r = BitReader::new(&w.bytes);
            let pos = table.decode_coefficient(&mut r).unwrap();
            let neg = table.decode_coefficient(&mut r).unwrap();
            assert_eq!(pos, (x & 0x7fff) as i32);
            assert!((0..=32767).contains(&pos));
            assert_eq!(neg, x as i32 - 32768);
            assert!((-32768..=-1).contains(&neg));
            assert_eq!(table.decode_coefficient(&mut r).unwrap(), 3);
        }
    }

    #[test]
    fn loads_table_files() {
        let mut file = 2u32.to_le_bytes().to_vec();
        file.extend([ZERO, 0]); // flags
        file.extend([1, 4]); // left
        file.extend([0xfe, 6]); // right
        let table = DecodeTable::from_reader(file.as_slice()).unwrap();
        // 1 -> -2, 00 -> 4, 01 -> 6
        let data = [0b1_0001];
        let mut r = BitReader::new(&data);
        assert_eq!(table.decode_residual(&mut r).unwrap(), -2);
        assert_eq!(table.decode_residual(&mut r).unwrap(), 4);
        assert_eq!(table.decode_residual(&mut r).unwrap(), 6);

        assert!(DecodeTable::from_reader(&0u32.to_le_bytes()[..]).is_err());
        assert!(DecodeTable::from_reader(&[3, 0, 0, 0, 1, 2][..]).is_err());
    }

    #[test]
    fn branch_out_of_table_is_corrupt() {
        let mut file = 1u32.to_le_bytes().to_vec();
        file.extend([ZERO | ONE, 9, 9]);
        let table = DecodeTable::from_reader(file.as_slice()).unwrap();
        let data = [0u8; 2];
        let mut r = BitReader::new(&data);
        assert!(matches!(
            table.decode_raw(&mut r),
            Err(Error::CorruptTable { node: 9, size: 1 })
        ));
    }
}
