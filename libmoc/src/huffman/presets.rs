//! Built-in code tables
//!
//! Predictive presets map each of the 256 residual symbols to a (`code`, `len`, `requant`)
//! triple. Presets 0..8 are lossless with a widening residual spread; presets 8..16 reuse the
//! same spreads with a requantization step of 2..9. Coefficient code books cover
//! `-(2 << class)..=(2 << class)` plus the two escape leaves.
//!
//! All tables are built once from integer weights, so every decoder sees the same codes.

use std::{cmp::Reverse, collections::BinaryHeap, sync::LazyLock};

use tracing::debug;

use super::{CodeWord, DecodeTable, LARGE_NEGATIVE, LARGE_POSITIVE};
use crate::Error;

/// Number of built-in predictive tables
pub const PRESET_COUNT: u8 = 16;
/// Number of transform coefficient code books (one per variance index)
pub const COEFFICIENT_CLASSES: u8 = 8;
/// Longest code any built-in table uses
pub const MAX_CODE_LENGTH: u32 = 16;

const SPREAD: [u64; 8] = [1, 2, 3, 4, 6, 8, 12, 16];
const WEIGHT_BITS: u64 = 40;

/// Per-symbol code triples of a predictive preset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCodes {
    /// code bits per symbol, first transmitted bit in the LSB
    pub code: [u16; 256],
    /// code length per symbol
    pub len: [u8; 256],
    /// value decoded for each symbol (a signed byte)
    pub requant: [u8; 256],
}

impl PresetCodes {
    /// Code word for a residual symbol
    #[must_use]
    pub fn encode(&self, symbol: u8) -> CodeWord {
        let s = usize::from(symbol);
        CodeWord {
            value: u16::from(self.requant[s]),
            code: self.code[s],
            len: self.len[s],
        }
    }

    /// Symbols in tree insertion order: zero, each new positive value, then each new negative value
    fn insertion_order(&self) -> impl Iterator<Item = CodeWord> + '_ {
        let positive = (1..128).filter(|&i| self.requant[i] != self.requant[i - 1]);
        let negative = (128..255)
            .rev()
            .filter(|&i| self.requant[i] != self.requant[i + 1]);
        std::iter::once(0)
            .chain(positive)
            .chain(std::iter::once(255))
            .chain(negative)
            // indices are below 256
            .map(|i| self.encode(i as u8))
    }
}

/// Code book of a transform coefficient class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBook {
    max_magnitude: i32,
    words: Vec<CodeWord>,
}

impl CodeBook {
    /// Largest coefficient magnitude coded without an escape
    #[must_use]
    pub const fn max_magnitude(&self) -> i32 {
        self.max_magnitude
    }

    /// All code words, escapes last
    #[must_use]
    pub fn words(&self) -> &[CodeWord] {
        &self.words
    }

    /// Code word of a coefficient within `-max_magnitude..=max_magnitude`
    #[must_use]
    pub fn code_for(&self, value: i32) -> Option<CodeWord> {
        if value.abs() > self.max_magnitude {
            return None;
        }
        let index = match value {
            0 => 0,
            v if v > 0 => 2 * v - 1,
            v => -2 * v,
        };
        self.words.get(usize::try_from(index).ok()?).copied()
    }

    /// Code word of the negative or positive escape leaf
    #[must_use]
    pub fn escape(&self, negative: bool) -> CodeWord {
        let sentinel = if negative {
            LARGE_NEGATIVE
        } else {
            LARGE_POSITIVE
        };
        self.words
            .iter()
            .rev()
            .copied()
            .find(|w| w.value == sentinel)
            .unwrap_or(CodeWord {
                value: sentinel,
                code: 0,
                len: 0,
            })
    }
}

struct Preset {
    codes: PresetCodes,
    table: DecodeTable,
}

static PREDICTIVE: LazyLock<Vec<Preset>> =
    LazyLock::new(|| (0..PRESET_COUNT).map(build_predictive).collect());

static COEFFICIENT: LazyLock<Vec<(CodeBook, DecodeTable)>> =
    LazyLock::new(|| (0..COEFFICIENT_CLASSES).map(build_coefficient).collect());

/// Code triples of a predictive preset
///
/// # Errors
///
/// Returns [`Error::UnsupportedTable`] if `index` is not below [`PRESET_COUNT`].
pub fn predictive_codes(index: u8) -> Result<&'static PresetCodes, Error> {
    PREDICTIVE
        .get(usize::from(index))
        .map(|p| &p.codes)
        .ok_or(Error::UnsupportedTable(index))
}

/// Decode table of a predictive preset
///
/// # Errors
///
/// Returns [`Error::UnsupportedTable`] if `index` is not below [`PRESET_COUNT`].
pub fn predictive_table(index: u8) -> Result<&'static DecodeTable, Error> {
    PREDICTIVE
        .get(usize::from(index))
        .map(|p| &p.table)
        .ok_or(Error::UnsupportedTable(index))
}

/// Code book of a coefficient class; only the low three bits of `class` are used
#[must_use]
pub fn coefficient_codes(class: u8) -> &'static CodeBook {
    &COEFFICIENT[usize::from(class % COEFFICIENT_CLASSES)].0
}

/// Decode table of a coefficient class; only the low three bits of `class` are used
#[must_use]
pub fn coefficient_table(class: u8) -> &'static DecodeTable {
    &COEFFICIENT[usize::from(class % COEFFICIENT_CLASSES)].1
}

fn weight(magnitude: i32, spread: u64) -> u64 {
    let shift = (u64::from(magnitude.unsigned_abs()) * 4 / spread).min(WEIGHT_BITS);
    (1u64 << WEIGHT_BITS) >> shift
}

fn requantize(residual: i32, step: i32) -> i32 {
    if step == 1 {
        return residual;
    }
    let magnitude = (residual.abs() + step / 2) / step * step;
    (residual.signum() * magnitude).clamp(-128, 127)
}

/// Huffman code lengths for `weights`; ties go to the lower index
fn huffman_lengths(weights: &[u64]) -> Vec<u32> {
    let n = weights.len();
    if n < 2 {
        return vec![1; n];
    }
    let mut parent = vec![usize::MAX; 2 * n - 1];
    let mut heap: BinaryHeap<_> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Reverse((w, i)))
        .collect();
    let mut next = n;
    while let (Some(Reverse((wa, a))), Some(Reverse((wb, b)))) = (heap.pop(), heap.pop()) {
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((wa + wb, next)));
        next += 1;
    }
    (0..n)
        .map(|mut node| {
            let mut depth = 0;
            while parent[node] != usize::MAX {
                node = parent[node];
                depth += 1;
            }
            depth
        })
        .collect()
}

/// Shortens codes longer than `limit`, keeping the Kraft sum at one
fn limit_lengths(lengths: &mut [u32], limit: u32) {
    let Some(&max) = lengths.iter().max() else {
        return;
    };
    if max <= limit {
        return;
    }
    let mut counts = vec![0u32; max as usize + 1];
    for &l in lengths.iter() {
        counts[l as usize] += 1;
    }
    let mut i = max as usize;
    while i > limit as usize {
        while counts[i] > 0 {
            let mut j = i - 2;
            while counts[j] == 0 {
                j -= 1;
            }
            counts[i] -= 2;
            counts[i - 1] += 1;
            counts[j + 1] += 2;
            counts[j] -= 1;
        }
        i -= 1;
    }
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&s| (lengths[s], s));
    let mut symbols = order.into_iter();
    for (len, &count) in counts.iter().enumerate() {
        for s in symbols.by_ref().take(count as usize) {
            // len never exceeds `max`, itself a u32
            lengths[s] = len as u32;
        }
    }
}

/// Canonical codes for `lengths`, bit-reversed for LSB-first transmission
fn canonical_codes(lengths: &[u32]) -> Vec<u16> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&s| (lengths[s], s));
    let mut codes = vec![0u16; lengths.len()];
    let mut code = 0u32;
    let mut prev = order.first().map_or(0, |&s| lengths[s]);
    for s in order {
        let len = lengths[s];
        code <<= len - prev;
        prev = len;
        // lengths are limited to 16 bits
        codes[s] = ((code as u16).reverse_bits()) >> (16 - len);
        code += 1;
    }
    codes
}

fn code_words(values: &[u16], weights: &[u64]) -> Vec<CodeWord> {
    let mut lengths = huffman_lengths(weights);
    limit_lengths(&mut lengths, MAX_CODE_LENGTH);
    let codes = canonical_codes(&lengths);
    values
        .iter()
        .zip(codes)
        .zip(lengths)
        .map(|((&value, code), len)| CodeWord {
            value,
            code,
            // bounded by MAX_CODE_LENGTH
            len: len as u8,
        })
        .collect()
}

fn build_predictive(index: u8) -> Preset {
    let step = if index < 8 { 1 } else { i32::from(index) - 6 };
    let spread = SPREAD[usize::from(index % 8)];

    let mut requant = [0u8; 256];
    for (s, r) in requant.iter_mut().enumerate() {
        // symbols are residual bytes read as signed values
        *r = requantize(i32::from(s as u8 as i8), step) as i8 as u8;
    }

    let mut values: Vec<i32> = requant.iter().map(|&r| i32::from(r as i8)).collect();
    values.sort_by_key(|&v| (v.abs(), v < 0));
    values.dedup();
    let weights: Vec<u64> = values.iter().map(|&v| weight(v, spread)).collect();
    let raw: Vec<u16> = values.iter().map(|&v| u16::from(v as i8 as u8)).collect();
    let words = code_words(&raw, &weights);

    let mut codes = PresetCodes {
        code: [0; 256],
        len: [0; 256],
        requant,
    };
    for s in 0..256 {
        let word = words
            .iter()
            .find(|w| w.value == u16::from(requant[s]))
            .copied()
            .unwrap_or(CodeWord {
                value: 0,
                code: 0,
                len: 0,
            });
        codes.code[s] = word.code;
        codes.len[s] = word.len;
    }
    let table = DecodeTable::from_code_words(codes.insertion_order());
    debug!(
        "predictive preset {index}: {} values, {} nodes",
        values.len(),
        table.len()
    );
    Preset { codes, table }
}

fn build_coefficient(class: u8) -> (CodeBook, DecodeTable) {
    let max_magnitude = 2i32 << class;
    let spread = 1u64 << class;

    let mut values = vec![0i32];
    for m in 1..=max_magnitude {
        values.extend([m, -m]);
    }
    let mut weights: Vec<u64> = values.iter().map(|&v| weight(v, spread)).collect();
    let mut raw: Vec<u16> = values.iter().map(|&v| v as i16 as u16).collect();
    raw.extend([LARGE_NEGATIVE, LARGE_POSITIVE]);
    weights.extend([1, 1]);

    let book = CodeBook {
        max_magnitude,
        words: code_words(&raw, &weights),
    };
    let table = DecodeTable::from_code_words(book.words.iter().copied());
    debug!(
        "coefficient class {class}: {} words, {} nodes",
        book.words.len(),
        table.len()
    );
    (book, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bits::BitReader, huffman::tests::BitWriter};

    fn kraft(lengths: impl Iterator<Item = u32>) -> f64 {
        lengths.map(|l| 0.5f64.powi(l as i32)).sum()
    }

    #[test]
    fn length_limit_preserves_kraft_sum() {
        let weights: Vec<u64> = (0..300).map(|i| 1u64 << (40 - (i / 8).min(40))).collect();
        let mut lengths = huffman_lengths(&weights);
        assert!(lengths.iter().any(|&l| l > MAX_CODE_LENGTH));
        limit_lengths(&mut lengths, MAX_CODE_LENGTH);
        assert!(lengths.iter().all(|&l| (1..=MAX_CODE_LENGTH).contains(&l)));
        assert!((kraft(lengths.iter().copied()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn every_preset_decodes_every_symbol_to_its_requant() {
        for index in 0..PRESET_COUNT {
            let codes = predictive_codes(index).unwrap();
            let table = predictive_table(index).unwrap();
            assert!(table.len() <= 256, "preset {index} has {} nodes", table.len());
            let mut w = BitWriter::default();
            for s in 0..=255u8 {
                assert!(u32::from(codes.len[usize::from(s)]) <= MAX_CODE_LENGTH);
                w.put_word(codes.encode(s));
            }
            let mut r = BitReader::new(&w.bytes);
            for s in 0..=255u8 {
                let decoded = table.decode_residual(&mut r).unwrap();
                assert_eq!(
                    decoded as u8,
                    codes.requant[usize::from(s)],
                    "preset {index}, symbol {s}"
                );
            }
        }
    }

    #[test]
    fn lossless_presets_are_identity() {
        for index in 0..8 {
            let codes = predictive_codes(index).unwrap();
            assert!((0..=255u8).all(|s| codes.requant[usize::from(s)] == s));
        }
        let coarse = predictive_codes(15).unwrap();
        assert_eq!(coarse.requant[4] as i8, 0);
        assert_eq!(coarse.requant[5] as i8, 9);
        assert_eq!(coarse.requant[251] as i8, -9);
    }

    #[test]
    fn small_residuals_get_short_codes() {
        let codes = predictive_codes(0).unwrap();
        assert!(codes.len[0] <= codes.len[1]);
        assert!(codes.len[1] < codes.len[100]);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!(matches!(
            predictive_table(16),
            Err(Error::UnsupportedTable(16))
        ));
    }

    #[test]
    fn coefficient_books_round_trip() {
        for class in 0..COEFFICIENT_CLASSES {
            let book = coefficient_codes(class);
            let table = coefficient_table(class);
            assert!(
                (kraft(book.words().iter().map(|w| u32::from(w.len))) - 1.0).abs() < 1e-9
            );
            let max = book.max_magnitude();
            let mut w = BitWriter::default();
            for v in -max..=max {
                w.put_word(book.code_for(v).unwrap());
            }
            w.put_word(book.escape(false));
            w.put(1000, 15);
            w.put_word(book.escape(true));
            w.put(5, 15);
            let mut r = BitReader::new(&w.bytes);
            for v in -max..=max {
                assert_eq!(table.decode_coefficient(&mut r).unwrap(), v);
            }
            assert_eq!(table.decode_coefficient(&mut r).unwrap(), 1000);
            assert_eq!(table.decode_coefficient(&mut r).unwrap(), 5 - 32768);
            assert!(book.code_for(max + 1).is_none());
        }
    }
}
