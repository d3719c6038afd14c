//! Sequency-ordered Walsh-Hadamard transform

use super::{clamp_pixel, transpose, BLOCK_AREA, BLOCK_SIZE};

/// Natural (Hadamard) row of each sequency index: bit-reversed Gray code
const SEQUENCY_TO_NATURAL: [usize; BLOCK_SIZE] = sequency_order();

const fn sequency_order() -> [usize; BLOCK_SIZE] {
    let mut order = [0; BLOCK_SIZE];
    let mut s = 0;
    while s < BLOCK_SIZE {
        let gray = s ^ (s >> 1);
        let mut reversed = 0;
        let mut bit = 0;
        while bit < 4 {
            reversed |= ((gray >> bit) & 1) << (3 - bit);
            bit += 1;
        }
        order[s] = reversed;
        s += 1;
    }
    order
}

fn butterflies(v: &mut [i64; BLOCK_SIZE]) {
    let mut half = 1;
    while half < BLOCK_SIZE {
        for start in (0..BLOCK_SIZE).step_by(half * 2) {
            for j in start..start + half {
                let (a, b) = (v[j], v[j + half]);
                v[j] = a + b;
                v[j + half] = a - b;
            }
        }
        half *= 2;
    }
}

/// Unnormalised 16-point inverse; input in sequency order
pub fn inverse_1d(v: &mut [i64; BLOCK_SIZE]) {
    let mut natural = [0; BLOCK_SIZE];
    for (s, &value) in v.iter().enumerate() {
        natural[SEQUENCY_TO_NATURAL[s]] = value;
    }
    butterflies(&mut natural);
    *v = natural;
}

/// Unnormalised 16-point forward transform; output in sequency order
pub fn forward_1d(v: &mut [i64; BLOCK_SIZE]) {
    let mut natural = *v;
    butterflies(&mut natural);
    for (s, out) in v.iter_mut().enumerate() {
        *out = natural[SEQUENCY_TO_NATURAL[s]];
    }
}

fn apply_2d(block: &mut [[i64; BLOCK_SIZE]; BLOCK_SIZE], f: fn(&mut [i64; BLOCK_SIZE])) {
    block.iter_mut().for_each(f);
    transpose(block);
    block.iter_mut().for_each(f);
    transpose(block);
}

/// 2-D inverse of a row-major coefficient block, normalised by 256 and clamped to pixels
#[must_use]
pub fn inverse_2d(coefficients: &[i32; BLOCK_AREA]) -> [u8; BLOCK_AREA] {
    let mut block = [[0i64; BLOCK_SIZE]; BLOCK_SIZE];
    for (i, &c) in coefficients.iter().enumerate() {
        block[i / BLOCK_SIZE][i % BLOCK_SIZE] = i64::from(c);
    }
    apply_2d(&mut block, inverse_1d);
    std::array::from_fn(|i| clamp_pixel(block[i / BLOCK_SIZE][i % BLOCK_SIZE] >> 8))
}

/// 2-D forward transform of a row-major pixel block (no normalisation)
#[must_use]
pub fn forward_2d(pixels: &[u8; BLOCK_AREA]) -> [i32; BLOCK_AREA] {
    let mut block = [[0i64; BLOCK_SIZE]; BLOCK_SIZE];
    for (i, &p) in pixels.iter().enumerate() {
        block[i / BLOCK_SIZE][i % BLOCK_SIZE] = i64::from(p);
    }
    apply_2d(&mut block, forward_1d);
    // |coefficient| <= 256 * 255
    std::array::from_fn(|i| block[i / BLOCK_SIZE][i % BLOCK_SIZE] as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequency_index_counts_sign_changes() {
        for s in 0..BLOCK_SIZE {
            let mut v = [0i64; BLOCK_SIZE];
            v[s] = 1;
            inverse_1d(&mut v);
            assert!(v.iter().all(|&x| x == 1 || x == -1));
            let changes = v.windows(2).filter(|w| w[0] != w[1]).count();
            assert_eq!(changes, s, "sequency {s}: {v:?}");
        }
    }

    #[test]
    fn forward_then_inverse_is_exact() {
        let blocks: [[u8; BLOCK_AREA]; 3] = [
            std::array::from_fn(|i| (i * 7 % 256) as u8),
            std::array::from_fn(|i| if (i / 16 + i % 16) % 2 == 0 { 255 } else { 0 }),
            [42; BLOCK_AREA],
        ];
        for b in blocks {
            assert_eq!(inverse_2d(&forward_2d(&b)), b);
        }
    }

    #[test]
    fn flat_block_has_only_dc() {
        let coefficients = forward_2d(&[100; BLOCK_AREA]);
        assert_eq!(coefficients[0], 25_600);
        assert!(coefficients[1..].iter().all(|&c| c == 0));
    }
}
