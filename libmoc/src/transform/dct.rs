//! 16-point discrete cosine transform
//!
//! The inverse splits each transform into even and odd halves recursively, so every cosine
//! it needs is one of `cos(k * pi / 32)`.

use std::f64::consts::FRAC_1_SQRT_2;

use super::{clamp_pixel, transpose, BLOCK_AREA, BLOCK_SIZE};

/// `cos(k * pi / 32)` for `k` in `0..=16`
const COS_32: [f64; 17] = [
    1.0,
    0.995_184_726_672_196_9,
    0.980_785_280_403_230_4,
    0.956_940_335_732_208_8,
    0.923_879_532_511_286_7,
    0.881_921_264_348_355,
    0.831_469_612_302_545_2,
    0.773_010_453_362_737,
    0.707_106_781_186_547_6,
    0.634_393_284_163_645_5,
    0.555_570_233_019_602_3,
    0.471_396_736_825_997_8,
    0.382_683_432_365_089_8,
    0.290_284_677_254_462_3,
    0.195_090_322_016_128_3,
    0.098_017_140_329_560_77,
    0.0,
];

/// Scale between the unnormalised 2-D inverse and an orthonormal one
const NORMALIZATION: f64 = 8.0;

fn cos32(m: usize) -> f64 {
    match m % 64 {
        m @ 0..=16 => COS_32[m],
        m @ 17..=32 => -COS_32[32 - m],
        m @ 33..=48 => -COS_32[m - 32],
        m => COS_32[64 - m],
    }
}

/// `out[i] = sum_k c[k] * cos((2i + 1) * k * pi / (2n))` for `n = c.len()` in {1, 2, 4, 8, 16}
fn idct_core(c: &[f64], out: &mut [f64]) {
    let n = c.len();
    if n == 1 {
        out[0] = c[0];
        return;
    }
    let half = n / 2;
    let step = BLOCK_SIZE / n;
    let mut even = [0.0; BLOCK_SIZE / 2];
    for (j, e) in even.iter_mut().take(half).enumerate() {
        *e = c[2 * j];
    }
    let mut even_out = [0.0; BLOCK_SIZE / 2];
    idct_core(&even[..half], &mut even_out[..half]);
    for i in 0..half {
        let odd: f64 = (0..half)
            .map(|j| {
                let k = 2 * j + 1;
                c[k] * cos32((2 * i + 1) * k * step)
            })
            .sum();
        out[i] = even_out[i] + odd;
        out[n - 1 - i] = even_out[i] - odd;
    }
}

/// Unnormalised 16-point inverse with the DC term weighted by `1/sqrt(2)`
pub fn inverse_1d(v: &mut [f64; BLOCK_SIZE]) {
    let mut c = *v;
    c[0] *= FRAC_1_SQRT_2;
    idct_core(&c, v);
}

/// Orthonormal 16-point forward transform
pub fn forward_1d(v: &mut [f64; BLOCK_SIZE]) {
    let x = *v;
    let scale = (2.0 / BLOCK_SIZE as f64).sqrt();
    for (k, out) in v.iter_mut().enumerate() {
        let sum: f64 = x
            .iter()
            .enumerate()
            .map(|(n, &x)| x * cos32((2 * n + 1) * k))
            .sum();
        let weight = if k == 0 { FRAC_1_SQRT_2 } else { 1.0 };
        *out = scale * weight * sum;
    }
}

fn apply_2d(block: &mut [[f64; BLOCK_SIZE]; BLOCK_SIZE], f: fn(&mut [f64; BLOCK_SIZE])) {
    block.iter_mut().for_each(f);
    transpose(block);
    block.iter_mut().for_each(f);
    transpose(block);
}

/// 2-D inverse of a row-major coefficient block, rounded and clamped to pixels
#[must_use]
pub fn inverse_2d(coefficients: &[i32; BLOCK_AREA]) -> [u8; BLOCK_AREA] {
    let mut block = [[0.0; BLOCK_SIZE]; BLOCK_SIZE];
    for (i, &c) in coefficients.iter().enumerate() {
        block[i / BLOCK_SIZE][i % BLOCK_SIZE] = f64::from(c);
    }
    apply_2d(&mut block, inverse_1d);
    std::array::from_fn(|i| {
        // rounded and then clamped, so the cast cannot overflow
        clamp_pixel((block[i / BLOCK_SIZE][i % BLOCK_SIZE] / NORMALIZATION).round() as i64)
    })
}

/// Orthonormal 2-D forward transform of a row-major block
#[must_use]
pub fn forward_2d(pixels: &[f64; BLOCK_AREA]) -> [f64; BLOCK_AREA] {
    let mut block = [[0.0; BLOCK_SIZE]; BLOCK_SIZE];
    for (i, &p) in pixels.iter().enumerate() {
        block[i / BLOCK_SIZE][i % BLOCK_SIZE] = p;
    }
    apply_2d(&mut block, forward_1d);
    std::array::from_fn(|i| block[i / BLOCK_SIZE][i % BLOCK_SIZE])
}
