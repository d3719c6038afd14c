//! Zig-zag scan order of a 16x16 block

use super::{BLOCK_AREA, BLOCK_SIZE};

/// Row-major position of the `k`-th coefficient in scan order
pub const ZIGZAG: [u8; BLOCK_AREA] = zigzag();

/// Scan position of each row-major coefficient (the inverse of [`ZIGZAG`])
pub const UNZIGZAG: [u8; BLOCK_AREA] = invert(&ZIGZAG);

const fn zigzag() -> [u8; BLOCK_AREA] {
    let mut table = [0u8; BLOCK_AREA];
    let mut k = 0;
    let mut diagonal = 0;
    while diagonal < 2 * BLOCK_SIZE - 1 {
        let mut i = 0;
        while i <= diagonal {
            // even diagonals run bottom-left to top-right, odd ones the other way
            let (row, col) = if diagonal % 2 == 0 {
                (diagonal - i, i)
            } else {
                (i, diagonal - i)
            };
            if row < BLOCK_SIZE && col < BLOCK_SIZE {
                table[k] = (row * BLOCK_SIZE + col) as u8;
                k += 1;
            }
            i += 1;
        }
        diagonal += 1;
    }
    table
}

const fn invert(table: &[u8; BLOCK_AREA]) -> [u8; BLOCK_AREA] {
    let mut inverse = [0u8; BLOCK_AREA];
    let mut k = 0;
    while k < BLOCK_AREA {
        inverse[table[k] as usize] = k as u8;
        k += 1;
    }
    inverse
}

/// Moves coefficients from scan order to row-major order
#[must_use]
pub fn to_row_major(scan: &[i32; BLOCK_AREA]) -> [i32; BLOCK_AREA] {
    let mut block = [0; BLOCK_AREA];
    for (&pos, &value) in ZIGZAG.iter().zip(scan) {
        block[usize::from(pos)] = value;
    }
    block
}
