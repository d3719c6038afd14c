//! End-around-carry (EAC) checksums
//!
//! Every byte (or little-endian 16-bit word) is added into an accumulator and the carry out
//! of the low 8 (or 16) bits is folded back into the low bits. Type-1 checksums store the sum
//! itself in the trailing bytes; type-2 checksums store its complement so that the sum over the
//! whole buffer comes out all ones. MOC fragments carry an 8-bit type-2 checksum.

use crate::Error;

/// Value an 8-bit type-2 stamped buffer sums to
pub const CS8_VALID: u8 = 0xff;
/// Value a 16-bit type-2 stamped buffer sums to
pub const CS16_VALID: u16 = 0xffff;

/// 8-bit EAC sum of `bytes`
#[must_use]
pub fn compute8(bytes: &[u8]) -> u8 {
    let mut sum = 0u32;
    for &b in bytes {
        sum += u32::from(b);
        if sum > 0xff {
            sum = (sum & 0xff) + 1;
        }
    }
    // the fold above keeps the sum within a byte
    sum as u8
}

/// 16-bit EAC sum of `bytes`, read as little-endian words
///
/// A trailing odd byte is taken as the low byte of a final word.
#[must_use]
pub fn compute16(bytes: &[u8]) -> u16 {
    let mut sum = 0u32;
    for word in bytes.chunks(2) {
        let lo = u32::from(word[0]);
        let hi = word.get(1).map_or(0, |&b| u32::from(b));
        sum += lo | (hi << 8);
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
    }
    sum as u16
}

fn split_trailer(bytes: &mut [u8], width: usize) -> Result<(&mut [u8], &mut [u8]), Error> {
    if bytes.len() < width {
        return Err(Error::BufferTooShort {
            len: bytes.len(),
            width,
        });
    }
    let at = bytes.len() - width;
    Ok(bytes.split_at_mut(at))
}

/// Writes the 8-bit sum of all but the last byte into the last byte
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] for an empty buffer.
pub fn apply_type1_8(bytes: &mut [u8]) -> Result<(), Error> {
    let (body, trailer) = split_trailer(bytes, 1)?;
    trailer[0] = compute8(body);
    Ok(())
}

/// Writes the complement of the 8-bit sum of all but the last byte into the last byte
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] for an empty buffer.
pub fn apply_type2_8(bytes: &mut [u8]) -> Result<(), Error> {
    let (body, trailer) = split_trailer(bytes, 1)?;
    trailer[0] = CS8_VALID - compute8(body);
    Ok(())
}

/// Writes the 16-bit sum of all but the last two bytes into the last two bytes (little-endian)
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] for buffers shorter than two bytes.
pub fn apply_type1_16(bytes: &mut [u8]) -> Result<(), Error> {
    let (body, trailer) = split_trailer(bytes, 2)?;
    trailer.copy_from_slice(&compute16(body).to_le_bytes());
    Ok(())
}

/// Writes the complement of the 16-bit sum of all but the last two bytes into the last two bytes
///
/// On odd-length buffers the trailer straddles a word boundary and is stored byte-swapped.
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] for buffers shorter than two bytes.
pub fn apply_type2_16(bytes: &mut [u8]) -> Result<(), Error> {
    let odd = bytes.len() & 1 == 1;
    let (body, trailer) = split_trailer(bytes, 2)?;
    let value = CS16_VALID - compute16(body);
    if odd {
        trailer.copy_from_slice(&value.to_be_bytes());
    } else {
        trailer.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

/// Verifies a buffer stamped by [`apply_type1_8`]
#[must_use]
pub fn check_type1_8(bytes: &[u8]) -> bool {
    match bytes.split_last() {
        Some((&cs, body)) => compute8(body) == cs,
        None => false,
    }
}

/// Verifies a buffer stamped by [`apply_type2_8`]
#[must_use]
pub fn check_type2_8(bytes: &[u8]) -> bool {
    !bytes.is_empty() && compute8(bytes) == CS8_VALID
}

/// Verifies a buffer stamped by [`apply_type1_16`]
#[must_use]
pub fn check_type1_16(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 2);
    compute16(body) == u16::from_le_bytes([trailer[0], trailer[1]])
}

/// Verifies a buffer stamped by [`apply_type2_16`]
#[must_use]
pub fn check_type2_16(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && compute16(bytes) == CS16_VALID
}
