//! CRC-32C (Castagnoli) checksums, plus the fixed "masking" transform the
//! on-disk format applies before storing a checksum.

use crc::{crc32, Hasher32};

/// Computes CRC-32C over `data`.
pub fn crc32c(data: &[u8]) -> u32 {
    let mut digest = crc32::Digest::new(crc32::CASTAGNOLI);
    digest.write(data);
    digest.sum32()
}

const MASK_DELTA: u32 = 0xa282ead8;

/// Masks a raw CRC for on-disk storage: rotate right 15, then add a
/// constant, wrapping on overflow. Applied identically on write and on
/// verification.
pub fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask`].
pub fn unmask(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}
