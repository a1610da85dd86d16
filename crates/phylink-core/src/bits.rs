//! Byte/bit conversion
//!
//! Payloads cross the host boundary as bytes and travel through the PHY as
//! one bit per `u8`. Both directions use MSB-first order within each byte;
//! the host depends on this ordering bit-for-bit.

use crate::types::Bit;

/// Unpack bytes to individual bits (MSB first)
pub fn bytes_to_bits(data: &[u8]) -> Vec<Bit> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for byte in data {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

/// Pack individual bits to bytes (MSB first)
///
/// A trailing group shorter than 8 bits is packed MSB-aligned.
pub fn bits_to_bytes(bits: &[Bit]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit & 1) << (7 - i)))
        })
        .collect()
}

/// Write `width` bits of `value`, least significant bit first
pub(crate) fn push_lsb_first(bits: &mut Vec<Bit>, value: u32, width: usize) {
    for i in 0..width {
        bits.push(((value >> i) & 1) as Bit);
    }
}

/// Read `bits` as an unsigned value, least significant bit first
pub(crate) fn read_lsb_first(bits: &[Bit]) -> u32 {
    bits.iter()
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (((b & 1) as u32) << i))
}
