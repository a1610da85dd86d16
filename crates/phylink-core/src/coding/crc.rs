//! CRC-8 for the HT-SIG field
//!
//! Polynomial x^8 + x^2 + x + 1, register preset to all ones, output
//! ones-complemented and transmitted MSB (c7) first.

use crate::types::Bit;

const POLY: u8 = 0x07;

/// Compute the HT-SIG CRC over a bit sequence
pub fn crc8(bits: &[Bit]) -> u8 {
    let mut reg: u8 = 0xFF;
    for &bit in bits {
        let fb = ((reg >> 7) ^ bit) & 1;
        reg <<= 1;
        if fb == 1 {
            reg ^= POLY;
        }
    }
    !reg
}

/// CRC as 8 bits, c7 first
pub fn crc8_bits(bits: &[Bit]) -> [Bit; 8] {
    let crc = crc8(bits);
    let mut out = [0; 8];
    for (i, b) in out.iter_mut().enumerate() {
        *b = (crc >> (7 - i)) & 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        // Preset register complemented
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_detects_single_bit_flips() {
        let bits: Vec<u8> = (0..34).map(|i| ((i * 3) % 5 == 0) as u8).collect();
        let reference = crc8(&bits);
        for i in 0..bits.len() {
            let mut flipped = bits.clone();
            flipped[i] ^= 1;
            assert_ne!(crc8(&flipped), reference, "flip at {} undetected", i);
        }
    }

    #[test]
    fn test_bits_order() {
        let bits = vec![1, 0, 1, 1];
        let crc = crc8(&bits);
        let as_bits = crc8_bits(&bits);
        let rebuilt = as_bits.iter().fold(0u8, |acc, &b| (acc << 1) | b);
        assert_eq!(rebuilt, crc);
    }
}
