//! SIG field formats
//!
//! ## L-SIG (24 bits, one BPSK symbol)
//!
//! ```text
//!  0..4    5      5..17          17      18..24
//! ┌──────┬─────┬──────────────┬────────┬────────┐
//! │ RATE │ res │ LENGTH (LSB) │ parity │ tail=0 │
//! └──────┴─────┴──────────────┴────────┴────────┘
//! ```
//!
//! ## HT-SIG (48 bits, two QBPSK symbols)
//!
//! ```text
//! HT-SIG1:  MCS(7, LSB first) CBW(1) LENGTH(16, LSB first)
//! HT-SIG2:  smoothing not-sounding reserved=1 aggregation STBC(2) FEC
//!           short-GI ext-SS(2) CRC-8(over bits 0..34) tail(6)
//! ```
//!
//! Both are coded at rate 1/2 with a terminated trellis and interleaved per
//! 48-bit symbol with the BPSK interleaver.

use crate::bits::{push_lsb_first, read_lsb_first};
use crate::coding::{crc8, crc8_bits, ConvolutionalEncoder, Interleaver, ViterbiDecoder};
use crate::error::DecodeFailure;
use crate::types::Bit;

/// Coded bits per SIG symbol
pub const SIG_CODED_BITS: usize = 48;

fn sig_interleaver() -> Interleaver {
    Interleaver::new(SIG_CODED_BITS, 1, 16)
}

/// Legacy SIGNAL field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacySignal {
    /// RATE bits, R1 as MSB
    pub rate_bits: u8,
    /// PSDU length in octets (12 bits)
    pub length: u16,
}

impl LegacySignal {
    pub fn to_bits(&self) -> Vec<Bit> {
        let mut bits = Vec::with_capacity(24);
        for i in (0..4).rev() {
            bits.push((self.rate_bits >> i) & 1);
        }
        bits.push(0);
        push_lsb_first(&mut bits, self.length as u32, 12);
        let parity = bits.iter().fold(0, |acc, &b| acc ^ b);
        bits.push(parity);
        bits.extend([0; 6]);
        bits
    }

    /// Parse and check a decoded SIGNAL field
    pub fn parse(bits: &[Bit]) -> Result<Self, DecodeFailure> {
        if bits.len() < 24 {
            return Err(DecodeFailure::SignalParity);
        }
        if bits[..18].iter().fold(0, |acc, &b| acc ^ b) != 0 {
            return Err(DecodeFailure::SignalParity);
        }
        if bits[4] != 0 {
            return Err(DecodeFailure::ReservedBit);
        }
        let rate_bits = bits[..4].iter().fold(0u8, |acc, &b| (acc << 1) | b);
        Ok(Self {
            rate_bits,
            length: read_lsb_first(&bits[5..17]) as u16,
        })
    }
}

/// HT-SIG field (single stream, BCC, long guard interval)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtSignal {
    pub mcs: u8,
    /// 40 MHz channel
    pub cbw40: bool,
    /// PSDU length in octets
    pub length: u16,
}

impl HtSignal {
    pub fn to_bits(&self) -> Vec<Bit> {
        let mut bits = Vec::with_capacity(48);
        push_lsb_first(&mut bits, self.mcs as u32, 7);
        bits.push(self.cbw40 as Bit);
        push_lsb_first(&mut bits, self.length as u32, 16);
        // smoothing, not sounding, reserved, no aggregation
        bits.extend([1, 1, 1, 0]);
        // STBC(2), FEC=BCC, long GI, no extension streams
        bits.extend([0, 0, 0, 0, 0, 0]);
        let crc = crc8_bits(&bits);
        bits.extend(crc);
        bits.extend([0; 6]);
        bits
    }

    /// Parse and check a decoded HT-SIG field
    pub fn parse(bits: &[Bit]) -> Result<Self, DecodeFailure> {
        if bits.len() < 48 {
            return Err(DecodeFailure::SignalCrc);
        }
        let received = bits[34..42].iter().fold(0u8, |acc, &b| (acc << 1) | b);
        if crc8(&bits[..34]) != received {
            return Err(DecodeFailure::SignalCrc);
        }
        if bits[26] != 1 {
            return Err(DecodeFailure::ReservedBit);
        }
        let mcs = read_lsb_first(&bits[..7]) as u8;
        // STBC, LDPC, short GI and extension streams are not receivable here
        if bits[28..34].iter().any(|&b| b != 0) {
            return Err(DecodeFailure::UnsupportedMcs(mcs));
        }
        Ok(Self {
            mcs,
            cbw40: bits[7] == 1,
            length: read_lsb_first(&bits[8..24]) as u16,
        })
    }
}

/// Encode SIG bits into one interleaved 48-bit block per symbol
pub fn encode_sig(bits: &[Bit]) -> Vec<Vec<Bit>> {
    let coded = ConvolutionalEncoder::new().encode(bits);
    let interleaver = sig_interleaver();
    coded
        .chunks(SIG_CODED_BITS)
        .map(|block| interleaver.interleave(block))
        .collect()
}

/// Decode per-symbol SIG soft bits back to the field bits
pub fn decode_sig(symbols: &[Vec<f64>]) -> Vec<Bit> {
    let interleaver = sig_interleaver();
    let soft: Vec<f64> = symbols
        .iter()
        .flat_map(|llrs| interleaver.deinterleave(llrs))
        .collect();
    ViterbiDecoder::new().decode(&soft, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::viterbi::hard_to_soft;

    #[test]
    fn test_legacy_signal_layout() {
        let sig = LegacySignal {
            rate_bits: 0b1101,
            length: 100,
        };
        let bits = sig.to_bits();
        assert_eq!(bits.len(), 24);
        assert_eq!(&bits[..5], &[1, 1, 0, 1, 0]);
        // 100 = 0b000001100100, LSB first
        assert_eq!(&bits[5..17], &[0, 0, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0]);
        assert_eq!(bits[..18].iter().filter(|&&b| b == 1).count() % 2, 0);
        assert_eq!(LegacySignal::parse(&bits), Ok(sig));
    }

    #[test]
    fn test_legacy_signal_checks() {
        let mut bits = LegacySignal {
            rate_bits: 0b0101,
            length: 7,
        }
        .to_bits();
        bits[10] ^= 1;
        assert_eq!(LegacySignal::parse(&bits), Err(DecodeFailure::SignalParity));
        bits[10] ^= 1;
        bits[4] = 1;
        bits[17] ^= 1;
        assert_eq!(LegacySignal::parse(&bits), Err(DecodeFailure::ReservedBit));
    }

    #[test]
    fn test_ht_signal_layout() {
        let sig = HtSignal {
            mcs: 5,
            cbw40: true,
            length: 1500,
        };
        let bits = sig.to_bits();
        assert_eq!(bits.len(), 48);
        assert_eq!(&bits[..8], &[1, 0, 1, 0, 0, 0, 0, 1]);
        assert_eq!(&bits[24..28], &[1, 1, 1, 0]);
        assert!(bits[42..].iter().all(|&b| b == 0));
        assert_eq!(HtSignal::parse(&bits), Ok(sig));
    }

    #[test]
    fn test_ht_signal_crc() {
        let mut bits = HtSignal {
            mcs: 0,
            cbw40: false,
            length: 1,
        }
        .to_bits();
        bits[12] ^= 1;
        assert_eq!(HtSignal::parse(&bits), Err(DecodeFailure::SignalCrc));
    }

    #[test]
    fn test_sig_coding_round_trip() {
        let bits = HtSignal {
            mcs: 3,
            cbw40: false,
            length: 321,
        }
        .to_bits();
        let blocks = encode_sig(&bits);
        assert_eq!(blocks.len(), 2);
        let soft: Vec<Vec<f64>> = blocks.iter().map(|b| hard_to_soft(b)).collect();
        assert_eq!(decode_sig(&soft), bits);
    }
}
