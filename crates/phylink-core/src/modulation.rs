//! Constellation mapping
//!
//! Gray-coded BPSK, QPSK, 16-QAM and 64-QAM with unit average power. The
//! first half of each bit group selects the I level, the second half the Q
//! level (BPSK uses I only).
//!
//! ```text
//! 16-QAM per axis:  00 → -3   01 → -1   11 → +1   10 → +3      K = 1/√10
//! 64-QAM per axis:  000 → -7  001 → -5  011 → -3  010 → -1
//!                   110 → +1  111 → +3  101 → +5  100 → +7     K = 1/√42
//! ```
//!
//! Soft demapping uses the piecewise-linear max-log approximation. LLRs are
//! positive when bit 0 is more likely.

use crate::rate::Modulation;
use crate::types::{Bit, IQSample};

/// Normalization factor K_MOD
fn k_mod(modulation: Modulation) -> f64 {
    match modulation {
        Modulation::Bpsk => 1.0,
        Modulation::Qpsk => 1.0 / 2.0_f64.sqrt(),
        Modulation::Qam16 => 1.0 / 10.0_f64.sqrt(),
        Modulation::Qam64 => 1.0 / 42.0_f64.sqrt(),
    }
}

/// PAM level for one axis from its bit group (first bit is the sign bit)
fn axis_level(bits: &[Bit]) -> f64 {
    match bits.len() {
        1 => 2.0 * bits[0] as f64 - 1.0,
        2 => [-3.0, -1.0, 3.0, 1.0][((bits[0] << 1) | bits[1]) as usize],
        3 => [-7.0, -5.0, -1.0, -3.0, 7.0, 5.0, 1.0, 3.0][((bits[0] << 2) | (bits[1] << 1) | bits[2]) as usize],
        _ => 0.0,
    }
}

/// Map one group of `bits_per_symbol` bits to a constellation point
pub fn map_symbol(modulation: Modulation, bits: &[Bit]) -> IQSample {
    let k = k_mod(modulation);
    match modulation {
        Modulation::Bpsk => IQSample::new(axis_level(&bits[..1]), 0.0),
        _ => {
            let half = modulation.bits_per_symbol() / 2;
            IQSample::new(
                axis_level(&bits[..half]) * k,
                axis_level(&bits[half..2 * half]) * k,
            )
        }
    }
}

/// Map a bit stream (length multiple of N_BPSC) to constellation points
pub fn map_bits(modulation: Modulation, bits: &[Bit]) -> Vec<IQSample> {
    bits.chunks(modulation.bits_per_symbol())
        .map(|chunk| map_symbol(modulation, chunk))
        .collect()
}

/// Soft bits for one axis, `y` in unnormalized level units
fn axis_llrs(y: f64, bits: usize, out: &mut Vec<f64>) {
    // Sign bit: negative levels carry 0
    out.push(-y);
    if bits >= 2 {
        let outer = if bits == 2 { 2.0 } else { 4.0 };
        out.push(y.abs() - outer);
    }
    if bits >= 3 {
        out.push((y.abs() - 4.0).abs() - 2.0);
    }
}

/// Soft-demap an equalized symbol, weighting by channel confidence
///
/// `weight` is typically |H|² of the subcarrier.
pub fn demap_soft(modulation: Modulation, sample: IQSample, weight: f64, out: &mut Vec<f64>) {
    let start = out.len();
    match modulation {
        Modulation::Bpsk => axis_llrs(sample.re, 1, out),
        _ => {
            let k = k_mod(modulation);
            let half = modulation.bits_per_symbol() / 2;
            axis_llrs(sample.re / k, half, out);
            axis_llrs(sample.im / k, half, out);
        }
    }
    for llr in &mut out[start..] {
        *llr *= weight;
    }
}

/// Hard decisions for a symbol (0/1 per bit)
pub fn demap_hard(modulation: Modulation, sample: IQSample) -> Vec<Bit> {
    let mut soft = Vec::with_capacity(modulation.bits_per_symbol());
    demap_soft(modulation, sample, 1.0, &mut soft);
    soft.iter().map(|&l| (l < 0.0) as Bit).collect()
}
