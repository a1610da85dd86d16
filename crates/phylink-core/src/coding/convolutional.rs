//! Convolutional Encoder and Puncturing
//!
//! The K=7, rate-1/2 binary convolutional code with generators 133 and 171
//! (octal). Higher rates are produced by deleting coded bits according to a
//! puncture pattern; the receiver re-inserts erasures (zero LLRs) in their
//! place before Viterbi decoding.
//!
//! ## Puncture Patterns
//!
//! Coded output is interleaved `A0 B0 A1 B1 ...`. A pattern row is repeated
//! every period of input bits:
//!
//! ```text
//! R=2/3   A: 1 1      B: 1 0          → A0 B0 A1
//! R=3/4   A: 1 1 0    B: 1 0 1        → A0 B0 A1 B2
//! R=5/6   A: 1 1 0 1 0  B: 1 0 1 0 1  → A0 B0 A1 B2 A3 B4
//! ```

use crate::rate::CodeRate;
use crate::types::Bit;

/// Constraint length
pub const CONSTRAINT_LENGTH: usize = 7;

/// Generator polynomial for output A (133 octal)
pub const GEN_A: u32 = 0o133;

/// Generator polynomial for output B (171 octal)
pub const GEN_B: u32 = 0o171;

/// Parity of the register masked by a generator
#[inline]
pub(crate) fn parity(reg: u32, gen: u32) -> Bit {
    ((reg & gen).count_ones() & 1) as Bit
}

/// K=7 rate-1/2 convolutional encoder
///
/// The register holds the last `K-1` input bits; the newest input occupies
/// the MSB of the 7-bit tap window.
#[derive(Debug, Clone, Default)]
pub struct ConvolutionalEncoder {
    state: u32,
}

impl ConvolutionalEncoder {
    pub fn new() -> Self {
        Self { state: 0 }
    }

    /// Encode bits at rate 1/2, producing `A B` pairs.
    ///
    /// No tail is appended: the caller places zero tail bits in the data.
    pub fn encode(&mut self, bits: &[Bit]) -> Vec<Bit> {
        let mut out = Vec::with_capacity(bits.len() * 2);
        for &bit in bits {
            let reg = (((bit & 1) as u32) << (CONSTRAINT_LENGTH - 1)) | self.state;
            out.push(parity(reg, GEN_A));
            out.push(parity(reg, GEN_B));
            self.state = reg >> 1;
        }
        out
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}

/// Puncture pattern rows (A, B) for a code rate
fn puncture_pattern(rate: CodeRate) -> (&'static [bool], &'static [bool]) {
    match rate {
        CodeRate::Half => (&[true], &[true]),
        CodeRate::TwoThirds => (&[true, true], &[true, false]),
        CodeRate::ThreeQuarters => (&[true, true, false], &[true, false, true]),
        CodeRate::FiveSixths => (
            &[true, true, false, true, false],
            &[true, false, true, false, true],
        ),
    }
}

/// Drop coded bits from a rate-1/2 stream to reach `rate`
pub fn puncture(coded: &[Bit], rate: CodeRate) -> Vec<Bit> {
    let (a, b) = puncture_pattern(rate);
    let period = a.len();
    coded
        .chunks(2)
        .enumerate()
        .flat_map(|(i, pair)| {
            let keep_a = a[i % period];
            let keep_b = b[i % period];
            let mut kept = Vec::with_capacity(2);
            if keep_a {
                kept.push(pair[0]);
            }
            if keep_b {
                if let Some(&bit) = pair.get(1) {
                    kept.push(bit);
                }
            }
            kept
        })
        .collect()
}

/// Re-insert erasures (0.0) where bits were punctured.
///
/// `input_bits` is the number of encoder input bits the stream covers; the
/// output always has `2 * input_bits` soft values. Missing trailing soft
/// values are treated as erasures.
pub fn depuncture(soft: &[f64], rate: CodeRate, input_bits: usize) -> Vec<f64> {
    let (a, b) = puncture_pattern(rate);
    let period = a.len();
    let mut out = Vec::with_capacity(input_bits * 2);
    let mut src = soft.iter().copied();
    for i in 0..input_bits {
        out.push(if a[i % period] { src.next().unwrap_or(0.0) } else { 0.0 });
        out.push(if b[i % period] { src.next().unwrap_or(0.0) } else { 0.0 });
    }
    out
}
