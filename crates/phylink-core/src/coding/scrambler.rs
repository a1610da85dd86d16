//! Frame-synchronous scrambler, S(x) = x^7 + x^4 + 1
//!
//! The same LFSR scrambles on transmit and descrambles on receive. The
//! receiver never needs the seed: the first 7 SERVICE bits are zero before
//! scrambling, so the first 7 received bits *are* the LFSR output, and after
//! 7 steps the register holds exactly those bits.
//!
//! ```text
//!   ┌──┬──┬──┬──┬──┬──┬──┐
//!   │x1│x2│x3│x4│x5│x6│x7│──┐
//!   └──┴──┴──┴─┬┴──┴──┴──┘  │
//!      ▲        └────(+)◄───┘
//!      └──────────────┤
//!                     ▼
//!   data ─────────────(+)───► scrambled
//! ```

use crate::types::Bit;

/// 7-bit additive scrambler
#[derive(Debug, Clone)]
pub struct Scrambler {
    /// Register, bit 6 = x7 (oldest), bit 3 = x4
    state: u8,
}

impl Scrambler {
    /// Create a scrambler with a 7-bit seed (zero is a lock-up state)
    pub fn new(seed: u8) -> Self {
        Self { state: seed & 0x7F }
    }

    /// Advance the LFSR one step and return the output bit
    #[inline]
    pub fn next_bit(&mut self) -> Bit {
        let fb = ((self.state >> 6) ^ (self.state >> 3)) & 1;
        self.state = ((self.state << 1) | fb) & 0x7F;
        fb
    }

    /// Scramble (or descramble) a bit sequence in place
    pub fn apply(&mut self, bits: &mut [Bit]) {
        for bit in bits.iter_mut() {
            *bit ^= self.next_bit();
        }
    }

    /// Current register contents
    pub fn state(&self) -> u8 {
        self.state
    }

    /// Rebuild the register from the first 7 scrambled bits of an all-zero
    /// prefix. The returned scrambler continues at bit 7.
    pub fn from_zero_prefix(first_seven: &[Bit]) -> Self {
        let state = first_seven
            .iter()
            .take(7)
            .fold(0u8, |acc, &b| (acc << 1) | (b & 1));
        Self { state }
    }
}

/// The 127-element pilot polarity sequence p_0..p_126 (+1/-1)
///
/// Generated by the scrambler with the all-ones seed, mapping 0 → +1 and
/// 1 → -1.
pub fn pilot_polarity() -> [f64; 127] {
    let mut scrambler = Scrambler::new(0x7F);
    let mut seq = [0.0; 127];
    for p in seq.iter_mut() {
        *p = if scrambler.next_bit() == 0 { 1.0 } else { -1.0 };
    }
    seq
}
