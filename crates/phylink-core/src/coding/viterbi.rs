//! Soft-Decision Viterbi Decoder
//!
//! Maximum-likelihood decoder for the K=7 (133, 171) code. Soft inputs are
//! log-likelihood ratios with the convention `LLR > 0 ⇒ bit 0 more likely`;
//! an LLR of exactly zero is an erasure (used for punctured positions).
//!
//! The trellis is indexed by *next* state. For next state `ns`, the input
//! bit is its MSB (`ns >> 5`) and the two possible predecessors differ only
//! in the bit shifted out: `((ns << 1) & 63) | x` for `x ∈ {0, 1}`. One
//! decision bit per state per step is enough for traceback, so decisions
//! are stored as a `u64` bitmask per step.

use super::convolutional::{parity, CONSTRAINT_LENGTH, GEN_A, GEN_B};
use crate::types::Bit;

const NUM_STATES: usize = 1 << (CONSTRAINT_LENGTH - 1);

/// Viterbi decoder for the rate-1/2 mother code
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    /// Expected (A, B) output for each (next state, shifted-out bit)
    branches: [[(Bit, Bit); 2]; NUM_STATES],
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ViterbiDecoder {
    pub fn new() -> Self {
        let mut branches = [[(0, 0); 2]; NUM_STATES];
        for (ns, entry) in branches.iter_mut().enumerate() {
            let input = (ns >> (CONSTRAINT_LENGTH - 2)) as u32;
            for x in 0..2 {
                let prev = (((ns << 1) & (NUM_STATES - 1)) | x) as u32;
                let reg = (input << (CONSTRAINT_LENGTH - 1)) | prev;
                entry[x] = (parity(reg, GEN_A), parity(reg, GEN_B));
            }
        }
        Self { branches }
    }

    /// Decode a depunctured rate-1/2 soft stream.
    ///
    /// With `terminated` the traceback starts from the all-zero state (the
    /// stream ends with a zero tail); otherwise it starts from the
    /// best-metric state.
    pub fn decode(&self, soft: &[f64], terminated: bool) -> Vec<Bit> {
        let steps = soft.len() / 2;
        if steps == 0 {
            return Vec::new();
        }

        let mut metrics = [f64::INFINITY; NUM_STATES];
        metrics[0] = 0.0;
        let mut decisions: Vec<u64> = Vec::with_capacity(steps);

        for t in 0..steps {
            let la = soft[2 * t];
            let lb = soft[2 * t + 1];
            let mut next = [f64::INFINITY; NUM_STATES];
            let mut decision = 0u64;

            for ns in 0..NUM_STATES {
                let base = (ns << 1) & (NUM_STATES - 1);
                let mut best = f64::INFINITY;
                let mut best_x = 0;
                for x in 0..2 {
                    let (ea, eb) = self.branches[ns][x];
                    let cost = metrics[base | x] + branch_cost(ea, la) + branch_cost(eb, lb);
                    if cost < best {
                        best = cost;
                        best_x = x;
                    }
                }
                next[ns] = best;
                if best_x == 1 {
                    decision |= 1 << ns;
                }
            }

            // Keep metrics bounded
            let min = next.iter().copied().fold(f64::INFINITY, f64::min);
            if min.is_finite() {
                for m in next.iter_mut() {
                    *m -= min;
                }
            }
            metrics = next;
            decisions.push(decision);
        }

        let mut state = if terminated {
            0
        } else {
            metrics
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |(bi, bm), (i, &m)| if m < bm { (i, m) } else { (bi, bm) })
                .0
        };

        let mut out = vec![0; steps];
        for t in (0..steps).rev() {
            out[t] = (state >> (CONSTRAINT_LENGTH - 2)) as Bit;
            let x = ((decisions[t] >> state) & 1) as usize;
            state = ((state << 1) & (NUM_STATES - 1)) | x;
        }
        out
    }
}

/// Cost of hypothesising `expected` for a soft value (lower is better)
#[inline]
fn branch_cost(expected: Bit, llr: f64) -> f64 {
    if expected == 1 {
        llr
    } else {
        -llr
    }
}

/// Map hard bits to unit-confidence LLRs
pub fn hard_to_soft(bits: &[Bit]) -> Vec<f64> {
    bits.iter().map(|&b| if b & 1 == 0 { 1.0 } else { -1.0 }).collect()
}
