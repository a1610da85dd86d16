//! Block Interleaver
//!
//! Two-permutation interleaver operating on one OFDM symbol of coded bits.
//!
//! ```text
//! i = (N_CBPS / N_COL) · (k mod N_COL) + ⌊k / N_COL⌋
//! j = s · ⌊i / s⌋ + (i + N_CBPS − ⌊N_COL · i / N_CBPS⌋) mod s,   s = max(N_BPSC / 2, 1)
//! ```
//!
//! The first permutation spreads adjacent coded bits across non-adjacent
//! subcarriers; the second alternates them between more and less
//! significant constellation bits. `N_COL` is 16 for non-HT, 13 for HT
//! 20 MHz and 18 for HT 40 MHz.

use crate::types::Bit;

/// Precomputed interleaver permutation for one symbol size
#[derive(Debug, Clone)]
pub struct Interleaver {
    /// `perm[k] = j`: input bit k lands at output position j
    perm: Vec<usize>,
}

impl Interleaver {
    /// Build the permutation for `n_cbps` coded bits per symbol
    pub fn new(n_cbps: usize, n_bpsc: usize, n_col: usize) -> Self {
        let s = (n_bpsc / 2).max(1);
        let n_row = n_cbps / n_col;
        let perm = (0..n_cbps)
            .map(|k| {
                let i = n_row * (k % n_col) + k / n_col;
                s * (i / s) + (i + n_cbps - (n_col * i) / n_cbps) % s
            })
            .collect();
        Self { perm }
    }

    /// Interleave one symbol of coded bits
    pub fn interleave(&self, input: &[Bit]) -> Vec<Bit> {
        let mut out = vec![0; self.perm.len()];
        for (k, &j) in self.perm.iter().enumerate() {
            out[j] = input[k];
        }
        out
    }

    /// Deinterleave one symbol of soft values
    pub fn deinterleave(&self, input: &[f64]) -> Vec<f64> {
        self.perm.iter().map(|&j| input[j]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_permutation() {
        for (n_cbps, n_bpsc, n_col) in [(48, 1, 16), (288, 6, 16), (52, 1, 13), (312, 6, 13), (648, 6, 18)] {
            let il = Interleaver::new(n_cbps, n_bpsc, n_col);
            let mut seen = vec![false; n_cbps];
            for &j in &il.perm {
                assert!(!seen[j], "duplicate target {} for N_CBPS {}", j, n_cbps);
                seen[j] = true;
            }
        }
    }

    #[test]
    fn test_bpsk_48_first_entries() {
        // Adjacent coded bits land three subcarriers apart
        let il = Interleaver::new(48, 1, 16);
        assert_eq!(&il.perm[..4], &[0, 3, 6, 9]);
        assert_eq!(il.perm[16], 1);
    }

    #[test]
    fn test_round_trip() {
        let il = Interleaver::new(192, 4, 16);
        let bits: Vec<u8> = (0..192).map(|i| ((i * 5 + 1) % 3 == 0) as u8).collect();
        let interleaved = il.interleave(&bits);
        let soft: Vec<f64> = interleaved.iter().map(|&b| b as f64).collect();
        let restored: Vec<u8> = il.deinterleave(&soft).iter().map(|&v| v as u8).collect();
        assert_eq!(restored, bits);
    }
}
