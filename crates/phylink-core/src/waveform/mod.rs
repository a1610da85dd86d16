//! Waveform abstraction
//!
//! A [`Waveform`] turns PSDU bits into complex baseband samples and back.
//! The link pipeline only ever talks to this trait; which implementation
//! runs is decided by a [`WaveformKind`] from configuration.
//!
//! ```text
//!            ┌──────────────── Waveform ────────────────┐
//!   bits ──► │ generate(bits, PhyConfig, tx_gain_db)    │ ──► IQ
//!   IQ   ──► │ recover(IQ, PhyConfig, rx_gain, agc)     │ ──► Recovery
//!            └──────────────────────────────────────────┘
//! ```

pub mod ofdm_phy;
pub mod signal;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeFailure, PhyResult};
use crate::rate::PhyConfig;
use crate::types::{Bit, IQBuffer, IQSample};

pub use ofdm_phy::OfdmPhy;

/// Descriptive information about a waveform
#[derive(Debug, Clone, Serialize)]
pub struct WaveformInfo {
    /// Short name (e.g., "OFDM")
    pub name: &'static str,
    /// Full name
    pub full_name: &'static str,
    /// Brief description
    pub description: &'static str,
    /// Supported channel widths in MHz
    pub bandwidths_mhz: &'static [u32],
}

/// A frame recovered from the receive waveform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredFrame {
    /// PSDU bits, MSB first per octet
    pub bits: Vec<Bit>,
    /// Rate announced by the SIG field
    pub rate_mbps: f64,
    /// SERVICE field descrambled to the expected zeros
    pub service_ok: bool,
    /// Error vector magnitude of the equalized symbols in dB
    pub evm_db: f64,
}

/// Outcome of running the receiver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Recovery {
    /// SIG checks passed; the bits may still contain errors
    Decoded(RecoveredFrame),
    /// No frame could be recovered
    Failed(DecodeFailure),
}

impl Recovery {
    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }

    /// Recovered bits, empty on failure
    pub fn bits(&self) -> &[Bit] {
        match self {
            Self::Decoded(frame) => &frame.bits,
            Self::Failed(_) => &[],
        }
    }
}

/// A PHY that can generate and recover frames
pub trait Waveform: Debug + Send + Sync {
    /// Get information about this waveform
    fn info(&self) -> WaveformInfo;

    /// Build the baseband frame for a PSDU.
    ///
    /// Output has unit mean power scaled by `tx_gain_db` as an amplitude
    /// factor. Identical inputs always give identical samples.
    fn generate(&self, bits: &[Bit], config: &PhyConfig, tx_gain_db: f64) -> PhyResult<IQBuffer>;

    /// Recover PSDU bits from a received frame.
    ///
    /// The samples are scaled by `rx_gain_db + agc_compensation_db` before
    /// processing. Decode problems are reported in [`Recovery::Failed`];
    /// `Err` is reserved for an unusable configuration.
    fn recover(
        &self,
        samples: &[IQSample],
        config: &PhyConfig,
        rx_gain_db: f64,
        agc_compensation_db: f64,
    ) -> PhyResult<Recovery>;

    /// Number of samples in a frame carrying `psdu_len` bytes
    fn frame_len(&self, config: &PhyConfig, psdu_len: usize) -> usize;
}

/// Waveform selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    /// 802.11a/n-class OFDM
    #[default]
    Ofdm,
}

impl WaveformKind {
    /// Instantiate the waveform
    pub fn create(&self) -> Box<dyn Waveform> {
        match self {
            Self::Ofdm => Box::new(OfdmPhy::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ofdm => "ofdm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory() {
        let wf = WaveformKind::Ofdm.create();
        assert_eq!(wf.info().name, "OFDM");
        assert_eq!(WaveformKind::default(), WaveformKind::Ofdm);
    }

    #[test]
    fn test_recovery_bits() {
        let failed = Recovery::Failed(DecodeFailure::NoSignal);
        assert!(!failed.is_decoded());
        assert!(failed.bits().is_empty());
    }
}
