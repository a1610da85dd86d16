//! # phylink Core PHY Library
//!
//! This crate provides the physical-layer half of a per-packet link
//! simulator: it turns payload bytes into an 802.11a/n-class OFDM baseband
//! waveform and recovers them again.
//!
//! ## Overview
//!
//! - **Rate resolution**: legacy 500 kbps selectors and HT MCS indices
//!   become an immutable [`PhyConfig`]
//! - **Coding**: scrambler, K=7 convolutional code with puncturing, Viterbi
//!   decoder, block interleaver, HT-SIG CRC-8
//! - **Modulation**: Gray-mapped BPSK, QPSK, 16-QAM and 64-QAM with soft
//!   demapping
//! - **OFDM**: 64/128-point numerology, training fields, pilots
//! - **Waveform**: the [`Waveform`] trait and the [`OfdmPhy`] transmitter and
//!   receiver
//!
//! ## Signal Flow
//!
//! ```text
//! TX: bytes → bits → SERVICE/tail/pad → Scramble → BCC → Puncture → Interleave → Map → IFFT → I/Q
//! RX: I/Q → CFO/channel estimate → SIG → FFT → Equalize → Soft demap → Viterbi → Descramble → bits
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use phylink_core::{bits_to_bytes, bytes_to_bits, OfdmPhy, PhyConfig, Waveform};
//!
//! // 6 Mbps (legacy selector 12) on a 20 MHz channel
//! let config = PhyConfig::resolve(true, 12, 20).unwrap();
//! let phy = OfdmPhy::new();
//!
//! let samples = phy.generate(&bytes_to_bits(b"hello"), &config, 0.0).unwrap();
//! let recovered = phy.recover(&samples, &config, 0.0, 0.0).unwrap();
//! assert_eq!(bits_to_bytes(recovered.bits()), b"hello");
//! ```

pub mod bits;
pub mod coding;
pub mod error;
pub mod modulation;
pub mod ofdm;
pub mod rate;
pub mod types;
pub mod waveform;

// Re-export main types
pub use bits::{bits_to_bytes, bytes_to_bits};
pub use error::{DecodeFailure, PhyError, PhyResult};
pub use ofdm::Numerology;
pub use rate::{
    resolve_rate, supported_selectors, ChannelWidth, CodeRate, Format, Modulation, PhyConfig,
    RateParams, RateSelection,
};
pub use types::{Bit, Complex, IQBuffer, IQSample};
pub use waveform::{OfdmPhy, RecoveredFrame, Recovery, Waveform, WaveformInfo, WaveformKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bits::{bits_to_bytes, bytes_to_bits};
    pub use crate::error::{DecodeFailure, PhyError, PhyResult};
    pub use crate::rate::{ChannelWidth, PhyConfig};
    pub use crate::types::{Complex, IQSample};
    pub use crate::waveform::{OfdmPhy, Recovery, Waveform, WaveformKind};
}
