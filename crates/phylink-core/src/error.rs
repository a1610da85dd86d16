//! Error types for the PHY crate.
//!
//! Two kinds of unhappy outcome exist and they are kept apart:
//!
//! - [`PhyError`] aborts a call: the configuration or payload can't be
//!   turned into a frame at all.
//! - [`DecodeFailure`] is a *result*: the receiver ran and could not recover
//!   a valid frame. It travels inside [`crate::waveform::Recovery::Failed`].

use serde::Serialize;
use thiserror::Error;

/// PHY error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhyError {
    /// Invalid or unsupported rate, MCS, bandwidth or PHY parameter
    #[error("configuration error: {0}")]
    Configuration(String),

    /// PSDU exceeds the format's maximum length
    #[error("payload too large: {length} bytes exceeds maximum of {max}")]
    PayloadTooLarge { length: usize, max: usize },

    /// Bit count is not a whole number of octets
    #[error("payload of {bits} bits is not a whole number of octets")]
    UnalignedPayload { bits: usize },
}

/// Result type alias for PHY operations
pub type PhyResult<T> = std::result::Result<T, PhyError>;

/// Why a receiver could not recover a frame
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeFailure {
    /// Waveform is shorter than the frame it announces
    #[error("waveform truncated: need {needed} samples, got {available}")]
    Truncated { needed: usize, available: usize },

    /// Training fields carry no usable energy
    #[error("no signal energy in training field")]
    NoSignal,

    /// L-SIG parity check failed
    #[error("SIGNAL field parity check failed")]
    SignalParity,

    /// HT-SIG CRC check failed
    #[error("HT-SIG CRC check failed")]
    SignalCrc,

    /// L-SIG RATE field does not name a valid rate
    #[error("SIGNAL field carries invalid RATE bits {0:#06b}")]
    InvalidRate(u8),

    /// HT-SIG names an MCS this receiver does not support
    #[error("HT-SIG carries unsupported MCS {0}")]
    UnsupportedMcs(u8),

    /// HT-SIG bandwidth bit disagrees with the receiver's channel width
    #[error("HT-SIG bandwidth does not match the configured channel width")]
    BandwidthMismatch,

    /// A reserved SIG bit has the wrong value
    #[error("SIGNAL field reserved bit set")]
    ReservedBit,
}
