//! Modulation/coding configuration resolution
//!
//! The host hands over a legacy flag, an integer rate selector and a channel
//! bandwidth. This module turns them into an immutable [`PhyConfig`] that the
//! transmitter and receiver consume.
//!
//! ## Selector Semantics
//!
//! | Flag | Selector | Meaning |
//! |------|----------|---------|
//! | legacy | multiple of 500 kbps | `rate_mbps = selector * 0.5` (non-HT, 802.11a-style) |
//! | non-legacy | MCS index | HT single stream, MCS 0..=7 |
//!
//! ## Non-HT Rates (20 MHz)
//!
//! ```text
//! Mbps  RATE  Mod    R     N_BPSC  N_CBPS  N_DBPS
//!  6    1101  BPSK   1/2   1       48      24
//!  9    1111  BPSK   3/4   1       48      36
//! 12    0101  QPSK   1/2   2       96      48
//! 18    0111  QPSK   3/4   2       96      72
//! 24    1001  16QAM  1/2   4       192     96
//! 36    1011  16QAM  3/4   4       192     144
//! 48    0001  64QAM  2/3   6       288     192
//! 54    0011  64QAM  3/4   6       288     216
//! ```
//!
//! 10 MHz and 5 MHz channels run the same numerology at half and quarter
//! clock, so every rate scales by `bandwidth / 20`.

use crate::error::{PhyError, PhyResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum non-HT PSDU length in bytes (12-bit LENGTH field)
pub const MAX_NON_HT_PSDU: usize = 4095;

/// Maximum HT PSDU length in bytes (16-bit HT-LENGTH field)
pub const MAX_HT_PSDU: usize = 65_535;

/// Highest supported HT MCS (single spatial stream)
pub const MAX_HT_MCS: u8 = 7;

/// Default scrambler seed
pub const DEFAULT_SCRAMBLER_SEED: u8 = 0b101_1101;

/// Subcarrier modulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    /// 1 bit per subcarrier
    Bpsk,
    /// 2 bits per subcarrier
    Qpsk,
    /// 4 bits per subcarrier
    Qam16,
    /// 6 bits per subcarrier
    Qam64,
}

impl Modulation {
    /// Coded bits per subcarrier (N_BPSC)
    pub fn bits_per_symbol(&self) -> usize {
        match self {
            Self::Bpsk => 1,
            Self::Qpsk => 2,
            Self::Qam16 => 4,
            Self::Qam64 => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bpsk => "BPSK",
            Self::Qpsk => "QPSK",
            Self::Qam16 => "16-QAM",
            Self::Qam64 => "64-QAM",
        }
    }
}

/// Convolutional code rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeRate {
    Half,
    TwoThirds,
    ThreeQuarters,
    FiveSixths,
}

impl CodeRate {
    /// Rate as (numerator, denominator)
    pub fn ratio(&self) -> (usize, usize) {
        match self {
            Self::Half => (1, 2),
            Self::TwoThirds => (2, 3),
            Self::ThreeQuarters => (3, 4),
            Self::FiveSixths => (5, 6),
        }
    }
}

impl fmt::Display for CodeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (k, n) = self.ratio();
        write!(f, "{}/{}", k, n)
    }
}

/// PPDU format family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    /// Legacy OFDM (802.11a/g/p style)
    NonHt,
    /// High throughput, single spatial stream
    Ht,
}

/// Channel bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelWidth {
    Mhz5,
    Mhz10,
    Mhz20,
    Mhz40,
}

impl ChannelWidth {
    pub fn from_mhz(mhz: u32) -> Option<Self> {
        match mhz {
            5 => Some(Self::Mhz5),
            10 => Some(Self::Mhz10),
            20 => Some(Self::Mhz20),
            40 => Some(Self::Mhz40),
            _ => None,
        }
    }

    pub fn mhz(&self) -> u32 {
        match self {
            Self::Mhz5 => 5,
            Self::Mhz10 => 10,
            Self::Mhz20 => 20,
            Self::Mhz40 => 40,
        }
    }

    /// Baseband sample rate in Hz (one sample per Hz of channel)
    pub fn sample_rate(&self) -> f64 {
        self.mhz() as f64 * 1e6
    }
}

/// Rate selection as requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RateSelection {
    /// Legacy data rate in Mbps
    Legacy { rate_mbps: f64 },
    /// HT MCS index
    Mcs(u8),
}

/// Resolve a host rate selector.
///
/// Legacy selectors are multiples of 500 kbps; non-legacy selectors are MCS
/// indices. Only the range of the selector is checked here; whether the rate
/// exists at a given bandwidth is checked by [`PhyConfig::resolve`].
pub fn resolve_rate(legacy: bool, selector: u32) -> PhyResult<RateSelection> {
    if legacy {
        if selector == 0 {
            return Err(PhyError::Configuration(
                "legacy rate selector must be positive".to_string(),
            ));
        }
        Ok(RateSelection::Legacy {
            rate_mbps: selector as f64 * 0.5,
        })
    } else {
        match u8::try_from(selector) {
            Ok(mcs) if mcs <= MAX_HT_MCS => Ok(RateSelection::Mcs(mcs)),
            _ => Err(PhyError::Configuration(format!(
                "MCS {} unsupported (valid: 0..={})",
                selector, MAX_HT_MCS
            ))),
        }
    }
}

/// Per-rate coding parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateParams {
    pub modulation: Modulation,
    pub code_rate: CodeRate,
    /// Data subcarriers per OFDM symbol (N_SD)
    pub n_sd: usize,
    /// Coded bits per subcarrier (N_BPSC)
    pub n_bpsc: usize,
    /// Coded bits per OFDM symbol (N_CBPS)
    pub n_cbps: usize,
    /// Data bits per OFDM symbol (N_DBPS)
    pub n_dbps: usize,
    /// Data rate in Mbps
    pub rate_mbps: f64,
}

impl RateParams {
    fn new(modulation: Modulation, code_rate: CodeRate, n_sd: usize, width: ChannelWidth, fft_size: usize) -> Self {
        let n_bpsc = modulation.bits_per_symbol();
        let n_cbps = n_sd * n_bpsc;
        let (k, n) = code_rate.ratio();
        let n_dbps = n_cbps * k / n;
        let symbol_duration_us = (fft_size + fft_size / 4) as f64 / width.mhz() as f64;
        Self {
            modulation,
            code_rate,
            n_sd,
            n_bpsc,
            n_cbps,
            n_dbps,
            rate_mbps: n_dbps as f64 / symbol_duration_us,
        }
    }
}

/// Legacy rate table: (20 MHz rate, RATE bits R1..R4 with R1 as MSB, modulation, code rate)
const LEGACY_RATES: [(f64, u8, Modulation, CodeRate); 8] = [
    (6.0, 0b1101, Modulation::Bpsk, CodeRate::Half),
    (9.0, 0b1111, Modulation::Bpsk, CodeRate::ThreeQuarters),
    (12.0, 0b0101, Modulation::Qpsk, CodeRate::Half),
    (18.0, 0b0111, Modulation::Qpsk, CodeRate::ThreeQuarters),
    (24.0, 0b1001, Modulation::Qam16, CodeRate::Half),
    (36.0, 0b1011, Modulation::Qam16, CodeRate::ThreeQuarters),
    (48.0, 0b0001, Modulation::Qam64, CodeRate::TwoThirds),
    (54.0, 0b0011, Modulation::Qam64, CodeRate::ThreeQuarters),
];

/// HT MCS table, single spatial stream
const HT_MCS: [(Modulation, CodeRate); 8] = [
    (Modulation::Bpsk, CodeRate::Half),
    (Modulation::Qpsk, CodeRate::Half),
    (Modulation::Qpsk, CodeRate::ThreeQuarters),
    (Modulation::Qam16, CodeRate::Half),
    (Modulation::Qam16, CodeRate::ThreeQuarters),
    (Modulation::Qam64, CodeRate::TwoThirds),
    (Modulation::Qam64, CodeRate::ThreeQuarters),
    (Modulation::Qam64, CodeRate::FiveSixths),
];

/// Fully resolved, immutable PHY configuration for one call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhyConfig {
    pub format: Format,
    pub width: ChannelWidth,
    pub selection: RateSelection,
    pub rate: RateParams,
    /// L-SIG RATE bits (non-HT only, R1 as MSB)
    pub rate_bits: Option<u8>,
    pub scrambler_seed: u8,
}

impl PhyConfig {
    /// Resolve host inputs into a PHY configuration
    pub fn resolve(legacy: bool, selector: u32, bandwidth_mhz: u32) -> PhyResult<Self> {
        let selection = resolve_rate(legacy, selector)?;
        let width = ChannelWidth::from_mhz(bandwidth_mhz).ok_or_else(|| {
            PhyError::Configuration(format!("unsupported bandwidth {} MHz", bandwidth_mhz))
        })?;

        match selection {
            RateSelection::Legacy { rate_mbps } => {
                if width == ChannelWidth::Mhz40 {
                    return Err(PhyError::Configuration(
                        "non-HT frames support 5, 10 and 20 MHz channels".to_string(),
                    ));
                }
                let equivalent = rate_mbps * 20.0 / width.mhz() as f64;
                let entry = LEGACY_RATES
                    .iter()
                    .find(|(r, ..)| (r - equivalent).abs() < 1e-9)
                    .ok_or_else(|| {
                        PhyError::Configuration(format!(
                            "{} Mbps is not a valid rate for a {} MHz channel",
                            rate_mbps,
                            width.mhz()
                        ))
                    })?;
                Self::non_ht(width, entry.1).map(|cfg| Self { selection, ..cfg })
            }
            RateSelection::Mcs(mcs) => {
                if !matches!(width, ChannelWidth::Mhz20 | ChannelWidth::Mhz40) {
                    return Err(PhyError::Configuration(
                        "HT frames support 20 and 40 MHz channels".to_string(),
                    ));
                }
                Self::ht(width, mcs)
            }
        }
    }

    /// Non-HT configuration from L-SIG RATE bits
    pub fn non_ht(width: ChannelWidth, rate_bits: u8) -> PhyResult<Self> {
        let (rate20, bits, modulation, code_rate) = *LEGACY_RATES
            .iter()
            .find(|(_, b, ..)| *b == rate_bits)
            .ok_or_else(|| PhyError::Configuration(format!("invalid RATE bits {:#06b}", rate_bits)))?;
        if width == ChannelWidth::Mhz40 {
            return Err(PhyError::Configuration(
                "non-HT frames support 5, 10 and 20 MHz channels".to_string(),
            ));
        }
        let rate = RateParams::new(modulation, code_rate, 48, width, 64);
        Ok(Self {
            format: Format::NonHt,
            width,
            selection: RateSelection::Legacy {
                rate_mbps: rate20 * width.mhz() as f64 / 20.0,
            },
            rate,
            rate_bits: Some(bits),
            scrambler_seed: DEFAULT_SCRAMBLER_SEED,
        })
    }

    /// HT configuration for an MCS index
    pub fn ht(width: ChannelWidth, mcs: u8) -> PhyResult<Self> {
        let (modulation, code_rate) = *HT_MCS.get(mcs as usize).ok_or_else(|| {
            PhyError::Configuration(format!("MCS {} unsupported (valid: 0..={})", mcs, MAX_HT_MCS))
        })?;
        let (n_sd, fft_size) = match width {
            ChannelWidth::Mhz20 => (52, 64),
            ChannelWidth::Mhz40 => (108, 128),
            other => {
                return Err(PhyError::Configuration(format!(
                    "HT frames do not support {} MHz channels",
                    other.mhz()
                )))
            }
        };
        Ok(Self {
            format: Format::Ht,
            width,
            selection: RateSelection::Mcs(mcs),
            rate: RateParams::new(modulation, code_rate, n_sd, width, fft_size),
            rate_bits: None,
            scrambler_seed: DEFAULT_SCRAMBLER_SEED,
        })
    }

    /// Replace the scrambler seed (must be a non-zero 7-bit value)
    pub fn with_scrambler_seed(self, seed: u8) -> PhyResult<Self> {
        if seed == 0 || seed > 0x7F {
            return Err(PhyError::Configuration(format!(
                "scrambler seed {} out of range 1..=127",
                seed
            )));
        }
        Ok(Self {
            scrambler_seed: seed,
            ..self
        })
    }

    /// Maximum PSDU length in bytes
    pub fn max_psdu_len(&self) -> usize {
        match self.format {
            Format::NonHt => MAX_NON_HT_PSDU,
            Format::Ht => MAX_HT_PSDU,
        }
    }

    /// Number of SIG OFDM symbols
    pub fn sig_symbols(&self) -> usize {
        match self.format {
            Format::NonHt => 1,
            Format::Ht => 2,
        }
    }

    /// Number of DATA OFDM symbols for a PSDU of `psdu_len` bytes
    ///
    /// A zero-length PSDU carries no DATA field.
    pub fn data_symbols(&self, psdu_len: usize) -> usize {
        if psdu_len == 0 {
            return 0;
        }
        let bits = 16 + 8 * psdu_len + 6;
        bits.div_ceil(self.rate.n_dbps)
    }

    pub fn sample_rate(&self) -> f64 {
        self.width.sample_rate()
    }

    /// Rate in Mbps
    pub fn rate_mbps(&self) -> f64 {
        self.rate.rate_mbps
    }

    /// HT MCS index, if any
    pub fn mcs(&self) -> Option<u8> {
        match self.selection {
            RateSelection::Mcs(mcs) => Some(mcs),
            RateSelection::Legacy { .. } => None,
        }
    }
}

impl fmt::Display for PhyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selection {
            RateSelection::Legacy { rate_mbps } => write!(
                f,
                "non-HT {} Mbps ({} {}) @ {} MHz",
                rate_mbps,
                self.rate.modulation.name(),
                self.rate.code_rate,
                self.width.mhz()
            ),
            RateSelection::Mcs(mcs) => write!(
                f,
                "HT MCS{} {:.1} Mbps ({} {}) @ {} MHz",
                mcs,
                self.rate.rate_mbps,
                self.rate.modulation.name(),
                self.rate.code_rate,
                self.width.mhz()
            ),
        }
    }
}

/// All selectors accepted for a format and bandwidth, in ascending order
pub fn supported_selectors(legacy: bool, bandwidth_mhz: u32) -> Vec<u32> {
    let Some(width) = ChannelWidth::from_mhz(bandwidth_mhz) else {
        return Vec::new();
    };
    if legacy {
        if width == ChannelWidth::Mhz40 {
            return Vec::new();
        }
        LEGACY_RATES
            .iter()
            .map(|(r, ..)| r * width.mhz() as f64 / 20.0 * 2.0)
            .filter(|units| units.fract() == 0.0)
            .map(|units| units as u32)
            .collect()
    } else {
        match width {
            ChannelWidth::Mhz20 | ChannelWidth::Mhz40 => (0..=MAX_HT_MCS as u32).collect(),
            _ => Vec::new(),
        }
    }
}
