//! Path loss models
//!
//! ```text
//! FSPL(d)        = 20·log10(4π·d·f / c)                      d > d0
//! LogDistance(d) = FSPL(d_ref) + 10·n·log10(d / d_ref)       d > d_ref
//! ```
//!
//! `d0 = λ / 4π` is the unity-gain distance where free-space loss reaches
//! 0 dB. Closer than that the far-field formula would predict gain, so
//! every model reports exactly 0 dB at or below `d0` and flags the clamp.

use serde::{Deserialize, Serialize};

/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Default carrier: 802.11 channel 36
pub const DEFAULT_CARRIER_HZ: f64 = 5.18e9;

/// Propagation model
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PathLossModel {
    /// Friis free-space loss
    #[default]
    FreeSpace,
    /// Free space up to `reference_m`, then `10·exponent` dB per decade
    LogDistance { exponent: f64, reference_m: f64 },
}

/// Path loss evaluated for one link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLoss {
    pub loss_db: f64,
    /// Distance was at or inside the unity-gain distance
    pub clamped: bool,
}

/// Wavelength in meters
pub fn wavelength(carrier_hz: f64) -> f64 {
    SPEED_OF_LIGHT / carrier_hz
}

/// Distance at which free-space loss is 0 dB (λ / 4π)
pub fn unity_gain_distance(carrier_hz: f64) -> f64 {
    wavelength(carrier_hz) / (4.0 * std::f64::consts::PI)
}

/// Free-space path loss in dB, unclamped
pub fn fspl_db(distance_m: f64, carrier_hz: f64) -> f64 {
    20.0 * (distance_m / unity_gain_distance(carrier_hz)).log10()
}

impl PathLossModel {
    /// Loss in dB at `distance_m`
    pub fn evaluate(&self, distance_m: f64, carrier_hz: f64) -> PathLoss {
        let d0 = unity_gain_distance(carrier_hz);
        if distance_m <= d0 {
            return PathLoss {
                loss_db: 0.0,
                clamped: true,
            };
        }
        let loss_db = match *self {
            Self::FreeSpace => fspl_db(distance_m, carrier_hz),
            Self::LogDistance {
                exponent,
                reference_m,
            } => {
                let reference = reference_m.max(d0);
                if distance_m <= reference {
                    fspl_db(distance_m, carrier_hz)
                } else {
                    fspl_db(reference, carrier_hz) + 10.0 * exponent * (distance_m / reference).log10()
                }
            }
        };
        PathLoss {
            loss_db,
            clamped: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FreeSpace => "free-space",
            Self::LogDistance { .. } => "log-distance",
        }
    }
}
