//! Channel Models for Link Simulation
//!
//! A channel takes the transmit waveform (unit mean power times the transmit
//! antenna gain) and produces the waveform at the receiver input together
//! with the received power estimate.
//!
//! ## Power Budget
//!
//! ```text
//! rx_power_dbm = tx_power_dbm + tx_gain_db + rx_gain_db − path_loss_db (+ fading_db)
//! ```
//!
//! The waveform already carries `tx_gain_db`, so the channel scales it by
//! `tx_power − 30 − path_loss + rx_gain (+ fading)` dB. Sample power is then
//! the received power in watts.
//!
//! ## Impairments
//!
//! Applied in this order, all driven by one seeded RNG:
//!
//! 1. **Path loss**: free space or log-distance, see [`crate::path_loss`]
//! 2. **Shadowing**: log-normal, added to the path loss
//! 3. **Fading**: flat Rayleigh or Rician, one coefficient per frame
//! 4. **Doppler**: frequency shift from the closing speed
//! 5. **Thermal noise**: `−174 dBm/Hz + 10·log10(B) + NF`
//!
//! Interference from concurrent transmitters is not modelled; each call
//! sees one sender and one receiver.

use std::f64::consts::PI;
use std::fmt::Debug;

use num_complex::Complex64;
use phylink_core::types::{db_to_amplitude, dbm_to_watts, power_to_db, IQBuffer, IQSample};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{ConfigError, LinkError, LinkResult};
use crate::geometry::LinkGeometry;
use crate::path_loss::{PathLossModel, DEFAULT_CARRIER_HZ, SPEED_OF_LIGHT};

/// Thermal noise density at 290 K in dBm/Hz
pub const THERMAL_NOISE_DBM_HZ: f64 = -174.0;

/// Transmit and receive RF parameters of one link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfBudget {
    pub tx_power_dbm: f64,
    pub tx_gain_db: f64,
    pub rx_gain_db: f64,
    pub bandwidth_mhz: u32,
}

impl RfBudget {
    /// Received power before fading for a given path loss
    pub fn rx_power_dbm(&self, path_loss_db: f64) -> f64 {
        self.tx_power_dbm + self.tx_gain_db + self.rx_gain_db - path_loss_db
    }

    pub fn sample_rate(&self) -> f64 {
        self.bandwidth_mhz as f64 * 1e6
    }

    fn check(&self) -> LinkResult<()> {
        for (name, value) in [
            ("tx_power_dbm", self.tx_power_dbm),
            ("tx_gain_db", self.tx_gain_db),
            ("rx_gain_db", self.rx_gain_db),
        ] {
            if !value.is_finite() {
                return Err(LinkError::InvalidInput(format!("{} is not finite", name)));
            }
        }
        if self.bandwidth_mhz == 0 {
            return Err(LinkError::InvalidInput("bandwidth must be positive".to_string()));
        }
        Ok(())
    }
}

/// Waveform at the receiver and what happened to it on the way
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutput {
    pub waveform: IQBuffer,
    pub rx_power_dbm: f64,
    /// Path loss including shadowing
    pub path_loss_db: f64,
    /// Block fading power gain
    pub fading_db: f64,
    pub distance_m: f64,
    pub doppler_hz: f64,
    /// Receiver noise power, if noise was added
    pub noise_power_dbm: Option<f64>,
    /// Distance was inside the unity-gain distance
    pub clamped: bool,
}

/// A propagation channel between one sender and one receiver
pub trait ChannelModel: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Propagate a transmit waveform to the receiver.
    ///
    /// Identical inputs and seed give identical output.
    fn apply(
        &self,
        waveform: &[IQSample],
        geometry: &LinkGeometry,
        budget: &RfBudget,
        seed: u64,
    ) -> LinkResult<ChannelOutput>;
}

/// Small-scale fading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fading {
    #[default]
    None,
    /// No line of sight, |h| Rayleigh distributed
    Rayleigh,
    /// Line of sight plus scatter; `k_factor` is the linear LOS/scatter power ratio
    Rician { k_factor: f64 },
}

impl Fading {
    /// Draw a unit-mean-power block coefficient
    fn coefficient(&self, rng: &mut StdRng) -> Complex64 {
        match *self {
            Self::None => Complex64::new(1.0, 0.0),
            Self::Rayleigh => complex_gaussian(rng, 1.0),
            Self::Rician { k_factor } => {
                let los = (k_factor / (k_factor + 1.0)).sqrt();
                Complex64::new(los, 0.0) + complex_gaussian(rng, 1.0 / (k_factor + 1.0))
            }
        }
    }
}

/// Circularly symmetric complex Gaussian sample with total power `power`
fn complex_gaussian(rng: &mut StdRng, power: f64) -> Complex64 {
    let sigma = (power / 2.0).sqrt();
    let i: f64 = StandardNormal.sample(rng);
    let q: f64 = StandardNormal.sample(rng);
    Complex64::new(i * sigma, q * sigma)
}

/// Which channel implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Path loss with optional shadowing, fading, Doppler and noise
    #[default]
    Propagation,
    /// No loss and no impairments
    Ideal,
}

/// Channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub path_loss: PathLossModel,
    /// Carrier frequency in Hz
    pub carrier_frequency_hz: f64,
    /// Log-normal shadowing standard deviation (0 disables)
    pub shadowing_sigma_db: f64,
    pub fading: Fading,
    /// Apply the Doppler shift from node velocities
    pub doppler: bool,
    /// Add receiver thermal noise
    pub thermal_noise: bool,
    /// Receiver noise figure in dB
    pub noise_figure_db: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: ChannelKind::Propagation,
            path_loss: PathLossModel::FreeSpace,
            carrier_frequency_hz: DEFAULT_CARRIER_HZ,
            shadowing_sigma_db: 0.0,
            fading: Fading::None,
            doppler: true,
            thermal_noise: true,
            noise_figure_db: 7.0,
        }
    }
}

impl ChannelConfig {
    /// Deterministic free-space channel without noise
    pub fn noiseless() -> Self {
        Self {
            thermal_noise: false,
            ..Default::default()
        }
    }

    pub fn with_path_loss(mut self, model: PathLossModel) -> Self {
        self.path_loss = model;
        self
    }

    pub fn with_fading(mut self, fading: Fading) -> Self {
        self.fading = fading;
        self
    }

    pub fn with_shadowing(mut self, sigma_db: f64) -> Self {
        self.shadowing_sigma_db = sigma_db;
        self
    }

    pub fn with_carrier(mut self, carrier_hz: f64) -> Self {
        self.carrier_frequency_hz = carrier_hz;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.carrier_frequency_hz.is_finite() && self.carrier_frequency_hz > 0.0) {
            return Err(ConfigError::Validation(
                "carrier_frequency_hz must be positive".to_string(),
            ));
        }
        if !(self.shadowing_sigma_db.is_finite() && self.shadowing_sigma_db >= 0.0) {
            return Err(ConfigError::Validation(
                "shadowing_sigma_db must be >= 0".to_string(),
            ));
        }
        if !(self.noise_figure_db.is_finite() && self.noise_figure_db >= 0.0) {
            return Err(ConfigError::Validation(
                "noise_figure_db must be >= 0".to_string(),
            ));
        }
        if let PathLossModel::LogDistance {
            exponent,
            reference_m,
        } = self.path_loss
        {
            if !(exponent.is_finite() && exponent > 0.0) {
                return Err(ConfigError::Validation(
                    "path loss exponent must be positive".to_string(),
                ));
            }
            if !(reference_m.is_finite() && reference_m > 0.0) {
                return Err(ConfigError::Validation(
                    "path loss reference distance must be positive".to_string(),
                ));
            }
        }
        if let Fading::Rician { k_factor } = self.fading {
            if !(k_factor.is_finite() && k_factor >= 0.0) {
                return Err(ConfigError::Validation(
                    "Rician k_factor must be >= 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Instantiate the configured channel
    pub fn create(&self) -> Box<dyn ChannelModel> {
        match self.kind {
            ChannelKind::Propagation => Box::new(PropagationChannel::new(self.clone())),
            ChannelKind::Ideal => Box::new(IdealChannel),
        }
    }
}

/// Receiver noise power in dBm over `bandwidth_hz`
pub fn thermal_noise_dbm(bandwidth_hz: f64, noise_figure_db: f64) -> f64 {
    THERMAL_NOISE_DBM_HZ + power_to_db(bandwidth_hz) + noise_figure_db
}

/// Doppler shift in Hz for a closing speed (positive when approaching)
pub fn doppler_shift_hz(carrier_hz: f64, closing_speed: f64) -> f64 {
    carrier_hz * closing_speed / SPEED_OF_LIGHT
}

fn check_geometry(geometry: &LinkGeometry) -> LinkResult<()> {
    if geometry.is_finite() {
        Ok(())
    } else {
        Err(LinkError::InvalidInput(
            "positions and velocities must be finite".to_string(),
        ))
    }
}

/// Path loss channel with optional shadowing, fading, Doppler and noise
#[derive(Debug, Clone)]
pub struct PropagationChannel {
    config: ChannelConfig,
}

impl PropagationChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

impl ChannelModel for PropagationChannel {
    fn name(&self) -> &'static str {
        self.config.path_loss.name()
    }

    fn apply(
        &self,
        waveform: &[IQSample],
        geometry: &LinkGeometry,
        budget: &RfBudget,
        seed: u64,
    ) -> LinkResult<ChannelOutput> {
        check_geometry(geometry)?;
        budget.check()?;
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(seed);

        let distance_m = geometry.distance();
        let loss = cfg.path_loss.evaluate(distance_m, cfg.carrier_frequency_hz);
        if loss.clamped && distance_m > 0.0 {
            warn!(distance_m, "link inside unity-gain distance, path loss clamped to 0 dB");
        }

        let mut path_loss_db = loss.loss_db;
        if cfg.shadowing_sigma_db > 0.0 {
            let z: f64 = StandardNormal.sample(&mut rng);
            path_loss_db += z * cfg.shadowing_sigma_db;
        }

        let h = cfg.fading.coefficient(&mut rng);
        let fading_db = power_to_db(h.norm_sqr().max(f64::MIN_POSITIVE));
        let rx_power_dbm = budget.rx_power_dbm(path_loss_db) + fading_db;

        let doppler_hz = if cfg.doppler {
            doppler_shift_hz(cfg.carrier_frequency_hz, geometry.closing_speed())
        } else {
            0.0
        };

        let amplitude = db_to_amplitude(budget.tx_power_dbm - 30.0 - path_loss_db + budget.rx_gain_db);
        let gain = Complex64::new(amplitude, 0.0) * h;
        let phase_step = 2.0 * PI * doppler_hz / budget.sample_rate();
        let mut out: IQBuffer = waveform
            .iter()
            .enumerate()
            .map(|(n, &s)| s * gain * Complex64::from_polar(1.0, phase_step * n as f64))
            .collect();

        let noise_power_dbm = if cfg.thermal_noise {
            let noise_dbm = thermal_noise_dbm(budget.sample_rate(), cfg.noise_figure_db);
            let noise_watts = dbm_to_watts(noise_dbm);
            for s in out.iter_mut() {
                *s += complex_gaussian(&mut rng, noise_watts);
            }
            Some(noise_dbm)
        } else {
            None
        };

        trace!(
            model = self.name(),
            distance_m,
            path_loss_db,
            fading_db,
            doppler_hz,
            rx_power_dbm,
            "channel applied"
        );

        Ok(ChannelOutput {
            waveform: out,
            rx_power_dbm,
            path_loss_db,
            fading_db,
            distance_m,
            doppler_hz,
            noise_power_dbm,
            clamped: loss.clamped,
        })
    }
}

/// Lossless, noiseless channel
#[derive(Debug, Clone, Copy, Default)]
pub struct IdealChannel;

impl ChannelModel for IdealChannel {
    fn name(&self) -> &'static str {
        "ideal"
    }

    fn apply(
        &self,
        waveform: &[IQSample],
        geometry: &LinkGeometry,
        budget: &RfBudget,
        _seed: u64,
    ) -> LinkResult<ChannelOutput> {
        check_geometry(geometry)?;
        budget.check()?;
        let amplitude = db_to_amplitude(budget.tx_power_dbm - 30.0 + budget.rx_gain_db);
        Ok(ChannelOutput {
            waveform: waveform.iter().map(|s| s * amplitude).collect(),
            rx_power_dbm: budget.rx_power_dbm(0.0),
            path_loss_db: 0.0,
            fading_db: 0.0,
            distance_m: geometry.distance(),
            doppler_hz: 0.0,
            noise_power_dbm: None,
            clamped: false,
        })
    }
}
