//! Per-packet link simulation
//!
//! One call models one packet travelling from one sender to one receiver:
//!
//! ```text
//! payload ─► bytes_to_bits ─► generate ─► channel ─► recover ─► bits_to_bytes ─► payload'
//!                                            │
//!                                            └─► rx_power_dbm ─► AGC compensation
//! ```
//!
//! Every call is a pure function of its request and the simulator
//! configuration. [`LinkSimulator`] holds no mutable state and may be shared
//! across threads.

use phylink_core::{bits_to_bytes, bytes_to_bits, Bit, DecodeFailure, IQBuffer, IQSample, PhyConfig, Recovery, Waveform};
use serde::Serialize;
use tracing::{debug, debug_span, trace};

use crate::channel::{ChannelModel, ChannelOutput, RfBudget};
use crate::config::SimConfig;
use crate::error::{LinkError, LinkResult};
use crate::geometry::{LinkGeometry, Vec3};

/// Everything the host passes for one (packet, receiver) pair
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub payload: Vec<u8>,
    pub sender_position: Vec3,
    pub receiver_position: Vec3,
    pub tx_power_dbm: f64,
    pub tx_gain_db: f64,
    pub rx_gain_db: f64,
    /// Legacy (non-HT) rate selection
    pub legacy: bool,
    /// Legacy: rate in 500 kbps units; otherwise MCS index
    pub rate_selector: u32,
    pub bandwidth_mhz: u32,
    pub sender_velocity: Vec3,
    pub receiver_velocity: Vec3,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub timestamp_us: u64,
    /// Channel RNG seed; derived from the configuration and link identity when absent
    pub seed: Option<u64>,
}

impl LinkRequest {
    /// Request with 20 dBm, unity gains, 6 Mbps on 20 MHz, co-located static nodes
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            sender_position: Vec3::ZERO,
            receiver_position: Vec3::ZERO,
            tx_power_dbm: 20.0,
            tx_gain_db: 0.0,
            rx_gain_db: 0.0,
            legacy: true,
            rate_selector: 12,
            bandwidth_mhz: 20,
            sender_velocity: Vec3::ZERO,
            receiver_velocity: Vec3::ZERO,
            sender_id: 0,
            receiver_id: 0,
            timestamp_us: 0,
            seed: None,
        }
    }

    pub fn with_positions(mut self, sender: Vec3, receiver: Vec3) -> Self {
        self.sender_position = sender;
        self.receiver_position = receiver;
        self
    }

    pub fn with_velocities(mut self, sender: Vec3, receiver: Vec3) -> Self {
        self.sender_velocity = sender;
        self.receiver_velocity = receiver;
        self
    }

    pub fn with_tx_power(mut self, dbm: f64) -> Self {
        self.tx_power_dbm = dbm;
        self
    }

    pub fn with_gains(mut self, tx_gain_db: f64, rx_gain_db: f64) -> Self {
        self.tx_gain_db = tx_gain_db;
        self.rx_gain_db = rx_gain_db;
        self
    }

    pub fn with_rate(mut self, legacy: bool, selector: u32) -> Self {
        self.legacy = legacy;
        self.rate_selector = selector;
        self
    }

    pub fn with_bandwidth(mut self, mhz: u32) -> Self {
        self.bandwidth_mhz = mhz;
        self
    }

    pub fn with_ids(mut self, sender: u64, receiver: u64) -> Self {
        self.sender_id = sender;
        self.receiver_id = receiver;
        self
    }

    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn geometry(&self) -> LinkGeometry {
        LinkGeometry::fixed(self.sender_position, self.receiver_position)
            .with_velocities(self.sender_velocity, self.receiver_velocity)
    }

    pub fn budget(&self) -> RfBudget {
        RfBudget {
            tx_power_dbm: self.tx_power_dbm,
            tx_gain_db: self.tx_gain_db,
            rx_gain_db: self.rx_gain_db,
            bandwidth_mhz: self.bandwidth_mhz,
        }
    }

    fn validate(&self) -> LinkResult<()> {
        if !self.geometry().is_finite() {
            return Err(LinkError::InvalidInput(
                "positions and velocities must be finite".to_string(),
            ));
        }
        if ![self.tx_power_dbm, self.tx_gain_db, self.rx_gain_db]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(LinkError::InvalidInput("power and gains must be finite".to_string()));
        }
        Ok(())
    }
}

/// Receiver verdict for one link
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkStatus {
    /// SIG passed; payload may still contain bit errors
    Decoded {
        rate_mbps: f64,
        service_ok: bool,
        evm_db: f64,
    },
    Failed {
        reason: DecodeFailure,
    },
}

/// Result of one link simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkOutcome {
    /// Recovered payload (empty when decoding failed)
    pub payload: Vec<u8>,
    pub rx_power_dbm: f64,
    pub status: LinkStatus,
    pub path_loss_db: f64,
    pub distance_m: f64,
    pub doppler_hz: f64,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub timestamp_us: u64,
    /// Transmit frame length in samples
    pub frame_samples: usize,
    pub airtime_us: f64,
}

impl LinkOutcome {
    /// Host representation: payload bytes followed by the received power
    pub fn to_host_vector(&self) -> Vec<f64> {
        let mut out: Vec<f64> = self.payload.iter().map(|&b| b as f64).collect();
        out.push(self.rx_power_dbm);
        out
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self.status, LinkStatus::Decoded { .. })
    }

    /// Decoded and identical to the transmitted payload
    pub fn delivered(&self, sent: &[u8]) -> bool {
        self.is_decoded() && self.payload == sent
    }
}

/// The three engine stages behind one interface
pub trait LinkBackend: Send + Sync {
    /// Transmit waveform for PSDU bits
    fn generate(&self, bits: &[Bit], phy: &PhyConfig, tx_gain_db: f64) -> LinkResult<IQBuffer>;

    /// Propagate to the receiver
    fn apply(
        &self,
        waveform: &[IQSample],
        geometry: &LinkGeometry,
        budget: &RfBudget,
        seed: u64,
    ) -> LinkResult<ChannelOutput>;

    /// Recover PSDU bits at the receiver
    fn recover(
        &self,
        waveform: &[IQSample],
        phy: &PhyConfig,
        rx_gain_db: f64,
        agc_compensation_db: f64,
    ) -> LinkResult<Recovery>;
}

/// Backend assembled from a configured waveform and channel
#[derive(Debug)]
pub struct StandardBackend {
    waveform: Box<dyn Waveform>,
    channel: Box<dyn ChannelModel>,
}

impl StandardBackend {
    pub fn new(waveform: Box<dyn Waveform>, channel: Box<dyn ChannelModel>) -> Self {
        Self { waveform, channel }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.waveform.create(), config.channel.create())
    }
}

impl LinkBackend for StandardBackend {
    fn generate(&self, bits: &[Bit], phy: &PhyConfig, tx_gain_db: f64) -> LinkResult<IQBuffer> {
        Ok(self.waveform.generate(bits, phy, tx_gain_db)?)
    }

    fn apply(
        &self,
        waveform: &[IQSample],
        geometry: &LinkGeometry,
        budget: &RfBudget,
        seed: u64,
    ) -> LinkResult<ChannelOutput> {
        self.channel.apply(waveform, geometry, budget, seed)
    }

    fn recover(
        &self,
        waveform: &[IQSample],
        phy: &PhyConfig,
        rx_gain_db: f64,
        agc_compensation_db: f64,
    ) -> LinkResult<Recovery> {
        Ok(self.waveform.recover(waveform, phy, rx_gain_db, agc_compensation_db)?)
    }
}

/// SplitMix64 finalizer
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Channel seed for a link when the request carries none
///
/// Distinct links and packets get independent channel draws, and the same
/// link at the same time always gets the same draw.
pub fn link_seed(base: u64, sender_id: u64, receiver_id: u64, timestamp_us: u64) -> u64 {
    [sender_id, receiver_id, timestamp_us]
        .iter()
        .fold(splitmix64(base), |acc, &v| splitmix64(acc ^ v))
}

/// Receiver gain that brings the received signal to 0 dBW
pub fn agc_compensation_db(rx_power_dbm: f64, rx_gain_db: f64) -> f64 {
    -(rx_power_dbm - 30.0) - rx_gain_db
}

/// The per-packet callback
#[derive(Debug)]
pub struct LinkSimulator<B: LinkBackend = StandardBackend> {
    config: SimConfig,
    backend: B,
}

impl LinkSimulator<StandardBackend> {
    /// Simulator with the configured waveform and channel
    pub fn new(config: SimConfig) -> LinkResult<Self> {
        config.validate()?;
        let backend = StandardBackend::from_config(&config);
        Ok(Self { config, backend })
    }
}

impl<B: LinkBackend> LinkSimulator<B> {
    /// Simulator with a caller-supplied backend
    pub fn with_backend(config: SimConfig, backend: B) -> LinkResult<Self> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    /// Run one packet over one link
    pub fn simulate(&self, request: &LinkRequest) -> LinkResult<LinkOutcome> {
        let span = debug_span!(
            "link",
            sender = request.sender_id,
            receiver = request.receiver_id,
            t_us = request.timestamp_us
        );
        let _enter = span.enter();

        request.validate()?;
        let phy = PhyConfig::resolve(request.legacy, request.rate_selector, request.bandwidth_mhz)?
            .with_scrambler_seed(self.config.scrambler_seed)?;
        debug!(%phy, payload_len = request.payload.len(), "resolved PHY");

        let bits = bytes_to_bits(&request.payload);
        let tx = self.backend.generate(&bits, &phy, request.tx_gain_db)?;

        let seed = request.seed.unwrap_or_else(|| {
            link_seed(
                self.config.seed,
                request.sender_id,
                request.receiver_id,
                request.timestamp_us,
            )
        });
        let rx = self
            .backend
            .apply(&tx, &request.geometry(), &request.budget(), seed)?;
        debug!(
            distance_m = rx.distance_m,
            path_loss_db = rx.path_loss_db,
            rx_power_dbm = rx.rx_power_dbm,
            "propagated"
        );

        let agc = agc_compensation_db(rx.rx_power_dbm, request.rx_gain_db);
        trace!(agc_db = agc, "receiver gain");
        let recovery = self
            .backend
            .recover(&rx.waveform, &phy, request.rx_gain_db, agc)?;

        let (payload, status) = match recovery {
            Recovery::Decoded(frame) => (
                bits_to_bytes(&frame.bits),
                LinkStatus::Decoded {
                    rate_mbps: frame.rate_mbps,
                    service_ok: frame.service_ok,
                    evm_db: frame.evm_db,
                },
            ),
            Recovery::Failed(reason) => (Vec::new(), LinkStatus::Failed { reason }),
        };
        match &status {
            LinkStatus::Decoded { evm_db, .. } => debug!(evm_db, bytes = payload.len(), "decoded"),
            LinkStatus::Failed { reason } => debug!(%reason, "decode failed"),
        }

        Ok(LinkOutcome {
            payload,
            rx_power_dbm: rx.rx_power_dbm,
            status,
            path_loss_db: rx.path_loss_db,
            distance_m: rx.distance_m,
            doppler_hz: rx.doppler_hz,
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            timestamp_us: request.timestamp_us,
            frame_samples: tx.len(),
            airtime_us: tx.len() as f64 / phy.sample_rate() * 1e6,
        })
    }

    /// Run many independent links, in parallel when the `parallel` feature is on
    pub fn simulate_batch(&self, requests: &[LinkRequest]) -> Vec<LinkResult<LinkOutcome>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            requests.par_iter().map(|r| self.simulate(r)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            requests.iter().map(|r| self.simulate(r)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_simulator_is_shareable() {
        assert_send_sync::<LinkSimulator>();
    }

    #[test]
    fn test_host_vector() {
        let outcome = LinkOutcome {
            payload: vec![0xAA, 0x01],
            rx_power_dbm: -66.7,
            status: LinkStatus::Decoded {
                rate_mbps: 6.0,
                service_ok: true,
                evm_db: -30.0,
            },
            path_loss_db: 86.7,
            distance_m: 100.0,
            doppler_hz: 0.0,
            sender_id: 1,
            receiver_id: 2,
            timestamp_us: 0,
            frame_samples: 560,
            airtime_us: 28.0,
        };
        assert_eq!(outcome.to_host_vector(), vec![170.0, 1.0, -66.7]);
        assert!(outcome.delivered(&[0xAA, 0x01]));
    }

    #[test]
    fn test_link_seed_mixing() {
        let a = link_seed(0, 1, 2, 100);
        assert_eq!(a, link_seed(0, 1, 2, 100));
        assert_ne!(a, link_seed(0, 2, 1, 100));
        assert_ne!(a, link_seed(0, 1, 2, 101));
        assert_ne!(a, link_seed(1, 1, 2, 100));
    }

    #[test]
    fn test_agc_normalizes_to_0_dbw() {
        // -60 dBm with 5 dB antenna gain already applied
        assert_eq!(agc_compensation_db(-60.0, 5.0), 85.0);
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let sim = LinkSimulator::new(SimConfig::default().with_channel(ChannelConfig::noiseless())).unwrap();
        let request = LinkRequest::new(vec![1]).with_tx_power(f64::NAN);
        assert!(matches!(sim.simulate(&request), Err(LinkError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SimConfig::default().with_scrambler_seed(0);
        assert!(matches!(LinkSimulator::new(config), Err(LinkError::Config(_))));
    }
}
