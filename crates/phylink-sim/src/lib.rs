//! # phylink Link Simulation
//!
//! Per-(packet, receiver) link simulation for an external network
//! simulator. Each call runs the PHY from [`phylink_core`] over a
//! propagation channel and returns the recovered payload together with the
//! received power.
//!
//! ## Overview
//!
//! - **Geometry**: 3-D positions and velocities, range and closing speed
//! - **Path loss**: free space and log-distance with a near-field floor
//! - **Channel**: [`ChannelModel`] with shadowing, flat fading, Doppler and
//!   thermal noise, plus an ideal channel
//! - **Configuration**: YAML [`SimConfig`] with a standard search path
//! - **Link**: [`LinkBackend`] and the [`LinkSimulator`] callback
//!
//! ## Example
//!
//! ```rust,no_run
//! use phylink_sim::{LinkRequest, LinkSimulator, SimConfig, Vec3};
//!
//! let sim = LinkSimulator::new(SimConfig::default()).unwrap();
//! let request = LinkRequest::new(vec![0xAA])
//!     .with_positions(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0))
//!     .with_tx_power(20.0)
//!     .with_rate(true, 12)
//!     .with_bandwidth(20);
//!
//! let outcome = sim.simulate(&request).unwrap();
//! println!("{:?} at {:.1} dBm", outcome.payload, outcome.rx_power_dbm);
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod geometry;
pub mod link;
pub mod path_loss;

pub use channel::{
    ChannelConfig, ChannelKind, ChannelModel, ChannelOutput, Fading, IdealChannel,
    PropagationChannel, RfBudget,
};
pub use config::SimConfig;
pub use error::{ConfigError, LinkError, LinkResult};
pub use geometry::{LinkGeometry, Vec3};
pub use link::{
    agc_compensation_db, link_seed, LinkBackend, LinkOutcome, LinkRequest, LinkSimulator,
    LinkStatus, StandardBackend,
};
pub use path_loss::{PathLossModel, DEFAULT_CARRIER_HZ};
