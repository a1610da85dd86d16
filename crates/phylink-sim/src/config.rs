//! # Simulator Configuration
//!
//! Settings that stay fixed across callback invocations: which waveform and
//! channel to run, channel impairments, the scrambler seed and the base RNG
//! seed. Per-packet values (positions, powers, rate) always arrive with the
//! request.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `PHYLINK_CONFIG` environment variable
//! 2. `./phylink.yaml` (current directory)
//! 3. `~/.config/phylink/config.yaml` (user config)
//! 4. `/etc/phylink/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! waveform: ofdm
//! channel:
//!   kind: propagation
//!   path_loss:
//!     model: log_distance
//!     exponent: 3.0
//!     reference_m: 1.0
//!   carrier_frequency_hz: 5.18e9
//!   shadowing_sigma_db: 4.0
//!   fading:
//!     type: rician
//!     k_factor: 6.0
//!   thermal_noise: true
//!   noise_figure_db: 7.0
//! scrambler_seed: 93
//! seed: 1
//! ```

use std::path::{Path, PathBuf};

use phylink_core::rate::DEFAULT_SCRAMBLER_SEED;
use phylink_core::WaveformKind;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{ChannelConfig, Fading};
use crate::error::ConfigError;
use crate::path_loss::PathLossModel;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "PHYLINK_CONFIG";

/// Link simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub waveform: WaveformKind,
    pub channel: ChannelConfig,
    /// Data scrambler seed (1..=127)
    pub scrambler_seed: u8,
    /// Base seed for channel randomness; mixed with link identity per call
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            waveform: WaveformKind::Ofdm,
            channel: ChannelConfig::default(),
            scrambler_seed: DEFAULT_SCRAMBLER_SEED,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_scrambler_seed(mut self, seed: u8) -> Self {
        self.scrambler_seed = seed;
        self
    }

    /// Load configuration from the default search path.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "{} points to {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./phylink.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "phylink") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/phylink/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrambler_seed == 0 || self.scrambler_seed > 0x7F {
            return Err(ConfigError::Validation(
                "scrambler_seed must be in 1..=127".to_string(),
            ));
        }
        self.channel.validate()
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            channel: ChannelConfig::default()
                .with_path_loss(PathLossModel::LogDistance {
                    exponent: 3.0,
                    reference_m: 1.0,
                })
                .with_shadowing(4.0)
                .with_fading(Fading::Rician { k_factor: 6.0 }),
            seed: 1,
            ..Default::default()
        };
        serde_yaml::to_string(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.waveform, WaveformKind::Ofdm);
        assert_eq!(config.channel.path_loss, PathLossModel::FreeSpace);
        assert_eq!(config.channel.carrier_frequency_hz, 5.18e9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
channel:
  kind: propagation
  path_loss:
    model: log_distance
    exponent: 2.7
    reference_m: 5.0
  fading:
    type: rayleigh
  thermal_noise: false
seed: 99
"#;
        let config = SimConfig::parse(yaml).unwrap();
        assert_eq!(
            config.channel.path_loss,
            PathLossModel::LogDistance {
                exponent: 2.7,
                reference_m: 5.0
            }
        );
        assert_eq!(config.channel.fading, Fading::Rayleigh);
        assert!(!config.channel.thermal_noise);
        assert_eq!(config.seed, 99);
        // Unspecified fields keep their defaults
        assert_eq!(config.channel.noise_figure_db, 7.0);
        assert_eq!(config.scrambler_seed, DEFAULT_SCRAMBLER_SEED);
    }

    #[test]
    fn test_ideal_channel_yaml() {
        let config = SimConfig::parse("channel:\n  kind: ideal\n").unwrap();
        assert_eq!(config.channel.kind, ChannelKind::Ideal);
    }

    #[test]
    fn test_example_yaml_round_trips() {
        let yaml = SimConfig::example_yaml();
        let parsed = SimConfig::parse(&yaml).unwrap();
        assert_eq!(parsed.channel.fading, Fading::Rician { k_factor: 6.0 });
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            SimConfig::parse("scrambler_seed: 0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            SimConfig::parse("channel:\n  noise_figure_db: -3\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            SimConfig::parse("channel: [1, 2]\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
