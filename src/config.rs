// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered configuration: built-in defaults, overridden by an optional TOML
//! file, overridden by `NRFXFER_*` environment variables, overridden last by
//! CLI flags (applied by the binary after [`Config::load`] returns).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::{BURST_SIZE, GLOBAL_TIMEOUT, IDLE_TIMEOUT, MAX_ROUNDS, RADIO_CHANNEL, RADIO_RETRIES};
use crate::error::{Result, XferError};
use crate::radio::LinkConditions;

/// nRF24L01+ wiring and radio-chip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub ce_pin: u8,
    pub csn_pin: u8,
    pub channel: u8,
    /// Hardware auto-retry (delay, count).
    pub retry_delay: u8,
    pub retry_count: u8,
    /// `true` selects 2 Mbps; `false` selects 1 Mbps.
    pub high_data_rate: bool,
    /// 0 (min) to 3 (max), mirroring `RF24_PA_*`.
    pub pa_level: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            ce_pin: 22,
            csn_pin: 0,
            channel: RADIO_CHANNEL,
            retry_delay: RADIO_RETRIES.0,
            retry_count: RADIO_RETRIES.1,
            high_data_rate: true,
            pa_level: 3,
        }
    }
}

/// Transfer-loop tunables, distinct from the wire-format constants in
/// [`crate::constants`] (those must match on both ends of the link and are
/// never user-configurable).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub max_rounds: usize,
    pub burst_size: usize,
    pub global_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Where `nrf-xfer recv` writes reassembled files.
    pub dest_dir: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            max_rounds: MAX_ROUNDS,
            burst_size: BURST_SIZE,
            global_timeout_secs: GLOBAL_TIMEOUT.as_secs(),
            idle_timeout_secs: IDLE_TIMEOUT.as_secs(),
            dest_dir: PathBuf::from("received"),
        }
    }
}

/// Simulated link-impairment knobs, used to drive [`SimRadio`] for local
/// dry runs and fault-injection testing — never consulted by a real radio
/// driver.
///
/// [`SimRadio`]: crate::radio::SimRadio
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Probability in `[0, 1]` that any given frame is dropped.
    pub drop_probability: f64,
    /// Probability in `[0, 1]` that a random byte in a frame is flipped.
    pub bit_flip_probability: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig { drop_probability: 0.0, bit_flip_probability: 0.0 }
    }
}

impl SimConfig {
    /// Builds the [`LinkConditions`] a `SimRadio` pair should run under.
    #[must_use]
    pub fn to_link_conditions(&self) -> LinkConditions {
        LinkConditions {
            drop_probability: self.drop_probability,
            bit_flip_probability: self.bit_flip_probability,
            ..LinkConditions::default()
        }
    }
}

/// Top-level configuration, assembled by [`Config::load`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub radio: RadioConfig,
    pub transfer: TransferConfig,
    pub sim: SimConfig,
}

impl Config {
    /// Loads defaults, merges an optional TOML file, then merges
    /// `NRFXFER_*` environment variables. CLI flags are applied by the
    /// caller on top of the returned value.
    ///
    /// # Errors
    ///
    /// Returns `Err(XferError::Config)` if `file` is given but unreadable or
    /// not valid TOML for this shape.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = file {
            let text = std::fs::read_to_string(path)
                .map_err(|e| XferError::Config(format!("reading {}: {e}", path.display())))?;
            config = toml::from_str(&text)
                .map_err(|e| XferError::Config(format!("parsing {}: {e}", path.display())))?;
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u8("NRFXFER_RADIO_CHANNEL") {
            self.radio.channel = v;
        }
        if let Some(v) = env_u8("NRFXFER_CE_PIN") {
            self.radio.ce_pin = v;
        }
        if let Some(v) = env_u8("NRFXFER_CSN_PIN") {
            self.radio.csn_pin = v;
        }
        if let Ok(v) = std::env::var("NRFXFER_DEST_DIR") {
            self.transfer.dest_dir = PathBuf::from(v);
        }
        if let Some(v) = env_usize("NRFXFER_MAX_ROUNDS") {
            self.transfer.max_rounds = v;
        }
        if let Some(v) = env_usize("NRFXFER_BURST_SIZE") {
            self.transfer.burst_size = v;
        }
        if let Some(v) = env_f64("NRFXFER_SIM_DROP_PROBABILITY") {
            self.sim.drop_probability = v;
        }
        if let Some(v) = env_f64("NRFXFER_SIM_BIT_FLIP_PROBABILITY") {
            self.sim.bit_flip_probability = v;
        }
    }
}

fn env_u8(key: &str) -> Option<u8> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Seconds since the Unix epoch, used to name received files.
#[must_use]
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wire_constants() {
        let config = Config::default();
        assert_eq!(config.radio.channel, RADIO_CHANNEL);
        assert_eq!(config.transfer.max_rounds, MAX_ROUNDS);
        assert_eq!(config.transfer.burst_size, BURST_SIZE);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrf-xfer.toml");
        std::fs::write(&path, "[radio]\nchannel = 5\n\n[transfer]\nmax_rounds = 3\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.radio.channel, 5);
        assert_eq!(config.transfer.max_rounds, 3);
        assert_eq!(config.radio.ce_pin, RadioConfig::default().ce_pin);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_sim_config_defaults_to_a_clean_link() {
        let config = Config::default();
        let conditions = config.sim.to_link_conditions();
        assert_eq!(conditions.drop_probability, 0.0);
        assert_eq!(conditions.bit_flip_probability, 0.0);
    }

    #[test]
    fn test_sim_config_loaded_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrf-xfer.toml");
        std::fs::write(&path, "[sim]\ndrop_probability = 0.1\nbit_flip_probability = 0.05\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sim.drop_probability, 0.1);
        assert_eq!(config.sim.bit_flip_probability, 0.05);
    }
}
