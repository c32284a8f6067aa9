//! Detector configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::candidate::{Endpoint, DEFAULT_NETWORK_ENDPOINT};
use crate::error::DetectError;

/// Baud rates swept for every serial candidate, most common first
pub const DEFAULT_BAUD_RATES: [u32; 5] = [4800, 9600, 38400, 57600, 115200];

/// Time a candidate is given to produce a valid frame
pub const DEFAULT_OBSERVATION_WINDOW_MS: u64 = 2000;

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Baud rates tried, in order, for each serial candidate
    pub baud_rates: Vec<u32>,
    /// Observation window for serial and platform candidates (ms)
    pub observation_window_ms: u64,
    /// Observation window for network candidates (ms), defaults to
    /// `observation_window_ms` when unset
    #[serde(default)]
    pub network_window_ms: Option<u64>,
    /// Network endpoint placed ahead of the serial ports
    #[serde(default = "default_network_endpoint")]
    pub network_endpoint: String,
}

fn default_network_endpoint() -> String {
    DEFAULT_NETWORK_ENDPOINT.to_string()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            baud_rates: DEFAULT_BAUD_RATES.to_vec(),
            observation_window_ms: DEFAULT_OBSERVATION_WINDOW_MS,
            network_window_ms: None,
            network_endpoint: default_network_endpoint(),
        }
    }
}

impl DetectorConfig {
    /// Check the configuration can drive a search
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.baud_rates.is_empty() {
            return Err(DetectError::InvalidConfig("baud rate list is empty".into()));
        }
        if self.baud_rates.contains(&0) {
            return Err(DetectError::InvalidConfig("baud rate of 0".into()));
        }
        if self.observation_window_ms == 0 || self.network_window_ms == Some(0) {
            return Err(DetectError::InvalidConfig(
                "observation window must be non-zero".into(),
            ));
        }
        Endpoint::classify(&self.network_endpoint)?;
        Ok(())
    }

    /// Observation window applying to an endpoint
    pub fn window_for(&self, endpoint: &Endpoint) -> Duration {
        let ms = match endpoint {
            Endpoint::Network(_) => self
                .network_window_ms
                .unwrap_or(self.observation_window_ms),
            Endpoint::Platform | Endpoint::Serial { .. } => self.observation_window_ms,
        };
        Duration::from_millis(ms)
    }

    /// Upper bound on a search over `candidates` that never succeeds
    pub fn worst_case(&self, candidates: &[crate::Candidate]) -> Duration {
        candidates
            .iter()
            .map(|c| {
                let tries = if c.endpoint.is_serial() {
                    self.baud_rates.len() as u32
                } else {
                    1
                };
                self.window_for(&c.endpoint) * tries
            })
            .sum()
    }
}

/// Frame format used when opening a serial candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Link speed under test
    pub baud_rate: u32,
    /// Data bits (always eight)
    pub data_bits: DataBits,
    /// Parity (always none)
    pub parity: Parity,
    /// Stop bits (always one)
    pub stop_bits: StopBits,
    /// Flow control (always off)
    pub flow_control: FlowControl,
}

impl SerialSettings {
    /// 8N1 without flow control at the given baud rate
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candidate;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.baud_rates, vec![4800, 9600, 38400, 57600, 115200]);
        assert_eq!(config.observation_window_ms, 2000);
        assert_eq!(config.network_endpoint, "localhost:2947:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_bauds() {
        let config = DetectorConfig {
            baud_rates: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DetectError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_network_endpoint() {
        let config = DetectorConfig {
            network_endpoint: "localhost:abc".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DetectError::MalformedEndpoint { .. })
        ));
    }

    #[test]
    fn test_network_window_override() {
        let config = DetectorConfig {
            network_window_ms: Some(5000),
            ..Default::default()
        };
        let net = Endpoint::classify("localhost:2947:").unwrap();
        let serial = Endpoint::classify("/dev/ttyUSB0").unwrap();
        assert_eq!(config.window_for(&net), Duration::from_secs(5));
        assert_eq!(config.window_for(&serial), Duration::from_secs(2));
    }

    #[test]
    fn test_worst_case() {
        let config = DetectorConfig::default();
        let candidates = vec![
            Candidate::new("localhost:2947:", "local gpsd").unwrap(),
            Candidate::new("/dev/ttyUSB0", "/dev/ttyUSB0").unwrap(),
        ];
        // 1 network attempt + 5 bauds, 2s each
        assert_eq!(config.worst_case(&candidates), Duration::from_secs(12));
    }

    #[test]
    fn test_config_json_defaults() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"baud_rates":[9600],"observation_window_ms":1500}"#).unwrap();
        assert_eq!(config.network_window_ms, None);
        assert_eq!(config.network_endpoint, DEFAULT_NETWORK_ENDPOINT);
    }

    #[test]
    fn test_serial_settings_8n1() {
        let settings = SerialSettings::new(38400);
        assert_eq!(settings.baud_rate, 38400);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.flow_control, FlowControl::None);
    }
}
