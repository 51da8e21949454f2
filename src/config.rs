//! Analyzer configuration
//!
//! Read from `~/.config/usbll/config.toml`. Everything is optional:
//!
//! ```toml
//! fallback_speed = "high"
//! format = "text"
//! hex = false
//!
//! [[endpoint]]
//! address = 3
//! endpoint = 0x81
//! type = "interrupt"
//! max_packet_size = 8
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use usbll_engine::{EndpointDescriptor, EndpointDescriptors, EndpointType, SessionConfig, Speed};

use crate::error::CaptureError;
use crate::pcap_analyzer::OutputFormat;

/// Endpoint known ahead of time, for captures that start after enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSeed {
    pub address: u8,
    /// `bEndpointAddress`, direction bit included (e.g. 0x81 for EP1 IN)
    pub endpoint: u8,
    #[serde(rename = "type")]
    pub kind: EndpointType,
    pub max_packet_size: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speed used for link type 288 captures, which do not record it
    pub fallback_speed: Speed,
    pub format: OutputFormat,
    pub hex: bool,
    #[serde(rename = "endpoint")]
    pub endpoints: Vec<EndpointSeed>,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("usbll")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|source| CaptureError::Config {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            fallback_speed: self.fallback_speed,
        }
    }

    /// Descriptor store holding the configured endpoints
    pub fn descriptor_store(&self) -> EndpointDescriptors {
        let mut store = EndpointDescriptors::new();
        for seed in &self.endpoints {
            store.insert(
                seed.address,
                seed.endpoint,
                EndpointDescriptor {
                    kind: seed.kind,
                    max_packet_size: seed.max_packet_size,
                },
            );
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbll_engine::DescriptorStore;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert_eq!(Config::default().fallback_speed, Speed::Full);
    }

    #[test]
    fn test_endpoint_seeds() {
        let config = Config::parse(
            r#"
            fallback_speed = "high"
            format = "json"

            [[endpoint]]
            address = 3
            endpoint = 0x81
            type = "interrupt"
            max_packet_size = 8

            [[endpoint]]
            address = 3
            endpoint = 0x02
            type = "bulk"
            max_packet_size = 512
            "#,
        )
        .unwrap();

        assert_eq!(config.fallback_speed, Speed::High);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.endpoints.len(), 2);

        let store = config.descriptor_store();
        assert_eq!(
            store.endpoint(3, 0x81),
            Some(EndpointDescriptor {
                kind: EndpointType::Interrupt,
                max_packet_size: 8
            })
        );
        assert_eq!(store.endpoint(3, 0x02).map(|d| d.max_packet_size), Some(512));
    }

    #[test]
    fn test_bad_speed_rejected() {
        assert!(Config::parse(r#"fallback_speed = "warp""#).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("usbll-no-such-config.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_default_roundtrip() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), Config::default());
    }
}
