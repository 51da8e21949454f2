//! Configuration descriptor learner
//!
//! Parses GET_DESCRIPTOR(CONFIGURATION) responses and records every endpoint's type
//! and max packet size in the descriptor store the session reads from. Later
//! transfers on those endpoints are then reassembled with the right packet size.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use usbll_engine::setup::descriptor;
use usbll_engine::{Direction, EndpointDescriptor, EndpointDescriptors, EndpointType, Urb, UrbDissector};

/// `wMaxPacketSize` bits 0-10; bits 11-12 count extra high-bandwidth transactions
const MAX_PACKET_SIZE_MASK: u16 = 0x07ff;

/// Endpoint descriptor as found inside a configuration descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguredEndpoint {
    /// `bEndpointAddress`, direction bit included
    pub address: u8,
    pub kind: EndpointType,
    pub max_packet_size: u16,
}

/// Interfaces and endpoints found in a (possibly truncated) configuration descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub value: u8,
    pub interfaces: usize,
    pub endpoints: Vec<ConfiguredEndpoint>,
}

/// Walk the descriptor chain. Stops at the first descriptor that does not fit.
pub fn parse_configuration(data: &[u8]) -> Option<Configuration> {
    if data.len() < 2 || data[1] != descriptor::CONFIGURATION {
        return None;
    }
    let mut config = Configuration {
        value: data.get(5).copied().unwrap_or(0),
        ..Default::default()
    };

    let mut rest = data;
    while rest.len() >= 2 {
        let length = usize::from(rest[0]);
        if length < 2 || length > rest.len() {
            break;
        }
        let (current, tail) = rest.split_at(length);
        match current[1] {
            descriptor::INTERFACE => config.interfaces += 1,
            descriptor::ENDPOINT if length >= 7 => {
                config.endpoints.push(ConfiguredEndpoint {
                    address: current[2] & 0x8f,
                    kind: EndpointType::from_bits(current[3]),
                    max_packet_size: u16::from_le_bytes([current[4], current[5]])
                        & MAX_PACKET_SIZE_MASK,
                });
            }
            _ => {}
        }
        rest = tail;
    }
    Some(config)
}

/// Feeds learned endpoints into a shared store
#[derive(Debug, Clone)]
pub struct ConfigurationLearner {
    store: Arc<RwLock<EndpointDescriptors>>,
}

impl ConfigurationLearner {
    pub fn new(store: Arc<RwLock<EndpointDescriptors>>) -> Self {
        Self { store }
    }
}

impl UrbDissector for ConfigurationLearner {
    fn name(&self) -> &'static str {
        "configuration-learner"
    }

    fn accepts(&self, urb: &Urb) -> bool {
        urb.direction == Direction::In
            && !urb.data.is_empty()
            && urb
                .setup
                .is_some_and(|setup| setup.descriptor_type() == Some(descriptor::CONFIGURATION))
    }

    fn dissect(&self, urb: &Urb) -> String {
        let Some(config) = parse_configuration(urb.payload()) else {
            return "CONFIGURATION: malformed".to_string();
        };

        let mut store = self.store.write();
        for endpoint in &config.endpoints {
            debug!(
                "Device {} endpoint 0x{:02x}: {} max packet size {}",
                urb.device, endpoint.address, endpoint.kind, endpoint.max_packet_size
            );
            store.insert(
                urb.device,
                endpoint.address,
                EndpointDescriptor {
                    kind: endpoint.kind,
                    max_packet_size: endpoint.max_packet_size,
                },
            );
        }

        let endpoints: Vec<String> = config
            .endpoints
            .iter()
            .map(|e| format!("0x{:02x} {} {}", e.address, e.kind, e.max_packet_size))
            .collect();
        format!(
            "CONFIGURATION {}: {} interface(s), endpoints [{}]",
            config.value,
            config.interfaces,
            endpoints.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbll_engine::setup::request;
    use usbll_engine::{DescriptorStore, SetupPacket, Speed, UrbStatus};

    /// One interface, interrupt IN 0x81 (8 bytes) and bulk OUT 0x02 (64 bytes)
    fn sample_configuration() -> Vec<u8> {
        let mut data = vec![0x09, 0x02, 0x00, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32];
        data.extend_from_slice(&[0x09, 0x04, 0x00, 0x00, 0x02, 0xff, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0a]);
        data.extend_from_slice(&[0x07, 0x05, 0x02, 0x02, 0x40, 0x00, 0x00]);
        let total = data.len() as u16;
        data[2..4].copy_from_slice(&total.to_le_bytes());
        data
    }

    fn config_urb(data: Vec<u8>) -> Urb {
        Urb {
            transfer_key: 10,
            completed_in: 14,
            speed: Speed::Full,
            kind: EndpointType::Control,
            direction: Direction::In,
            device: 6,
            endpoint: 0,
            setup: Some(SetupPacket::new(0x80, request::GET_DESCRIPTOR, 0x0200, 0, 255)),
            data,
            status: UrbStatus::Complete,
        }
    }

    #[test]
    fn test_parse_configuration() {
        let config = parse_configuration(&sample_configuration()).unwrap();
        assert_eq!(config.value, 1);
        assert_eq!(config.interfaces, 1);
        assert_eq!(
            config.endpoints,
            vec![
                ConfiguredEndpoint {
                    address: 0x81,
                    kind: EndpointType::Interrupt,
                    max_packet_size: 8
                },
                ConfiguredEndpoint {
                    address: 0x02,
                    kind: EndpointType::Bulk,
                    max_packet_size: 64
                },
            ]
        );
    }

    #[test]
    fn test_header_only_request() {
        let data = sample_configuration();
        let config = parse_configuration(&data[..9]).unwrap();
        assert!(config.endpoints.is_empty());
        assert!(parse_configuration(&[0x12, 0x01]).is_none());
    }

    #[test]
    fn test_high_bandwidth_bits_masked() {
        let mut data = sample_configuration();
        // 1024 bytes, 2 additional transactions per microframe
        data[22..24].copy_from_slice(&(0x1400u16).to_le_bytes());
        let config = parse_configuration(&data).unwrap();
        assert_eq!(config.endpoints[0].max_packet_size, 0x400);
    }

    #[test]
    fn test_learner_fills_shared_store() {
        let store = Arc::new(RwLock::new(EndpointDescriptors::new()));
        let learner = ConfigurationLearner::new(Arc::clone(&store));
        let urb = config_urb(sample_configuration());

        assert!(learner.accepts(&urb));
        let summary = learner.dissect(&urb);
        assert_eq!(
            summary,
            "CONFIGURATION 1: 1 interface(s), endpoints [0x81 interrupt 8, 0x02 bulk 64]"
        );
        assert_eq!(
            store.endpoint(6, 0x81).map(|d| d.kind),
            Some(EndpointType::Interrupt)
        );
        assert_eq!(store.endpoint(6, 0x02).map(|d| d.max_packet_size), Some(64));
    }

    #[test]
    fn test_learner_ignores_other_descriptors() {
        let learner = ConfigurationLearner::new(Arc::default());
        let mut urb = config_urb(sample_configuration());
        urb.setup = Some(SetupPacket::new(0x80, request::GET_DESCRIPTOR, 0x0100, 0, 18));
        assert!(!learner.accepts(&urb));
    }
}
