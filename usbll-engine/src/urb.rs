//! Reconstructed transfers and the next-layer dissector registry

use serde::Serialize;
use std::fmt;

use crate::setup::{SetupPacket, SETUP_LEN};
use crate::types::{Direction, EndpointType, Speed};

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrbStatus {
    /// Requested length reached, short packet, or single-packet transfer
    #[default]
    Complete,
    /// Endpoint answered STALL
    Stalled,
    /// High-speed NYET cut the transfer short
    NotYet,
}

impl fmt::Display for UrbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UrbStatus::Complete => "complete",
            UrbStatus::Stalled => "stalled",
            UrbStatus::NotYet => "nyet",
        })
    }
}

/// One reassembled transfer, ready for a next-layer dissector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Urb {
    /// Frame number of the packet that started the transfer
    pub transfer_key: u32,
    /// Frame number of the packet that completed it
    pub completed_in: u32,
    pub speed: Speed,
    #[serde(rename = "type")]
    pub kind: EndpointType,
    pub direction: Direction,
    pub device: u8,
    pub endpoint: u8,
    /// SETUP of the control transfer this data belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupPacket>,
    /// Reassembled bytes; host-to-device control transfers start with the SETUP bytes
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
    pub status: UrbStatus,
}

fn serialize_hex<S: serde::Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = data.iter().map(|b| format!("{:02x}", b)).collect();
    serializer.serialize_str(&hex)
}

impl Urb {
    /// Data stage bytes, without the leading SETUP of host-to-device control transfers
    pub fn payload(&self) -> &[u8] {
        let leading_setup = self.kind == EndpointType::Control
            && self.direction == Direction::Out
            && self.setup.is_some()
            && self.data.len() >= SETUP_LEN;
        if leading_setup {
            &self.data[SETUP_LEN..]
        } else {
            &self.data
        }
    }
}

/// Next-layer protocol dissector fed with reassembled transfers
pub trait UrbDissector {
    fn name(&self) -> &'static str;

    /// Whether this dissector understands the transfer (speed, device, endpoint, setup)
    fn accepts(&self, urb: &Urb) -> bool;

    /// One-line summary of the transfer
    fn dissect(&self, urb: &Urb) -> String;
}

/// Dissectors registered per endpoint type, consulted in registration order
#[derive(Default)]
pub struct UrbDissectors {
    handlers: Vec<(EndpointType, Box<dyn UrbDissector>)>,
}

impl UrbDissectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EndpointType, dissector: Box<dyn UrbDissector>) {
        self.handlers.push((kind, dissector));
    }

    pub fn with(mut self, kind: EndpointType, dissector: Box<dyn UrbDissector>) -> Self {
        self.register(kind, dissector);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Summary from the first registered dissector accepting the transfer
    pub fn dispatch(&self, urb: &Urb) -> Option<String> {
        self.handlers
            .iter()
            .filter(|(kind, _)| *kind == urb.kind)
            .find(|(_, d)| d.accepts(urb))
            .map(|(_, d)| d.dissect(urb))
    }
}

impl fmt::Debug for UrbDissectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(kind, d)| (kind, d.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, u8);

    impl UrbDissector for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn accepts(&self, urb: &Urb) -> bool {
            urb.device == self.1
        }

        fn dissect(&self, _urb: &Urb) -> String {
            self.0.to_string()
        }
    }

    fn urb(kind: EndpointType, device: u8) -> Urb {
        Urb {
            transfer_key: 1,
            completed_in: 1,
            speed: Speed::Full,
            kind,
            direction: Direction::In,
            device,
            endpoint: 1,
            setup: None,
            data: vec![1, 2],
            status: UrbStatus::Complete,
        }
    }

    #[test]
    fn test_dispatch_by_type_and_accepts() {
        let registry = UrbDissectors::new()
            .with(EndpointType::Bulk, Box::new(Fixed("first", 3)))
            .with(EndpointType::Bulk, Box::new(Fixed("second", 4)))
            .with(EndpointType::Interrupt, Box::new(Fixed("int", 4)));

        assert_eq!(registry.dispatch(&urb(EndpointType::Bulk, 4)).as_deref(), Some("second"));
        assert_eq!(registry.dispatch(&urb(EndpointType::Interrupt, 4)).as_deref(), Some("int"));
        assert_eq!(registry.dispatch(&urb(EndpointType::Control, 4)), None);
    }

    #[test]
    fn test_payload_skips_leading_setup() {
        let mut u = urb(EndpointType::Control, 1);
        u.direction = Direction::Out;
        u.setup = Some(SetupPacket::new(0x21, 0x09, 0x0200, 0, 2));
        u.data = vec![0x21, 0x09, 0x00, 0x02, 0x00, 0x00, 0x02, 0x00, 0xaa, 0xbb];
        assert_eq!(u.payload(), &[0xaa, 0xbb]);
    }

    #[test]
    fn test_urb_json_hex_data() {
        let json = serde_json::to_value(urb(EndpointType::Bulk, 1)).unwrap();
        assert_eq!(json["data"], "0102");
        assert_eq!(json["type"], "bulk");
    }
}
