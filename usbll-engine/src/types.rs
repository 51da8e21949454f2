//! Shared vocabulary types for the engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bus speed a transaction runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    /// 1.5 Mbit/s
    Low,
    /// 12 Mbit/s
    #[default]
    Full,
    /// 480 Mbit/s
    High,
}

impl Speed {
    pub fn name(&self) -> &'static str {
        match self {
            Speed::Low => "low",
            Speed::Full => "full",
            Speed::High => "high",
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Speed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "ls" | "low-speed" => Ok(Self::Low),
            "full" | "fs" | "full-speed" => Ok(Self::Full),
            "high" | "hs" | "high-speed" => Ok(Self::High),
            _ => Err(format!("Unknown bus speed: {}", s)),
        }
    }
}

/// Endpoint transfer type
///
/// `Unknown` until a configuration descriptor (or a SETUP on the pipe) tells us otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    #[default]
    Unknown,
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl EndpointType {
    /// Decode the two-bit transfer type used by both SPLIT tokens and
    /// `bmAttributes` of endpoint descriptors (0 control, 1 iso, 2 bulk, 3 interrupt).
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Control,
            1 => Self::Isochronous,
            2 => Self::Bulk,
            _ => Self::Interrupt,
        }
    }

    /// Periodic endpoints are scheduled by the transaction translator separately
    pub fn is_periodic(&self) -> bool {
        matches!(self, Self::Isochronous | Self::Interrupt)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Control => "control",
            Self::Isochronous => "isochronous",
            Self::Bulk => "bulk",
            Self::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EndpointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "control" | "ctrl" => Ok(Self::Control),
            "isochronous" | "iso" => Ok(Self::Isochronous),
            "bulk" => Ok(Self::Bulk),
            "interrupt" | "int" => Ok(Self::Interrupt),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown endpoint type: {}", s)),
        }
    }
}

/// Direction of a data stage, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Host to device (OUT)
    Out,
    /// Device to host (IN)
    In,
}

impl Direction {
    pub fn from_host(&self) -> bool {
        *self == Direction::Out
    }

    /// Direction bit of an endpoint address or `bmRequestType`
    pub fn from_address_bit(byte: u8) -> Self {
        if byte & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Direction::Out => 0,
            Direction::In => 1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Out => "OUT",
            Direction::In => "IN",
        })
    }
}

/// Endpoint parameters as learned from a configuration descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    #[serde(rename = "type")]
    pub kind: EndpointType,
    pub max_packet_size: u16,
}

/// One captured link-layer packet as handed over by the capture front-end
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Capture-order sequence number, starting at 1
    pub number: u32,
    /// Bus speed from the capture's link type, `None` when the capture does not say
    pub speed: Option<Speed>,
    /// Packet bytes starting with the PID octet
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(number: u32, speed: Option<Speed>, data: &'a [u8]) -> Self {
        Self {
            number,
            speed,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_parse() {
        assert_eq!("high".parse::<Speed>().unwrap(), Speed::High);
        assert_eq!("FS".parse::<Speed>().unwrap(), Speed::Full);
        assert!("super".parse::<Speed>().is_err());
    }

    #[test]
    fn test_endpoint_type_bits() {
        assert_eq!(EndpointType::from_bits(0), EndpointType::Control);
        assert_eq!(EndpointType::from_bits(1), EndpointType::Isochronous);
        assert_eq!(EndpointType::from_bits(2), EndpointType::Bulk);
        assert_eq!(EndpointType::from_bits(0x03 | 0x0c), EndpointType::Interrupt);
        assert!(EndpointType::Interrupt.is_periodic());
        assert!(!EndpointType::Bulk.is_periodic());
    }
}
