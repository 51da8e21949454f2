//! Per-packet field decoding
//!
//! Produces the flat annotation list for a frame: one [`Field`] per protocol field,
//! with its byte range inside the packet. Parsers here are pure; state tracking
//! happens in [`crate::session`].

use serde::Serialize;

use crate::crc::{crc16, crc5_11bit, crc5_19bit};
use crate::error::Advisory;
use crate::state::SplitPhase;
use crate::types::{EndpointType, Speed};

/// Decoded value of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Uint(u32),
    Bool(bool),
    Bytes(Vec<u8>),
    Text(String),
}

/// One entry of the annotation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: &'static str,
    /// Byte offset of the first byte holding this field, PID octet included
    pub offset: usize,
    /// Number of bytes the field spans
    pub length: usize,
    pub value: FieldValue,
    /// Human readable rendering, when it differs from the raw value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Field {
    pub fn uint(name: &'static str, offset: usize, length: usize, value: u32) -> Self {
        Self {
            name,
            offset,
            length,
            value: FieldValue::Uint(value),
            text: None,
        }
    }

    pub fn flag(name: &'static str, offset: usize, length: usize, value: bool) -> Self {
        Self {
            name,
            offset,
            length,
            value: FieldValue::Bool(value),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Short `name=value` rendering used by the text printer
    pub fn summary(&self) -> String {
        match (&self.text, &self.value) {
            (Some(text), _) => format!("{}={}", self.name, text),
            (None, FieldValue::Uint(v)) => format!("{}={}", self.name, v),
            (None, FieldValue::Bool(b)) => format!("{}={}", self.name, b),
            (None, FieldValue::Bytes(b)) => format!("{}=[{} bytes]", self.name, b.len()),
            (None, FieldValue::Text(t)) => format!("{}={}", self.name, t),
        }
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "good"
    } else {
        "bad"
    }
}

/// Check the packet is at least `expected` bytes long
fn require(data: &[u8], expected: usize) -> Result<(), Advisory> {
    if data.len() < expected {
        Err(Advisory::Truncated {
            expected,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Bytes beyond a fixed-size packet
pub fn trailing(data: &[u8], expected: usize) -> Option<Advisory> {
    (data.len() > expected).then(|| Advisory::UndecodedData {
        length: data.len() - expected,
    })
}

/// Address token (SETUP/OUT/IN/PING) or EXT: 7-bit address, 4-bit endpoint, CRC5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFields {
    pub address: u8,
    pub endpoint: u8,
    pub crc5: u8,
    pub crc_ok: bool,
}

pub const TOKEN_LEN: usize = 3;

impl TokenFields {
    pub fn parse(data: &[u8]) -> Result<Self, Advisory> {
        require(data, TOKEN_LEN)?;
        let word = u16::from_le_bytes([data[1], data[2]]);
        let crc5 = (word >> 11) as u8;
        Ok(Self {
            address: (word & 0x7f) as u8,
            endpoint: ((word >> 7) & 0x0f) as u8,
            crc5,
            crc_ok: crc5_11bit(word) == crc5,
        })
    }

    pub fn crc_advisory(&self) -> Option<Advisory> {
        (!self.crc_ok).then(|| Advisory::Crc5Mismatch {
            expected: crc5_11bit(u16::from(self.address) | (u16::from(self.endpoint) << 7)),
            actual: self.crc5,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        vec![
            Field::uint("device_addr", 1, 1, u32::from(self.address)),
            Field::uint("endp", 1, 2, u32::from(self.endpoint)),
            Field::uint("crc5", 2, 1, u32::from(self.crc5)).with_text(format!(
                "0x{:02x} [{}]",
                self.crc5,
                status(self.crc_ok)
            )),
        ]
    }
}

/// Start-of-frame: 11-bit frame number and CRC5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SofFields {
    pub frame_number: u16,
    pub crc5: u8,
    pub crc_ok: bool,
}

impl SofFields {
    pub fn parse(data: &[u8]) -> Result<Self, Advisory> {
        require(data, TOKEN_LEN)?;
        let word = u16::from_le_bytes([data[1], data[2]]);
        let crc5 = (word >> 11) as u8;
        Ok(Self {
            frame_number: word & 0x07ff,
            crc5,
            crc_ok: crc5_11bit(word) == crc5,
        })
    }

    pub fn crc_advisory(&self) -> Option<Advisory> {
        (!self.crc_ok).then(|| Advisory::Crc5Mismatch {
            expected: crc5_11bit(self.frame_number),
            actual: self.crc5,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        vec![
            Field::uint("frame_number", 1, 2, u32::from(self.frame_number)),
            Field::uint("crc5", 2, 1, u32::from(self.crc5)).with_text(format!(
                "0x{:02x} [{}]",
                self.crc5,
                status(self.crc_ok)
            )),
        ]
    }
}

/// SPLIT special token (24 bits after the PID)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitFields {
    pub hub: u8,
    pub phase: SplitPhase,
    pub port: u8,
    /// Low speed for control/bulk/interrupt, start flag for isochronous OUT
    pub s: bool,
    /// End flag for isochronous OUT, otherwise reserved
    pub eu: bool,
    pub kind: EndpointType,
    pub crc5: u8,
    pub crc_ok: bool,
}

pub const SPLIT_LEN: usize = 4;

impl SplitFields {
    pub fn parse(data: &[u8]) -> Result<Self, Advisory> {
        require(data, SPLIT_LEN)?;
        let word = u32::from_le_bytes([data[1], data[2], data[3], 0]);
        let crc5 = (word >> 19) as u8;
        Ok(Self {
            hub: (word & 0x7f) as u8,
            phase: if word & (1 << 7) != 0 {
                SplitPhase::Complete
            } else {
                SplitPhase::Start
            },
            port: ((word >> 8) & 0x7f) as u8,
            s: word & (1 << 15) != 0,
            eu: word & (1 << 16) != 0,
            kind: EndpointType::from_bits(((word >> 17) & 0x03) as u8),
            crc5,
            crc_ok: crc5_19bit(word) == crc5,
        })
    }

    /// The 19 bits covered by the CRC
    pub fn raw(&self) -> u32 {
        let mut word = u32::from(self.hub) | (u32::from(self.port) << 8);
        if self.phase == SplitPhase::Complete {
            word |= 1 << 7;
        }
        if self.s {
            word |= 1 << 15;
        }
        if self.eu {
            word |= 1 << 16;
        }
        let et = match self.kind {
            EndpointType::Control | EndpointType::Unknown => 0,
            EndpointType::Isochronous => 1,
            EndpointType::Bulk => 2,
            EndpointType::Interrupt => 3,
        };
        word | (et << 17)
    }

    /// Speed of the downstream transaction
    pub fn speed(&self) -> Speed {
        if self.kind == EndpointType::Isochronous || !self.s {
            Speed::Full
        } else {
            Speed::Low
        }
    }

    pub fn crc_advisory(&self) -> Option<Advisory> {
        (!self.crc_ok).then(|| Advisory::Crc5Mismatch {
            expected: crc5_19bit(self.raw()),
            actual: self.crc5,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        let s_text = if self.kind == EndpointType::Isochronous {
            if self.s {
                "start"
            } else {
                "not start"
            }
        } else if self.s {
            "low speed"
        } else {
            "full speed"
        };
        let phase = match self.phase {
            SplitPhase::Start => "SSPLIT",
            SplitPhase::Complete => "CSPLIT",
        };
        vec![
            Field::uint("hub_addr", 1, 1, u32::from(self.hub)),
            Field::flag("sc", 1, 1, self.phase == SplitPhase::Complete).with_text(phase),
            Field::uint("port", 2, 1, u32::from(self.port)),
            Field::flag("s", 2, 1, self.s).with_text(s_text),
            Field::flag("e_u", 3, 1, self.eu),
            Field::uint("et", 3, 1, u32::from((self.raw() >> 17) as u8 & 0x03))
                .with_text(self.kind.name()),
            Field::uint("crc5", 3, 1, u32::from(self.crc5)).with_text(format!(
                "0x{:02x} [{}]",
                self.crc5,
                status(self.crc_ok)
            )),
        ]
    }
}

/// BESL value in microseconds (LPM addendum table X-X1)
pub fn besl_microseconds(besl: u8) -> u32 {
    const TABLE: [u32; 16] = [
        125, 150, 200, 300, 400, 500, 1000, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 9000,
        10000,
    ];
    TABLE[usize::from(besl & 0x0f)]
}

/// LPM SubPID packet following EXT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpmFields {
    pub link_state: u8,
    pub besl: u8,
    pub remote_wake: bool,
    pub reserved: u8,
    pub crc5: u8,
    pub crc_ok: bool,
}

impl LpmFields {
    pub fn parse(data: &[u8]) -> Result<Self, Advisory> {
        require(data, TOKEN_LEN)?;
        let word = u16::from_le_bytes([data[1], data[2]]);
        let crc5 = (word >> 11) as u8;
        Ok(Self {
            link_state: (word & 0x0f) as u8,
            besl: ((word >> 4) & 0x0f) as u8,
            remote_wake: word & (1 << 8) != 0,
            reserved: ((word >> 9) & 0x03) as u8,
            crc5,
            crc_ok: crc5_11bit(word) == crc5,
        })
    }

    fn raw(&self) -> u16 {
        u16::from(self.link_state)
            | (u16::from(self.besl) << 4)
            | (u16::from(self.remote_wake) << 8)
            | (u16::from(self.reserved) << 9)
    }

    pub fn crc_advisory(&self) -> Option<Advisory> {
        (!self.crc_ok).then(|| Advisory::Crc5Mismatch {
            expected: crc5_11bit(self.raw()),
            actual: self.crc5,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        let link_state = if self.link_state == 1 {
            "L1 (Sleep)"
        } else {
            "Reserved"
        };
        vec![
            Field::uint("lpm_link_state", 1, 1, u32::from(self.link_state)).with_text(link_state),
            Field::uint("lpm_besl", 1, 1, u32::from(self.besl))
                .with_text(format!("{} us", besl_microseconds(self.besl))),
            Field::flag("lpm_remote_wake", 2, 1, self.remote_wake),
            Field::uint("lpm_reserved", 2, 1, u32::from(self.reserved)),
            Field::uint("crc5", 2, 1, u32::from(self.crc5)).with_text(format!(
                "0x{:02x} [{}]",
                self.crc5,
                status(self.crc_ok)
            )),
        ]
    }
}

/// DATA0/1/2/MDATA: payload followed by CRC16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFields<'a> {
    pub payload: &'a [u8],
    pub crc16: u16,
    pub crc_ok: bool,
}

/// PID octet plus CRC16
pub const DATA_MIN_LEN: usize = 3;

impl<'a> DataFields<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, Advisory> {
        require(data, DATA_MIN_LEN)?;
        let crc_at = data.len() - 2;
        let payload = &data[1..crc_at];
        let crc = u16::from_le_bytes([data[crc_at], data[crc_at + 1]]);
        Ok(Self {
            payload,
            crc16: crc,
            crc_ok: crc16(payload) == crc,
        })
    }

    pub fn crc_advisory(&self) -> Option<Advisory> {
        (!self.crc_ok).then(|| Advisory::Crc16Mismatch {
            expected: crc16(self.payload),
            actual: self.crc16,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::with_capacity(2);
        if !self.payload.is_empty() {
            fields.push(Field {
                name: "data",
                offset: 1,
                length: self.payload.len(),
                value: FieldValue::Bytes(self.payload.to_vec()),
                text: None,
            });
        }
        fields.push(
            Field::uint("data_crc", 1 + self.payload.len(), 2, u32::from(self.crc16)).with_text(
                format!("0x{:04x} [{}]", self.crc16, status(self.crc_ok)),
            ),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parse() {
        // SETUP addr 1 ep 0
        let t = TokenFields::parse(&[0x2d, 0x01, 0xe8]).unwrap();
        assert_eq!(t.address, 1);
        assert_eq!(t.endpoint, 0);
        assert!(t.crc_ok);
        assert!(t.crc_advisory().is_none());

        let t = TokenFields::parse(&[0x2d, 0x01, 0xe0]).unwrap();
        assert_eq!(t.endpoint, 0);
        assert!(!t.crc_ok);
        assert!(matches!(
            t.crc_advisory(),
            Some(Advisory::Crc5Mismatch { expected: 0x1d, .. })
        ));
    }

    #[test]
    fn test_token_truncated() {
        assert_eq!(
            TokenFields::parse(&[0x69, 0x01]),
            Err(Advisory::Truncated {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_split_fields() {
        // hub 5, start, port 3, full speed, control
        let raw: u32 = 5 | (3 << 8);
        let word = raw | (u32::from(crc5_19bit(raw)) << 19);
        let bytes = word.to_le_bytes();
        let s = SplitFields::parse(&[0x78, bytes[0], bytes[1], bytes[2]]).unwrap();
        assert_eq!(s.hub, 5);
        assert_eq!(s.port, 3);
        assert_eq!(s.phase, SplitPhase::Start);
        assert_eq!(s.kind, EndpointType::Control);
        assert_eq!(s.speed(), Speed::Full);
        assert!(s.crc_ok);
        assert_eq!(s.raw(), raw);
    }

    #[test]
    fn test_data_fields() {
        let d = DataFields::parse(&[0xc3, 0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00, 0xdd, 0x94])
            .unwrap();
        assert_eq!(d.payload.len(), 8);
        assert!(d.crc_ok);

        let zlp = DataFields::parse(&[0x4b, 0x00, 0x00]).unwrap();
        assert!(zlp.payload.is_empty());
        assert!(zlp.crc_ok);
        assert_eq!(zlp.fields().len(), 1);
    }

    #[test]
    fn test_lpm_fields() {
        // L1, BESL 4, remote wake
        let raw: u16 = 1 | (4 << 4) | (1 << 8);
        let word = raw | (u16::from(crc5_11bit(raw)) << 11);
        let b = word.to_le_bytes();
        let l = LpmFields::parse(&[0xc3, b[0], b[1]]).unwrap();
        assert_eq!(l.link_state, 1);
        assert_eq!(l.besl, 4);
        assert!(l.remote_wake);
        assert!(l.crc_ok);
        assert_eq!(besl_microseconds(l.besl), 400);
    }

    #[test]
    fn test_trailing_bytes() {
        assert_eq!(
            trailing(&[0x2d, 0, 0x10, 0xff], TOKEN_LEN),
            Some(Advisory::UndecodedData { length: 1 })
        );
        assert_eq!(trailing(&[0xd2], 1), None);
    }
}
