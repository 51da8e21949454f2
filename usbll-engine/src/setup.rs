//! Control transfer SETUP packet (USB 2.0 table 9-2)

use serde::ser::{Serialize, SerializeStruct, Serializer};
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::types::Direction;

/// Standard requests (`bRequest`)
pub mod request {
    pub const GET_STATUS: u8 = 0x00;
    pub const CLEAR_FEATURE: u8 = 0x01;
    pub const SET_FEATURE: u8 = 0x03;
    pub const SET_ADDRESS: u8 = 0x05;
    pub const GET_DESCRIPTOR: u8 = 0x06;
    pub const SET_DESCRIPTOR: u8 = 0x07;
    pub const GET_CONFIGURATION: u8 = 0x08;
    pub const SET_CONFIGURATION: u8 = 0x09;
    pub const GET_INTERFACE: u8 = 0x0A;
    pub const SET_INTERFACE: u8 = 0x0B;
    pub const SYNCH_FRAME: u8 = 0x0C;
}

/// Descriptor types (high byte of `wValue` for GET_DESCRIPTOR)
pub mod descriptor {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const DEVICE_QUALIFIER: u8 = 0x06;
    pub const OTHER_SPEED_CONFIGURATION: u8 = 0x07;
    pub const INTERFACE_POWER: u8 = 0x08;
    pub const BOS: u8 = 0x0F;
    pub const HID: u8 = 0x21;
    pub const HID_REPORT: u8 = 0x22;
}

pub const SETUP_LEN: usize = 8;

/// Offset of `bMaxPacketSize0` in a device descriptor
pub const DEVICE_DESCRIPTOR_MPS_OFFSET: usize = 7;

/// 8-byte SETUP payload, laid out as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    value: U16,
    index: U16,
    length: U16,
}

/// `bmRequestType` bits 5-6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// `bmRequestType` bits 0-4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
}

impl SetupPacket {
    /// Parse a SETUP payload; `None` unless it is exactly 8 bytes
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() != SETUP_LEN {
            return None;
        }
        Self::read_from_bytes(payload).ok()
    }

    pub fn new(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type,
            request,
            value: U16::new(value),
            index: U16::new(index),
            length: U16::new(length),
        }
    }

    pub fn value(&self) -> u16 {
        self.value.get()
    }

    pub fn index(&self) -> u16 {
        self.index.get()
    }

    /// `wLength`: number of bytes in the data stage
    pub fn length(&self) -> u16 {
        self.length.get()
    }

    pub fn direction(&self) -> Direction {
        Direction::from_address_bit(self.request_type)
    }

    pub fn kind(&self) -> RequestKind {
        match (self.request_type >> 5) & 0x03 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.request_type & 0x1f {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            _ => Recipient::Other,
        }
    }

    pub fn is_standard(&self) -> bool {
        self.kind() == RequestKind::Standard
    }

    /// Descriptor type requested by GET_DESCRIPTOR
    pub fn descriptor_type(&self) -> Option<u8> {
        (self.is_standard() && self.request == request::GET_DESCRIPTOR)
            .then(|| (self.value() >> 8) as u8)
    }

    /// GET_DESCRIPTOR(DEVICE) long enough to reach `bMaxPacketSize0`
    pub fn is_get_device_descriptor(&self) -> bool {
        self.request_type == 0x80
            && self.descriptor_type() == Some(descriptor::DEVICE)
            && usize::from(self.length()) > DEVICE_DESCRIPTOR_MPS_OFFSET
    }

    /// New device address carried by SET_ADDRESS
    pub fn set_address(&self) -> Option<u8> {
        (self.request_type == 0x00 && self.request == request::SET_ADDRESS)
            .then(|| (self.value() & 0x7f) as u8)
    }

    pub fn to_bytes(&self) -> [u8; SETUP_LEN] {
        let mut out = [0u8; SETUP_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

impl Serialize for SetupPacket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SetupPacket", 5)?;
        s.serialize_field("bmRequestType", &self.request_type)?;
        s.serialize_field("bRequest", &self.request)?;
        s.serialize_field("wValue", &self.value())?;
        s.serialize_field("wIndex", &self.index())?;
        s.serialize_field("wLength", &self.length())?;
        s.end()
    }
}

pub fn request_name(request: u8) -> &'static str {
    match request {
        request::GET_STATUS => "GET_STATUS",
        request::CLEAR_FEATURE => "CLEAR_FEATURE",
        request::SET_FEATURE => "SET_FEATURE",
        request::SET_ADDRESS => "SET_ADDRESS",
        request::GET_DESCRIPTOR => "GET_DESCRIPTOR",
        request::SET_DESCRIPTOR => "SET_DESCRIPTOR",
        request::GET_CONFIGURATION => "GET_CONFIGURATION",
        request::SET_CONFIGURATION => "SET_CONFIGURATION",
        request::GET_INTERFACE => "GET_INTERFACE",
        request::SET_INTERFACE => "SET_INTERFACE",
        request::SYNCH_FRAME => "SYNCH_FRAME",
        _ => "UNKNOWN",
    }
}

pub fn descriptor_name(kind: u8) -> &'static str {
    match kind {
        descriptor::DEVICE => "DEVICE",
        descriptor::CONFIGURATION => "CONFIGURATION",
        descriptor::STRING => "STRING",
        descriptor::INTERFACE => "INTERFACE",
        descriptor::ENDPOINT => "ENDPOINT",
        descriptor::DEVICE_QUALIFIER => "DEVICE_QUALIFIER",
        descriptor::OTHER_SPEED_CONFIGURATION => "OTHER_SPEED_CONFIGURATION",
        descriptor::INTERFACE_POWER => "INTERFACE_POWER",
        descriptor::BOS => "BOS",
        descriptor::HID => "HID",
        descriptor::HID_REPORT => "HID_REPORT",
        _ => "UNKNOWN",
    }
}
