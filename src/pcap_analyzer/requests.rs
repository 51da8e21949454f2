//! Standard control request decoder
//!
//! Names chapter 9 requests and decodes the descriptors most captures are full of
//! (device and string descriptors). Class and vendor requests are left to the
//! hex fallback.

use usbll_engine::setup::{descriptor, descriptor_name, request, request_name};
use usbll_engine::{SetupPacket, Urb, UrbDissector};

/// Summaries for standard requests on the default control pipe
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardRequests;

impl UrbDissector for StandardRequests {
    fn name(&self) -> &'static str {
        "standard-requests"
    }

    fn accepts(&self, urb: &Urb) -> bool {
        urb.setup.is_some_and(|setup| setup.is_standard())
    }

    fn dissect(&self, urb: &Urb) -> String {
        let Some(setup) = urb.setup else {
            return String::new();
        };
        let request = describe_request(&setup);

        // Status stage runs opposite to the request direction
        if urb.direction != setup.direction() {
            return format!("{} status", request);
        }

        let payload = urb.payload();
        match decode_response(&setup, payload) {
            Some(decoded) => format!("{}: {}", request, decoded),
            None => request,
        }
    }
}

/// `GET_DESCRIPTOR(STRING #2, lang 0x0409) len 255` and friends
pub fn describe_request(setup: &SetupPacket) -> String {
    let name = request_name(setup.request);
    match setup.request {
        request::GET_DESCRIPTOR | request::SET_DESCRIPTOR => {
            let kind = (setup.value() >> 8) as u8;
            let index = setup.value() & 0xff;
            let mut args = descriptor_name(kind).to_string();
            if index != 0 || kind == descriptor::STRING {
                args.push_str(&format!(" #{}", index));
            }
            if kind == descriptor::STRING && index != 0 {
                args.push_str(&format!(", lang 0x{:04x}", setup.index()));
            }
            format!("{}({}) len {}", name, args, setup.length())
        }
        request::SET_ADDRESS => format!("{} {}", name, setup.value() & 0x7f),
        request::SET_CONFIGURATION => format!("{} {}", name, setup.value() & 0xff),
        request::SET_INTERFACE => format!(
            "{} interface {} alt {}",
            name,
            setup.index(),
            setup.value()
        ),
        request::CLEAR_FEATURE | request::SET_FEATURE => {
            format!("{} {} index {}", name, setup.value(), setup.index())
        }
        _ => name.to_string(),
    }
}

fn decode_response(setup: &SetupPacket, data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    match setup.request {
        request::GET_DESCRIPTOR => match setup.descriptor_type()? {
            descriptor::DEVICE => decode_device_descriptor(data),
            descriptor::STRING if setup.value() & 0xff == 0 => decode_language_ids(data),
            descriptor::STRING => decode_usb_string(data).map(|s| format!("\"{}\"", s)),
            _ => None,
        },
        request::GET_CONFIGURATION => Some(format!("configuration {}", data[0])),
        request::GET_STATUS if data.len() >= 2 => {
            Some(format!("status 0x{:04x}", u16::from_le_bytes([data[0], data[1]])))
        }
        _ => None,
    }
}

/// Device descriptor fields worth a glance; tolerates the 8-byte first request
fn decode_device_descriptor(data: &[u8]) -> Option<String> {
    if data.len() < 8 || data[1] != descriptor::DEVICE {
        return None;
    }
    let bcd_usb = u16::from_le_bytes([data[2], data[3]]);
    let mut text = format!(
        "USB {:x}.{:02x}, class 0x{:02x}, mps0 {}",
        bcd_usb >> 8,
        bcd_usb & 0xff,
        data[4],
        data[7]
    );
    if data.len() >= 12 {
        let vid = u16::from_le_bytes([data[8], data[9]]);
        let pid = u16::from_le_bytes([data[10], data[11]]);
        text.push_str(&format!(", {:04x}:{:04x}", vid, pid));
    }
    if data.len() >= 18 {
        text.push_str(&format!(", {} configuration(s)", data[17]));
    }
    Some(text)
}

/// String descriptor zero: supported LANGIDs
fn decode_language_ids(data: &[u8]) -> Option<String> {
    if data.len() < 2 || data[1] != descriptor::STRING {
        return None;
    }
    let end = usize::from(data[0]).min(data.len());
    let ids: Vec<String> = data[2..end]
        .chunks_exact(2)
        .map(|pair| format!("0x{:04x}", u16::from_le_bytes([pair[0], pair[1]])))
        .collect();
    Some(format!("languages [{}]", ids.join(", ")))
}

/// Decode a USB string descriptor (UTF-16LE)
pub fn decode_usb_string(data: &[u8]) -> Option<String> {
    if data.len() < 2 {
        return None;
    }

    // Byte 0: bLength (total length including header)
    // Byte 1: bDescriptorType (0x03 for STRING)
    // Bytes 2+: UTF-16LE
    let b_length = data[0] as usize;
    if data[1] != descriptor::STRING || b_length < 2 {
        return None;
    }

    // A response cut short by wLength still holds a usable prefix
    let string_data = &data[2..b_length.min(data.len())];
    decode_utf16le(string_data)
}

/// Decode UTF-16LE bytes to String, dropping a trailing odd byte
fn decode_utf16le(data: &[u8]) -> Option<String> {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    Some(text.trim_end_matches('\0').to_string())
}
