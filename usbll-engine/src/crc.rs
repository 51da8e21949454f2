//! USB link-layer checksums
//!
//! Both CRCs are computed over the field bits in wire order (LSB first) and
//! transmitted inverted.

/// CRC5 generator x^5 + x^2 + 1
const CRC5_POLY: u8 = 0x05;
/// CRC16 generator x^16 + x^15 + x^2 + 1, bit-reflected
const CRC16_POLY_REFLECTED: u16 = 0xA001;

/// CRC5 over the low `bits` bits of `input`, LSB first.
///
/// Returns the value as it appears in the packet's CRC5 field (i.e. already
/// inverted and in transmission bit order).
pub fn crc5(input: u32, bits: u32) -> u8 {
    let mut crc: u8 = 0x1f;
    for i in 0..bits {
        let bit = ((input >> i) & 1) as u8;
        let top = (crc >> 4) & 1;
        crc = (crc << 1) & 0x1f;
        if top ^ bit != 0 {
            crc ^= CRC5_POLY;
        }
    }
    // Remainder bit 4 is transmitted first, so the field holds it reversed.
    reverse5(!crc & 0x1f)
}

/// CRC5 of a token, SOF or LPM packet (11 data bits)
pub fn crc5_11bit(input: u16) -> u8 {
    crc5(u32::from(input & 0x07ff), 11)
}

/// CRC5 of a SPLIT packet (19 data bits)
pub fn crc5_19bit(input: u32) -> u8 {
    crc5(input & 0x0007_ffff, 19)
}

fn reverse5(v: u8) -> u8 {
    (0..5).fold(0u8, |acc, i| acc | (((v >> i) & 1) << (4 - i)))
}

/// CRC16 of a data payload as carried little-endian after the payload
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}
