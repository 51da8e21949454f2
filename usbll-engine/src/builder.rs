//! Wire-correct packet synthesis
//!
//! Builds link-layer packets with valid check nibbles and CRCs, for tests,
//! fixtures and demo captures.

use crate::crc::{crc16, crc5_11bit, crc5_19bit};
use crate::fields::SplitFields;
use crate::pid::{wire, Pid};
use crate::setup::SetupPacket;
use crate::state::SplitPhase;
use crate::types::{EndpointType, Frame, Speed};

fn with_crc5(pid: u8, bits: u16) -> Vec<u8> {
    let bits = bits & 0x07ff;
    let word = bits | (u16::from(crc5_11bit(bits)) << 11);
    let [lo, hi] = word.to_le_bytes();
    vec![pid, lo, hi]
}

/// SETUP, OUT, IN, PING or EXT token
pub fn token(pid: Pid, address: u8, endpoint: u8) -> Vec<u8> {
    with_crc5(
        pid.octet(),
        u16::from(address & 0x7f) | (u16::from(endpoint & 0x0f) << 7),
    )
}

pub fn sof(frame_number: u16) -> Vec<u8> {
    with_crc5(wire::SOF, frame_number)
}

/// DATA0/1/2/MDATA with CRC16
pub fn data(pid: Pid, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(payload.len() + 3);
    packet.push(pid.octet());
    packet.extend_from_slice(payload);
    packet.extend_from_slice(&crc16(payload).to_le_bytes());
    packet
}

/// DATA0 carrying a SETUP request
pub fn setup_data(setup: &SetupPacket) -> Vec<u8> {
    data(Pid::Data0, &setup.to_bytes())
}

/// ACK, NAK, STALL, NYET or PRE/ERR
pub fn handshake(pid: Pid) -> Vec<u8> {
    vec![pid.octet()]
}

/// SPLIT token. `s` is the speed bit (low speed) or, for isochronous, the start bit.
pub fn split(phase: SplitPhase, hub: u8, port: u8, s: bool, kind: EndpointType) -> Vec<u8> {
    let bits = SplitFields {
        hub: hub & 0x7f,
        phase,
        port: port & 0x7f,
        s,
        eu: false,
        kind,
        crc5: 0,
        crc_ok: true,
    }
    .raw();
    let word = bits | (u32::from(crc5_19bit(bits)) << 19);
    let bytes = word.to_le_bytes();
    vec![wire::SPLIT, bytes[0], bytes[1], bytes[2]]
}

/// LPM SubPID packet (send after an EXT token)
pub fn lpm(link_state: u8, besl: u8, remote_wake: bool) -> Vec<u8> {
    let bits = u16::from(link_state & 0x0f)
        | (u16::from(besl & 0x0f) << 4)
        | (u16::from(remote_wake) << 8);
    with_crc5(wire::SUBPID_LPM, bits)
}

/// Flip one bit of the trailing CRC so the packet fails validation
pub fn corrupt_crc(mut packet: Vec<u8>) -> Vec<u8> {
    if let Some(last) = packet.last_mut() {
        *last ^= 0x80;
    }
    packet
}

/// A numbered packet sequence, as a capture would deliver it
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    packets: Vec<Vec<u8>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, packet: Vec<u8>) -> Self {
        self.packets.push(packet);
        self
    }

    pub fn sof(self, frame_number: u16) -> Self {
        self.push(sof(frame_number))
    }

    pub fn token(self, pid: Pid, address: u8, endpoint: u8) -> Self {
        self.push(token(pid, address, endpoint))
    }

    pub fn data(self, pid: Pid, payload: &[u8]) -> Self {
        self.push(data(pid, payload))
    }

    pub fn setup(self, address: u8, endpoint: u8, setup: &SetupPacket) -> Self {
        self.token(Pid::Setup, address, endpoint).push(setup_data(setup))
    }

    pub fn handshake(self, pid: Pid) -> Self {
        self.push(handshake(pid))
    }

    pub fn split(self, phase: SplitPhase, hub: u8, port: u8, s: bool, kind: EndpointType) -> Self {
        self.push(split(phase, hub, port, s, kind))
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn packets(&self) -> &[Vec<u8>] {
        &self.packets
    }

    /// Frames numbered from 1
    pub fn frames(&self, speed: Option<Speed>) -> impl Iterator<Item = Frame<'_>> + '_ {
        self.packets
            .iter()
            .enumerate()
            .map(move |(i, p)| Frame::new(i as u32 + 1, speed, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{DataFields, TokenFields};

    #[test]
    fn test_known_token_bytes() {
        assert_eq!(token(Pid::Setup, 0, 0), vec![0x2d, 0x00, 0x10]);
        assert_eq!(token(Pid::Setup, 1, 0), vec![0x2d, 0x01, 0xe8]);
    }

    #[test]
    fn test_built_packets_validate() {
        let t = TokenFields::parse(&token(Pid::In, 42, 7)).unwrap();
        assert_eq!((t.address, t.endpoint, t.crc_ok), (42, 7, true));

        let good = data(Pid::Data1, &[1, 2, 3]);
        assert!(DataFields::parse(&good).unwrap().crc_ok);
        let bad = corrupt_crc(good.clone());
        assert!(!DataFields::parse(&bad).unwrap().crc_ok);

        let s = SplitFields::parse(&split(SplitPhase::Complete, 5, 3, true, EndpointType::Interrupt))
            .unwrap();
        assert_eq!(s.phase, SplitPhase::Complete);
        assert_eq!(s.kind, EndpointType::Interrupt);
        assert_eq!(s.speed(), Speed::Low);
        assert!(s.crc_ok);
    }

    #[test]
    fn test_sequence_numbers_frames() {
        let seq = Sequence::new().sof(1).token(Pid::In, 1, 1).handshake(Pid::Nak);
        let numbers: Vec<u32> = seq.frames(None).map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
