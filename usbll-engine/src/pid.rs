//! Packet ID classification
//!
//! Every link-layer packet starts with an octet carrying a 4-bit PID in the low
//! nibble and its one's complement in the high nibble. After an EXT token the
//! next packet's first octet is a SubPID with the same encoding.

use serde::Serialize;
use std::fmt;

use crate::state::State;

/// On-the-wire PID octets
pub mod wire {
    pub const OUT: u8 = 0xE1;
    pub const IN: u8 = 0x69;
    pub const SOF: u8 = 0xA5;
    pub const SETUP: u8 = 0x2D;
    pub const DATA0: u8 = 0xC3;
    pub const DATA1: u8 = 0x4B;
    pub const DATA2: u8 = 0x87;
    pub const MDATA: u8 = 0x0F;
    pub const ACK: u8 = 0xD2;
    pub const NAK: u8 = 0x5A;
    pub const STALL: u8 = 0x1E;
    pub const NYET: u8 = 0x96;
    pub const PRE_ERR: u8 = 0x3C;
    pub const SPLIT: u8 = 0x78;
    pub const PING: u8 = 0xB4;
    pub const EXT: u8 = 0xF0;

    /// Link Power Management SubPID (USB 2.0 LPM addendum)
    pub const SUBPID_LPM: u8 = 0xC3;
}

/// Standard packet identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Pid {
    Out,
    In,
    Sof,
    Setup,
    Data0,
    Data1,
    Data2,
    Mdata,
    Ack,
    Nak,
    Stall,
    Nyet,
    /// PRE on full/low speed, ERR during high-speed split transactions
    PreErr,
    Split,
    Ping,
    /// Extended token (USB 2.0 LPM addendum), reserved in USB 2.0 proper
    Ext,
}

impl Pid {
    /// Every PID
    pub const ALL: [Pid; 16] = [
        Pid::Out,
        Pid::In,
        Pid::Sof,
        Pid::Setup,
        Pid::Data0,
        Pid::Data1,
        Pid::Data2,
        Pid::Mdata,
        Pid::Ack,
        Pid::Nak,
        Pid::Stall,
        Pid::Nyet,
        Pid::PreErr,
        Pid::Split,
        Pid::Ping,
        Pid::Ext,
    ];

    /// Map a 4-bit PID value to its symbol. Total over all 16 values.
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0f {
            0x1 => Pid::Out,
            0x9 => Pid::In,
            0x5 => Pid::Sof,
            0xD => Pid::Setup,
            0x3 => Pid::Data0,
            0xB => Pid::Data1,
            0x7 => Pid::Data2,
            0xF => Pid::Mdata,
            0x2 => Pid::Ack,
            0xA => Pid::Nak,
            0xE => Pid::Stall,
            0x6 => Pid::Nyet,
            0xC => Pid::PreErr,
            0x8 => Pid::Split,
            0x4 => Pid::Ping,
            _ => Pid::Ext,
        }
    }

    pub fn nibble(&self) -> u8 {
        match self {
            Pid::Out => 0x1,
            Pid::In => 0x9,
            Pid::Sof => 0x5,
            Pid::Setup => 0xD,
            Pid::Data0 => 0x3,
            Pid::Data1 => 0xB,
            Pid::Data2 => 0x7,
            Pid::Mdata => 0xF,
            Pid::Ack => 0x2,
            Pid::Nak => 0xA,
            Pid::Stall => 0xE,
            Pid::Nyet => 0x6,
            Pid::PreErr => 0xC,
            Pid::Split => 0x8,
            Pid::Ping => 0x4,
            Pid::Ext => 0x0,
        }
    }

    /// The full octet as transmitted, check nibble included
    pub fn octet(&self) -> u8 {
        encode_octet(self.nibble())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pid::Out => "OUT",
            Pid::In => "IN",
            Pid::Sof => "SOF",
            Pid::Setup => "SETUP",
            Pid::Data0 => "DATA0",
            Pid::Data1 => "DATA1",
            Pid::Data2 => "DATA2",
            Pid::Mdata => "MDATA",
            Pid::Ack => "ACK",
            Pid::Nak => "NAK",
            Pid::Stall => "STALL",
            Pid::Nyet => "NYET",
            Pid::PreErr => "PRE/ERR",
            Pid::Split => "SPLIT",
            Pid::Ping => "PING",
            Pid::Ext => "EXT",
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Second-level identifier following an EXT token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubPid {
    /// Link Power Management transaction
    Lpm,
    /// Shares its bit pattern with an address token and must never be assigned
    NotReusable(Pid),
    /// Not assigned yet (raw 4-bit value)
    Reserved(u8),
}

impl SubPid {
    pub fn from_nibble(nibble: u8) -> Self {
        let nibble = nibble & 0x0f;
        match Pid::from_nibble(nibble) {
            Pid::Data0 => SubPid::Lpm,
            pid @ (Pid::Out | Pid::In | Pid::Sof | Pid::Setup) => SubPid::NotReusable(pid),
            _ => SubPid::Reserved(nibble),
        }
    }

    pub fn name(&self) -> String {
        match self {
            SubPid::Lpm => "LPM".to_string(),
            SubPid::NotReusable(pid) => format!("Not reusable ({})", pid),
            SubPid::Reserved(n) => format!("Reserved (0x{:x})", n),
        }
    }
}

/// Result of classifying the first octet of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PacketId {
    Pid(Pid),
    SubPid(SubPid),
    /// Check nibble does not match; carries the raw octet
    Malformed(u8),
    /// Check nibble does not match while a SubPID was expected
    MalformedSubPid(u8),
}

impl PacketId {
    pub fn pid(&self) -> Option<Pid> {
        match self {
            PacketId::Pid(pid) => Some(*pid),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, PacketId::Malformed(_) | PacketId::MalformedSubPid(_))
    }

    pub fn name(&self) -> String {
        match self {
            PacketId::Pid(pid) => pid.name().to_string(),
            PacketId::SubPid(sub) => sub.name(),
            PacketId::Malformed(b) => format!("Invalid (0x{:02x})", b),
            PacketId::MalformedSubPid(b) => format!("Invalid SubPID (0x{:02x})", b),
        }
    }
}

/// Build a PID octet from its 4-bit value
pub fn encode_octet(nibble: u8) -> u8 {
    let nibble = nibble & 0x0f;
    nibble | ((!nibble & 0x0f) << 4)
}

/// Whether the high nibble is the complement of the low nibble
pub fn check_nibble_valid(octet: u8) -> bool {
    (octet >> 4) == (!octet & 0x0f)
}

/// Classify the first octet of a packet.
///
/// The previous packet's state decides whether the octet is a standard PID or
/// a SubPID: only the packet right after an EXT token carries a SubPID.
pub fn classify(octet: u8, previous: State) -> PacketId {
    let extended = previous.expects_subpid();
    if !check_nibble_valid(octet) {
        return if extended {
            PacketId::MalformedSubPid(octet)
        } else {
            PacketId::Malformed(octet)
        };
    }
    if extended {
        PacketId::SubPid(SubPid::from_nibble(octet))
    } else {
        PacketId::Pid(Pid::from_nibble(octet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_octets() {
        assert_eq!(Pid::Out.octet(), wire::OUT);
        assert_eq!(Pid::In.octet(), wire::IN);
        assert_eq!(Pid::Sof.octet(), wire::SOF);
        assert_eq!(Pid::Setup.octet(), wire::SETUP);
        assert_eq!(Pid::Data0.octet(), wire::DATA0);
        assert_eq!(Pid::Data1.octet(), wire::DATA1);
        assert_eq!(Pid::Data2.octet(), wire::DATA2);
        assert_eq!(Pid::Mdata.octet(), wire::MDATA);
        assert_eq!(Pid::Ack.octet(), wire::ACK);
        assert_eq!(Pid::Nak.octet(), wire::NAK);
        assert_eq!(Pid::Stall.octet(), wire::STALL);
        assert_eq!(Pid::Nyet.octet(), wire::NYET);
        assert_eq!(Pid::PreErr.octet(), wire::PRE_ERR);
        assert_eq!(Pid::Split.octet(), wire::SPLIT);
        assert_eq!(Pid::Ping.octet(), wire::PING);
        assert_eq!(Pid::Ext.octet(), wire::EXT);
    }

    #[test]
    fn test_nibble_mapping_is_bijective() {
        for pid in Pid::ALL {
            assert_eq!(Pid::from_nibble(pid.nibble()), pid);
            assert!(check_nibble_valid(pid.octet()));
        }
    }

    #[test]
    fn test_classify_rejects_bad_check_nibble() {
        assert_eq!(classify(0xE2, State::Idle), PacketId::Malformed(0xE2));
        assert_eq!(classify(0x00, State::Ext), PacketId::MalformedSubPid(0x00));
    }

    #[test]
    fn test_classify_subpid_after_ext() {
        assert_eq!(
            classify(wire::SUBPID_LPM, State::Ext),
            PacketId::SubPid(SubPid::Lpm)
        );
        assert_eq!(
            classify(wire::SETUP, State::Ext),
            PacketId::SubPid(SubPid::NotReusable(Pid::Setup))
        );
        assert_eq!(
            classify(wire::ACK, State::Ext),
            PacketId::SubPid(SubPid::Reserved(0x2))
        );
        // Same octet outside extended mode is a plain DATA0
        assert_eq!(classify(wire::DATA0, State::Idle), PacketId::Pid(Pid::Data0));
    }
}
