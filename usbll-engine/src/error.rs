//! Engine error and advisory types

use serde::Serialize;
use thiserror::Error;

use crate::pid::Pid;
use crate::state::State;

/// Misuse of the session API. Protocol anomalies are never errors, see [`Advisory`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Frame {frame} delivered out of capture order (last analysed frame is {last})")]
    OutOfOrder { frame: u32, last: u32 },

    #[error("Frame {frame} has not been analysed in a first pass")]
    FrameNotAnalyzed { frame: u32 },

    #[error("Frame numbers start at 1")]
    ZeroFrameNumber,
}

/// Non-fatal per-frame anomaly
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    #[error("Malformed PID 0x{octet:02x}")]
    MalformedPid { octet: u8 },

    #[error("Malformed SubPID 0x{octet:02x}")]
    MalformedSubPid { octet: u8 },

    /// SubPID shares its pattern with an address token
    #[error("SubPID 0x{octet:02x} conflicts with a token PID and must not be used")]
    ConflictingSubPid { octet: u8 },

    #[error("Reserved SubPID 0x{octet:02x}")]
    ReservedSubPid { octet: u8 },

    #[error("Invalid PID sequence: {pid} after {previous}")]
    InvalidSequence { previous: State, pid: Pid },

    #[error("CRC5 mismatch: field 0x{actual:02x}, computed 0x{expected:02x}")]
    Crc5Mismatch { expected: u8, actual: u8 },

    #[error("CRC16 mismatch: field 0x{actual:04x}, computed 0x{expected:04x}")]
    Crc16Mismatch { expected: u16, actual: u16 },

    #[error("Malformed SETUP payload: {length} bytes, expected 8")]
    MalformedSetup { length: usize },

    #[error("Truncated packet: {actual} bytes, expected at least {expected}")]
    Truncated { expected: usize, actual: usize },

    #[error("{length} bytes of undecoded data")]
    UndecodedData { length: usize },
}

impl Advisory {
    pub fn is_checksum(&self) -> bool {
        matches!(self, Advisory::Crc5Mismatch { .. } | Advisory::Crc16Mismatch { .. })
    }

    /// Advisories that mean the packet's grammar could not be established
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Advisory::MalformedPid { .. } | Advisory::MalformedSubPid { .. } | Advisory::Truncated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_messages() {
        let a = Advisory::InvalidSequence {
            previous: State::Idle,
            pid: Pid::Ack,
        };
        assert_eq!(a.to_string(), "Invalid PID sequence: ACK after Idle");

        let a = Advisory::Crc16Mismatch {
            expected: 0x94dd,
            actual: 0x0000,
        };
        assert!(a.is_checksum());
        assert_eq!(a.to_string(), "CRC16 mismatch: field 0x0000, computed 0x94dd");
    }

    #[test]
    fn test_advisory_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Advisory::MalformedSetup { length: 7 }).unwrap();
        assert_eq!(json, r#"{"kind":"malformed_setup","length":7}"#);
    }

    #[test]
    fn test_engine_error_display() {
        let e = EngineError::OutOfOrder { frame: 3, last: 5 };
        assert!(e.to_string().contains("out of capture order"));
    }
}
