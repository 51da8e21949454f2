//! Per-endpoint-direction bookkeeping
//!
//! One [`EndpointInfo`] per (device address, endpoint number, direction), created on
//! first use. Endpoint type and max packet size come from the descriptor store for
//! non-default endpoints; endpoint 0 is always a control pipe whose max packet size
//! is learned from the device descriptor.

use tracing::debug;

use crate::pid::Pid;
use crate::setup::SetupPacket;
use crate::types::{Direction, EndpointDescriptor, EndpointType};
use crate::DescriptorStore;

pub const MAX_ADDRESSES: usize = 128;
pub const MAX_ENDPOINTS: usize = 16;

/// Data chunk most recently sent on an endpoint, kept to handle retransmissions
/// and handshakes that reject it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastChunk {
    pub pid: Pid,
    /// Transfer key before this chunk was accounted for
    pub previous_key: u32,
    /// Requested length before this chunk was accounted for
    pub previous_requested: u32,
    /// Fragment key the chunk was emitted under
    pub key: u32,
    pub offset: u32,
    pub length: u32,
    pub more: bool,
    /// Handshake seen that accepted it
    pub acked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointInfo {
    pub kind: EndpointType,
    /// 0 while unknown
    pub max_packet_size: u16,
    pub last_chunk: Option<LastChunk>,
    /// Frame number of the packet that started the transfer in progress, 0 when idle
    pub active_transfer_key: u32,
    /// Bytes accounted for in the transfer in progress
    pub transfer_offset: u32,
    /// Total the transfer is expected to reach, 0 when unknown
    pub requested_transfer_length: u32,
    /// SETUP of the control transfer in progress
    pub setup: Option<SetupPacket>,
    /// Take `bMaxPacketSize0` from the next response chunk covering it
    pub probe_max_packet_size: bool,
}

impl EndpointInfo {
    fn new(kind: EndpointType, max_packet_size: u16) -> Self {
        Self {
            kind,
            max_packet_size,
            ..Default::default()
        }
    }

    /// Forget the transfer in progress, keeping type and max packet size
    pub fn reset_transfer(&mut self) {
        *self = Self::new(self.kind, self.max_packet_size);
    }

    /// Data seen since the last handshake that has not been accepted yet
    pub fn awaiting_handshake(&self) -> bool {
        self.last_chunk.is_some_and(|c| !c.acked)
    }

    pub fn in_transfer(&self) -> bool {
        self.active_transfer_key != 0
    }
}

/// Arena of endpoint records for one capture session
#[derive(Debug, Default)]
pub struct EndpointTable {
    records: Vec<Option<EndpointInfo>>,
}

fn slot(address: u8, endpoint: u8, direction: Direction) -> usize {
    ((usize::from(address) & 0x7f) * MAX_ENDPOINTS + (usize::from(endpoint) & 0x0f)) * 2
        + direction.index()
}

/// USB endpoint address byte (`bEndpointAddress`) for an endpoint number and direction
pub fn endpoint_address(endpoint: u8, direction: Direction) -> u8 {
    match direction {
        Direction::In => 0x80 | (endpoint & 0x0f),
        Direction::Out => endpoint & 0x0f,
    }
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_allocated(&mut self) {
        if self.records.is_empty() {
            self.records = vec![None; MAX_ADDRESSES * MAX_ENDPOINTS * 2];
        }
    }

    /// Record for an endpoint direction, created on first access.
    ///
    /// For endpoints other than 0 the descriptor store is consulted on every access;
    /// when it reports a type or max packet size different from the record's, the
    /// record adopts it and drops its transfer bookkeeping.
    pub fn get_mut(
        &mut self,
        address: u8,
        endpoint: u8,
        direction: Direction,
        store: &dyn DescriptorStore,
    ) -> &mut EndpointInfo {
        self.ensure_allocated();
        let descriptor = if endpoint & 0x0f == 0 {
            None
        } else {
            store.endpoint(address, endpoint_address(endpoint, direction))
        };

        let record = self.records[slot(address, endpoint, direction)].get_or_insert_with(|| {
            if endpoint & 0x0f == 0 {
                EndpointInfo::new(EndpointType::Control, 0)
            } else {
                EndpointInfo::default()
            }
        });

        if let Some(EndpointDescriptor {
            kind,
            max_packet_size,
        }) = descriptor
        {
            if record.kind != kind || record.max_packet_size != max_packet_size {
                debug!(
                    "Endpoint {}.{} {:?} is now {} with max packet size {}",
                    address, endpoint, direction, kind, max_packet_size
                );
                *record = EndpointInfo::new(kind, max_packet_size);
            }
        }
        record
    }

    /// Read-only view without creating anything
    pub fn get(&self, address: u8, endpoint: u8, direction: Direction) -> Option<&EndpointInfo> {
        self.records
            .get(slot(address, endpoint, direction))
            .and_then(Option::as_ref)
    }

    /// Drop every record of `address` (device got a new address assigned). Endpoint 0
    /// restarts as a control pipe with `max_packet_size0`.
    pub fn reset_address(&mut self, address: u8, max_packet_size0: u16) {
        self.ensure_allocated();
        for endpoint in 0..MAX_ENDPOINTS as u8 {
            for direction in [Direction::Out, Direction::In] {
                self.records[slot(address, endpoint, direction)] = None;
            }
        }
        for direction in [Direction::Out, Direction::In] {
            self.records[slot(address, 0, direction)] =
                Some(EndpointInfo::new(EndpointType::Control, max_packet_size0));
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EndpointDescriptors;

    #[test]
    fn test_lazy_default_records() {
        let mut table = EndpointTable::new();
        let store = EndpointDescriptors::default();
        assert!(table.get(3, 0, Direction::In).is_none());

        let ep0 = table.get_mut(3, 0, Direction::In, &store);
        assert_eq!(ep0.kind, EndpointType::Control);
        assert_eq!(ep0.max_packet_size, 0);

        let ep1 = table.get_mut(3, 1, Direction::In, &store);
        assert_eq!(ep1.kind, EndpointType::Unknown);
    }

    #[test]
    fn test_descriptor_change_resets_bookkeeping() {
        let mut table = EndpointTable::new();
        let mut store = EndpointDescriptors::default();

        let rec = table.get_mut(2, 1, Direction::In, &store);
        rec.active_transfer_key = 10;
        rec.transfer_offset = 64;

        store.insert(
            2,
            0x81,
            EndpointDescriptor {
                kind: EndpointType::Bulk,
                max_packet_size: 64,
            },
        );
        let rec = table.get_mut(2, 1, Direction::In, &store);
        assert_eq!(rec.kind, EndpointType::Bulk);
        assert_eq!(rec.max_packet_size, 64);
        assert_eq!(rec.active_transfer_key, 0);
        assert_eq!(rec.transfer_offset, 0);

        // Unchanged descriptor keeps state
        rec.transfer_offset = 128;
        assert_eq!(table.get_mut(2, 1, Direction::In, &store).transfer_offset, 128);

        // The OUT direction is looked up with its own endpoint address
        assert_eq!(
            table.get_mut(2, 1, Direction::Out, &store).kind,
            EndpointType::Unknown
        );
    }

    #[test]
    fn test_endpoint_zero_ignores_store() {
        let mut table = EndpointTable::new();
        let mut store = EndpointDescriptors::default();
        store.insert(
            4,
            0x80,
            EndpointDescriptor {
                kind: EndpointType::Bulk,
                max_packet_size: 512,
            },
        );
        let rec = table.get_mut(4, 0, Direction::In, &store);
        assert_eq!(rec.kind, EndpointType::Control);
        assert_eq!(rec.max_packet_size, 0);
    }

    #[test]
    fn test_reset_address_keeps_ep0_max_packet_size() {
        let mut table = EndpointTable::new();
        let store = EndpointDescriptors::default();
        table.get_mut(7, 2, Direction::Out, &store).transfer_offset = 5;
        table.reset_address(7, 64);

        assert!(table.get(7, 2, Direction::Out).is_none());
        assert_eq!(table.get(7, 0, Direction::Out).unwrap().max_packet_size, 64);
        assert_eq!(table.get(7, 0, Direction::In).unwrap().max_packet_size, 64);
    }
}
