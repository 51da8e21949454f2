//! USB 2.0 link-layer transaction and transfer reconstruction
//!
//! This crate turns a capture-ordered stream of raw link-layer packets (token,
//! data, handshake, SOF, SPLIT and LPM packets as seen on the wire) into:
//!
//! - a resolved protocol state for every packet (PID grammar, split transactions)
//! - per-packet fields, source/destination addresses and advisories
//! - reassembled transfers (URBs) handed to next-layer dissectors
//!
//! The entry point is [`Session::dissect`]. The engine does no I/O; reading capture
//! files is the front-end's job.

pub mod address;
pub mod builder;
pub mod crc;
pub mod endpoint;
pub mod error;
pub mod fields;
pub mod pid;
pub mod session;
pub mod setup;
pub mod state;
pub mod transaction;
pub mod transfer;
pub mod tt;
pub mod types;
pub mod urb;

pub use address::{Address, AddressPair};
pub use error::{Advisory, EngineError};
pub use fields::{Field, FieldValue};
pub use pid::{PacketId, Pid, SubPid};
pub use session::{Dissection, FrameRecord, Pass, Session, SessionConfig};
pub use setup::SetupPacket;
pub use state::{next_extended_state, next_state, split_state, SplitPhase, State};
pub use transaction::{Transaction, TransactionId};
pub use transfer::{FragmentTable, Reassembly, TransferFragment};
pub use types::{Direction, EndpointDescriptor, EndpointType, Frame, Speed};
pub use urb::{Urb, UrbDissector, UrbDissectors, UrbStatus};

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source of endpoint type and max packet size, normally filled from configuration
/// descriptors by a higher-level dissector
pub trait DescriptorStore {
    /// Descriptor of `endpoint_address` (`bEndpointAddress`, direction bit included)
    /// on device `address`
    fn endpoint(&self, address: u8, endpoint_address: u8) -> Option<EndpointDescriptor>;
}

/// Plain in-memory descriptor store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointDescriptors {
    endpoints: BTreeMap<(u8, u8), EndpointDescriptor>,
}

impl EndpointDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an endpoint, returning the descriptor it replaces
    pub fn insert(
        &mut self,
        address: u8,
        endpoint_address: u8,
        descriptor: EndpointDescriptor,
    ) -> Option<EndpointDescriptor> {
        self.endpoints
            .insert((address & 0x7f, endpoint_address & 0x8f), descriptor)
    }

    /// Forget every endpoint of a device
    pub fn remove_device(&mut self, address: u8) {
        self.endpoints.retain(|(a, _), _| *a != address & 0x7f);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u8, &EndpointDescriptor)> {
        self.endpoints.iter().map(|((a, e), d)| (*a, *e, d))
    }
}

impl DescriptorStore for EndpointDescriptors {
    fn endpoint(&self, address: u8, endpoint_address: u8) -> Option<EndpointDescriptor> {
        self.endpoints
            .get(&(address & 0x7f, endpoint_address & 0x8f))
            .copied()
    }
}

/// Shared store, so a learner can fill it while a session reads it
impl<T: DescriptorStore> DescriptorStore for Arc<RwLock<T>> {
    fn endpoint(&self, address: u8, endpoint_address: u8) -> Option<EndpointDescriptor> {
        self.read().endpoint(address, endpoint_address)
    }
}
