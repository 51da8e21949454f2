//! Source and destination of each packet

use serde::Serialize;
use std::fmt;

use crate::state::{Origin, State};
use crate::transaction::{TransactionArena, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Address {
    Host,
    Device { address: u8, endpoint: u8 },
    HubPort { hub: u8, port: u8 },
}

impl Address {
    /// Device address, for hub ports the hub's
    pub fn device(&self) -> Option<u8> {
        match self {
            Address::Host => None,
            Address::Device { address, .. } => Some(*address),
            Address::HubPort { hub, .. } => Some(*hub),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Host => f.write_str("host"),
            Address::Device { address, endpoint } => write!(f, "{}.{}", address, endpoint),
            Address::HubPort { hub, port } => write!(f, "{}:{}", hub, port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressPair {
    pub source: Address,
    pub destination: Address,
}

/// Address pair of a packet from its resolved state and transaction
pub fn derive(
    state: State,
    transaction: Option<TransactionId>,
    transactions: &TransactionArena,
) -> Option<AddressPair> {
    let origin = state.origin()?;
    let transaction = transactions.get(transaction?)?;

    let remote = if state.is_split_packet() {
        Address::HubPort {
            hub: transaction.address,
            port: transaction.endpoint,
        }
    } else if origin == Origin::Hub {
        transaction
            .split_complete
            .or(transaction.split_start)
            .and_then(|id| transactions.get(id))
            .map(|split| Address::HubPort {
                hub: split.address,
                port: split.endpoint,
            })
            .unwrap_or(Address::Device {
                address: transaction.address,
                endpoint: transaction.endpoint,
            })
    } else {
        Address::Device {
            address: transaction.address,
            endpoint: transaction.endpoint,
        }
    };

    Some(match origin {
        Origin::Host => AddressPair {
            source: Address::Host,
            destination: remote,
        },
        Origin::Device | Origin::Hub => AddressPair {
            source: remote,
            destination: Address::Host,
        },
    })
}
