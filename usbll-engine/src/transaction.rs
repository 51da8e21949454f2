//! Bus transactions and their arena

use serde::Serialize;
use std::fmt;

use crate::pid::Pid;
use crate::types::Speed;

/// Index of a [`Transaction`] in the session's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TransactionId(u32);

impl TransactionId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One token-initiated transaction (or one half of a split)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Frame number of the token (or SPLIT) that opened it
    pub starting_frame: u32,
    pub pid: Pid,
    /// Device address, or hub address for SPLIT transactions
    pub address: u8,
    /// Endpoint number, or hub port for SPLIT transactions
    pub endpoint: u8,
    pub speed: Speed,
    /// Start split this transaction belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_start: Option<TransactionId>,
    /// Complete split this transaction belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_complete: Option<TransactionId>,
}

impl Transaction {
    pub fn new(starting_frame: u32, pid: Pid, address: u8, endpoint: u8, speed: Speed) -> Self {
        Self {
            starting_frame,
            pid,
            address,
            endpoint,
            speed,
            split_start: None,
            split_complete: None,
        }
    }

    pub fn is_split(&self) -> bool {
        self.pid == Pid::Split
    }
}

/// Append-only storage for the transactions of one capture
#[derive(Debug, Default)]
pub struct TransactionArena {
    transactions: Vec<Transaction>,
}

impl TransactionArena {
    pub fn push(&mut self, transaction: Transaction) -> TransactionId {
        let id = TransactionId(self.transactions.len() as u32);
        self.transactions.push(transaction);
        id
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(id.index())
    }

    pub fn get_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        self.transactions.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }
}
