//! Transaction translator tracking
//!
//! A hub's transaction translator runs at most one split per (hub, port) and
//! scheduling class at a time, so remembering the latest start split per key is
//! enough to pair every complete split with its start.

use crate::transaction::TransactionId;
use crate::types::EndpointType;

const TABLE_SIZE: usize = 128 * 128;

/// Two 128x128 tables of start-split transactions, periodic and non-periodic
#[derive(Debug, Default)]
pub struct TransactionTranslators {
    periodic: Vec<Option<TransactionId>>,
    non_periodic: Vec<Option<TransactionId>>,
}

fn index(hub: u8, port: u8) -> usize {
    (usize::from(hub) & 0x7f) * 128 + (usize::from(port) & 0x7f)
}

impl TransactionTranslators {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, kind: EndpointType) -> &mut Vec<Option<TransactionId>> {
        let table = if kind.is_periodic() {
            &mut self.periodic
        } else {
            &mut self.non_periodic
        };
        if table.is_empty() {
            *table = vec![None; TABLE_SIZE];
        }
        table
    }

    /// Remember a start split, replacing whatever the key held
    pub fn store(&mut self, hub: u8, port: u8, kind: EndpointType, transaction: TransactionId) {
        self.table_mut(kind)[index(hub, port)] = Some(transaction);
    }

    /// Start split matching a complete split. The entry stays in place.
    pub fn restore(&self, hub: u8, port: u8, kind: EndpointType) -> Option<TransactionId> {
        let table = if kind.is_periodic() {
            &self.periodic
        } else {
            &self.non_periodic
        };
        table.get(index(hub, port)).copied().flatten()
    }

    pub fn clear(&mut self) {
        self.periodic.clear();
        self.non_periodic.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::Pid;
    use crate::transaction::{Transaction, TransactionArena};
    use crate::types::Speed;

    #[test]
    fn test_store_restore_round_trip() {
        let mut arena = TransactionArena::default();
        let mut tt = TransactionTranslators::new();
        let id = arena.push(Transaction::new(1, Pid::Split, 5, 3, Speed::Full));

        assert_eq!(tt.restore(5, 3, EndpointType::Control), None);
        tt.store(5, 3, EndpointType::Control, id);
        assert_eq!(tt.restore(5, 3, EndpointType::Control), Some(id));
        assert_eq!(tt.restore(5, 3, EndpointType::Bulk), Some(id));
        // Restore does not consume
        assert_eq!(tt.restore(5, 3, EndpointType::Control), Some(id));
    }

    #[test]
    fn test_periodic_tables_are_independent() {
        let mut arena = TransactionArena::default();
        let mut tt = TransactionTranslators::new();
        let bulk = arena.push(Transaction::new(1, Pid::Split, 5, 3, Speed::Full));
        let int = arena.push(Transaction::new(2, Pid::Split, 5, 3, Speed::Low));

        tt.store(5, 3, EndpointType::Bulk, bulk);
        tt.store(5, 3, EndpointType::Interrupt, int);
        assert_eq!(tt.restore(5, 3, EndpointType::Control), Some(bulk));
        assert_eq!(tt.restore(5, 3, EndpointType::Isochronous), Some(int));
        assert_eq!(tt.restore(5, 4, EndpointType::Isochronous), None);
    }

    #[test]
    fn test_store_overwrites() {
        let mut arena = TransactionArena::default();
        let mut tt = TransactionTranslators::new();
        let first = arena.push(Transaction::new(1, Pid::Split, 1, 1, Speed::Full));
        let second = arena.push(Transaction::new(9, Pid::Split, 1, 1, Speed::Full));
        tt.store(1, 1, EndpointType::Bulk, first);
        tt.store(1, 1, EndpointType::Bulk, second);
        assert_eq!(tt.restore(1, 1, EndpointType::Bulk), Some(second));
    }
}
