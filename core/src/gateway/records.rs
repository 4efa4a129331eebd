//! Order-record table: maps a system order ID back to the client order it
//! came from (spec §4.13 "State: ... `OrderRecord` table").

use crate::alloc::{AllocFlags, HugePageArray};
use crate::ids::{BookOrderId, SystemOrderId};
use crate::wire::messages::Ticker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderRecord {
    pub external_id: u64,
    pub system_id: SystemOrderId,
    pub book_id: BookOrderId,
    pub client_id: u64,
    pub ticker: Ticker,
}

impl Default for OrderRecord {
    fn default() -> Self {
        OrderRecord {
            external_id: 0,
            system_id: SystemOrderId::INVALID,
            book_id: BookOrderId::INVALID,
            client_id: 0,
            ticker: [0; 4],
        }
    }
}

/// Huge-page backed, indexed by `system_id.index()`. One entry per slot in
/// the gateway's system-ID pool.
pub struct OrderRecordTable {
    records: HugePageArray<OrderRecord>,
}

impl OrderRecordTable {
    pub fn new(flags: AllocFlags) -> crate::error::CoreResult<Self> {
        Ok(OrderRecordTable {
            records: HugePageArray::new(SystemOrderId::CAPACITY, flags)?,
        })
    }

    pub fn get(&self, system_id: SystemOrderId) -> Option<&OrderRecord> {
        self.records.get(system_id.index() as usize)
    }

    pub fn insert(&mut self, system_id: SystemOrderId, record: OrderRecord) {
        if let Some(slot) = self.records.get_mut(system_id.index() as usize) {
            *slot = record;
        }
    }

    pub fn set_book_id(&mut self, system_id: SystemOrderId, book_id: BookOrderId) {
        if let Some(slot) = self.records.get_mut(system_id.index() as usize) {
            slot.book_id = book_id;
        }
    }

    /// Zeroes the record (spec §4.13 "zero the record and release the
    /// system ID" on terminal status). The caller still owns releasing the
    /// ID back to the pool.
    pub fn clear(&mut self, system_id: SystemOrderId) {
        if let Some(slot) = self.records.get_mut(system_id.index() as usize) {
            *slot = OrderRecord::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let mut table = OrderRecordTable::new(AllocFlags::default()).unwrap();
        let system_id = SystemOrderId::new(3, 1);
        table.insert(
            system_id,
            OrderRecord {
                external_id: 77,
                system_id,
                book_id: BookOrderId::INVALID,
                client_id: 9,
                ticker: *b"GOOG",
            },
        );
        let record = table.get(system_id).unwrap();
        assert_eq!(record.external_id, 77);
        assert_eq!(record.client_id, 9);
    }

    #[test]
    fn clear_resets_to_default() {
        let mut table = OrderRecordTable::new(AllocFlags::default()).unwrap();
        let system_id = SystemOrderId::new(1, 1);
        table.insert(
            system_id,
            OrderRecord {
                external_id: 1,
                system_id,
                book_id: BookOrderId::INVALID,
                client_id: 1,
                ticker: *b"GOOG",
            },
        );
        table.clear(system_id);
        assert_eq!(*table.get(system_id).unwrap(), OrderRecord::default());
    }
}
