//! Ack set - ids of messages confirmed as personally received
//!
//! Grows by union only. The stored value is local bookkeeping (when the ack
//! was first recorded) and is never exported.

use redb::{ReadOnlyTable, ReadableTable, TableDefinition};

use super::{Storage, UnitOfWork};
use crate::error::StoreResult;
use crate::types::{now_secs, MessageId};

/// Table for acks (key: message id, value: unix seconds first recorded)
pub(crate) const ACKS_TABLE: TableDefinition<u64, i64> = TableDefinition::new("acks");

pub(super) fn read_all(table: &ReadOnlyTable<u64, i64>) -> StoreResult<Vec<MessageId>> {
    let mut acks = Vec::new();
    for entry in table.iter()? {
        let (key, _) = entry?;
        acks.push(MessageId(key.value()));
    }
    Ok(acks)
}

impl UnitOfWork {
    /// Add `id` to the ack set. Returns true if it was not there yet.
    pub fn put_ack(&mut self, id: MessageId) -> StoreResult<bool> {
        let mut table = self.txn.open_table(ACKS_TABLE)?;
        if table.get(id.as_u64())?.is_some() {
            return Ok(false);
        }
        table.insert(id.as_u64(), now_secs())?;
        Ok(true)
    }
}

impl Storage {
    /// Load the whole ack set, in id order.
    pub fn list_acks(&self) -> StoreResult<Vec<MessageId>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        read_all(&read_txn.open_table(ACKS_TABLE)?)
    }

    /// Check whether an ack exists for `id`.
    pub fn has_ack(&self, id: MessageId) -> StoreResult<bool> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ACKS_TABLE)?;
        Ok(table.get(id.as_u64())?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::create_test_storage;
    use super::*;

    #[test]
    fn test_ack_set_is_a_union() {
        let (storage, _temp) = create_test_storage();

        let mut uow = storage.begin().unwrap();
        assert!(uow.put_ack(MessageId(9)).unwrap());
        assert!(uow.put_ack(MessageId(4)).unwrap());
        assert!(!uow.put_ack(MessageId(9)).unwrap());
        uow.commit().unwrap();

        assert_eq!(storage.list_acks().unwrap(), vec![MessageId(4), MessageId(9)]);
        assert!(storage.has_ack(MessageId(4)).unwrap());
        assert!(!storage.has_ack(MessageId(5)).unwrap());
    }
}
