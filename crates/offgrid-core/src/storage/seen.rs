//! Seen set - dedup index of merged message ids
//!
//! An id enters this table in the same unit of work that stores the
//! message, and never leaves it (short of a full reset).

use redb::{ReadableTable, TableDefinition};

use super::{Storage, UnitOfWork};
use crate::error::StoreResult;
use crate::types::{now_secs, MessageId};

/// Table for seen ids (key: message id, value: unix seconds first seen)
pub(crate) const SEEN_TABLE: TableDefinition<u64, i64> = TableDefinition::new("seen");

impl UnitOfWork {
    /// Check whether `id` has already been merged or created here.
    pub fn has_seen(&self, id: MessageId) -> StoreResult<bool> {
        let table = self.txn.open_table(SEEN_TABLE)?;
        let seen = table.get(id.as_u64())?.is_some();
        Ok(seen)
    }

    /// Mark `id` as seen. Returns true if it was not seen before.
    ///
    /// The first-seen time is kept when the id is already present.
    pub fn mark_seen(&mut self, id: MessageId) -> StoreResult<bool> {
        let mut table = self.txn.open_table(SEEN_TABLE)?;
        if table.get(id.as_u64())?.is_some() {
            return Ok(false);
        }
        table.insert(id.as_u64(), now_secs())?;
        Ok(true)
    }
}

impl Storage {
    /// Check whether `id` is in the seen set.
    pub fn is_seen(&self, id: MessageId) -> StoreResult<bool> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(SEEN_TABLE)?;
        Ok(table.get(id.as_u64())?.is_some())
    }
}
