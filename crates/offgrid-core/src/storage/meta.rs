//! Meta storage - small string keyed values

use redb::{ReadableTable, TableDefinition};

use super::{Storage, UnitOfWork};
use crate::error::StoreResult;

/// Table for meta values (key: name, value: raw bytes)
pub(crate) const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

impl UnitOfWork {
    pub fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let table = self.txn.open_table(META_TABLE)?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    pub fn put_meta(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut table = self.txn.open_table(META_TABLE)?;
        table.insert(key, value)?;
        Ok(())
    }
}

impl Storage {
    /// Load a meta value.
    ///
    /// Returns `None` if the key was never written.
    pub fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(META_TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// Write a single meta value in its own unit of work.
    pub fn put_meta(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut uow = self.begin()?;
        uow.put_meta(key, value)?;
        uow.commit()
    }
}
