//! Persistent storage using redb.
//!
//! Four keyed collections back the relay:
//! - `messages` (plus two secondary indexes: by recipient, by inbox flag)
//! - `acks` (ids of messages confirmed as received)
//! - `seen` (dedup index of every id ever merged or created here)
//! - `meta` (string keyed values, e.g. the device id)
//!
//! Writes that must land together go through a [`UnitOfWork`], which wraps
//! one redb write transaction. Reads run in their own read transaction.

use crate::error::{StoreError, StoreResult};
use crate::types::{Message, MessageId};
use parking_lot::RwLock;
use redb::{Database, ReadableTableMetadata, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

// Submodules
mod acks;
mod messages;
mod meta;
mod seen;

use acks::ACKS_TABLE;
use messages::{MESSAGES_BY_INBOX, MESSAGES_BY_RECIPIENT, MESSAGES_TABLE};
use meta::META_TABLE;
use seen::SEEN_TABLE;

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

/// Counts of the stored collections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub messages: u64,
    pub acks: u64,
    pub seen: u64,
}

/// A consistent read of everything an export needs
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub messages: Vec<Message>,
    pub acks: Vec<MessageId>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    ///
    /// Fails with [`StoreError::Database`] if another process already has
    /// the file open.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        Self::create_tables(&write_txn)?;
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    fn create_tables(txn: &WriteTransaction) -> StoreResult<()> {
        let _ = txn.open_table(MESSAGES_TABLE)?;
        let _ = txn.open_table(MESSAGES_BY_RECIPIENT)?;
        let _ = txn.open_table(MESSAGES_BY_INBOX)?;
        let _ = txn.open_table(ACKS_TABLE)?;
        let _ = txn.open_table(SEEN_TABLE)?;
        let _ = txn.open_table(META_TABLE)?;
        Ok(())
    }

    /// Start a unit of work spanning any of the collections.
    ///
    /// redb admits a single write transaction at a time, so this blocks
    /// while another unit is open.
    pub fn begin(&self) -> StoreResult<UnitOfWork> {
        let db = self.db.read();
        let txn = db.begin_write()?;
        Ok(UnitOfWork { txn })
    }

    /// Read the messages and the ack set in one read transaction.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let messages = messages::read_all(&read_txn.open_table(MESSAGES_TABLE)?)?;
        let acks = acks::read_all(&read_txn.open_table(ACKS_TABLE)?)?;
        Ok(StoreSnapshot { messages, acks })
    }

    /// Count the entries of each collection.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        Ok(StoreStats {
            messages: read_txn.open_table(MESSAGES_TABLE)?.len()?,
            acks: read_txn.open_table(ACKS_TABLE)?.len()?,
            seen: read_txn.open_table(SEEN_TABLE)?.len()?,
        })
    }

    /// Irreversibly wipe every collection, including the device identity.
    pub fn reset_all(&self) -> StoreResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        write_txn.delete_table(MESSAGES_TABLE)?;
        write_txn.delete_table(MESSAGES_BY_RECIPIENT)?;
        write_txn.delete_table(MESSAGES_BY_INBOX)?;
        write_txn.delete_table(ACKS_TABLE)?;
        write_txn.delete_table(SEEN_TABLE)?;
        write_txn.delete_table(META_TABLE)?;
        Self::create_tables(&write_txn)?;
        write_txn.commit()?;
        warn!("Wiped all relay collections");
        Ok(())
    }
}

/// An atomic group of writes across collections.
///
/// Nothing is visible to readers until [`commit`](Self::commit). Dropping a
/// unit without committing rolls it back.
pub struct UnitOfWork {
    txn: WriteTransaction,
}

impl UnitOfWork {
    /// Make every write in this unit durable and visible.
    pub fn commit(self) -> StoreResult<()> {
        self.txn.commit()?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discard every write in this unit.
    pub fn rollback(self) -> StoreResult<()> {
        self.txn.abort()?;
        info!("Unit of work rolled back");
        Ok(())
    }
}

fn encode_record<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| StoreError::Record(e.to_string()))
}

fn decode_record<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Record(e.to_string()))
}
