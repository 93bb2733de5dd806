//! Error types for OffGrid Relay

use thiserror::Error;

/// Failure of the persistent store.
///
/// Any operation returning this has been aborted and its unit of work rolled
/// back, so no partial writes are observable.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database creation/opening error (including "already open" by another process)
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    Storage(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// A stored record could not be (de)serialized
    #[error("Record error: {0}")]
    Record(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// The persistent store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A transport string was not a conforming bundle. Nothing was merged.
    #[error("Invalid bundle: {0}")]
    Decode(String),

    /// A bundle could not be turned into a transport string
    #[error("Failed to encode bundle: {0}")]
    Encode(String),

    /// A locally composed message was rejected
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl RelayError {
    /// True if this error came from a malformed bundle.
    pub fn is_decode(&self) -> bool {
        matches!(self, RelayError::Decode(_))
    }
}

/// Result type alias using StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias using RelayError
pub type RelayResult<T> = Result<T, RelayError>;
