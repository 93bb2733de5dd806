//! Identity module for OffGrid Relay
//!
//! A device is identified by a short random id drawn once and kept in the
//! `meta` collection under [`DEVICE_ID_KEY`]. It stays the same for the
//! lifetime of the local store; only a full reset forgets it.
//!
//! ## Width
//!
//! Device ids carry 32 random bits (eight hex digits), while message ids
//! carry 64. At 32 bits the birthday bound is reached around 65k devices.
//! The width is kept so ids stay short enough to read aloud and type in.

use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::storage::Storage;
use crate::types::DeviceId;

/// Meta key under which the device id is stored
pub const DEVICE_ID_KEY: &str = "deviceId";

/// Load the device id, generating and persisting one on first use.
///
/// The lookup and the write happen in one unit of work, so two racing
/// callers still end up with the same id.
pub fn get_or_create_device_id(storage: &Storage) -> StoreResult<DeviceId> {
    let mut uow = storage.begin()?;

    if let Some(raw) = uow.get_meta(DEVICE_ID_KEY)? {
        uow.rollback()?;
        let id = String::from_utf8(raw)
            .map_err(|e| StoreError::Record(format!("device id is not UTF-8: {}", e)))?;
        return Ok(DeviceId::new(id));
    }

    let id = DeviceId::generate();
    uow.put_meta(DEVICE_ID_KEY, id.as_str().as_bytes())?;
    uow.commit()?;
    info!(device_id = %id, "Generated new device id");
    Ok(id)
}
