//! Main RelayEngine - the primary entry point for OffGrid Relay
//!
//! RelayEngine coordinates Storage, the bundle codec and the merge engine:
//! - Persistent storage of messages, acks and the seen set
//! - Composing outgoing messages
//! - Exporting and importing bundles
//!
//! # Example
//!
//! ```ignore
//! use offgrid_core::RelayEngine;
//!
//! let engine = RelayEngine::new("~/.offgrid/data").await?;
//!
//! // Queue a broadcast SOS
//! engine.send_sos("Need water at the north bridge").await?;
//!
//! // Hand the string to whoever is passing by
//! let bundle = engine.export_bundle().await?;
//!
//! // ...and take theirs
//! let report = engine.import_bundle(&their_bundle).await?;
//! ```

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult, StoreError};
use crate::identity::get_or_create_device_id;
use crate::storage::{Storage, StoreStats};
use crate::sync::{merge_bundle, select_for_export, Bundle, MergeReport};
use crate::types::{DeviceId, Message, MessageId, MessageKind, SOS_PRIORITY};
use crate::view::{self, DeliveryStatus};

/// Name of the database file inside the data directory
pub const DB_FILE_NAME: &str = "offgrid.redb";

/// Main entry point for OffGrid Relay
///
/// All operations take `&self`, so one engine can be shared behind an
/// `Arc`. Mutating operations are serialized by an internal write gate.
pub struct RelayEngine {
    /// Persistent storage for messages, acks, seen ids and meta
    storage: Storage,
    /// Local device id, replaced on reset
    device_id: RwLock<DeviceId>,
    config: RelayConfig,
    /// Held for the whole unit of work of every mutating operation
    write_gate: Mutex<()>,
    data_dir: PathBuf,
}

impl RelayEngine {
    /// Create a new RelayEngine with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Store` if the directory cannot be created or
    /// the database cannot be opened (e.g. another process holds it).
    pub async fn new(data_dir: impl AsRef<Path>) -> RelayResult<Self> {
        Self::with_config(data_dir, RelayConfig::default()).await
    }

    /// Create a new RelayEngine with an explicit configuration.
    ///
    /// This will:
    /// - Create the data directory if it doesn't exist
    /// - Open (or create) the database
    /// - Load the device id, generating one on first start
    pub async fn with_config(data_dir: impl AsRef<Path>, config: RelayConfig) -> RelayResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!(?data_dir, "Initializing RelayEngine");

        std::fs::create_dir_all(&data_dir).map_err(StoreError::from)?;

        let storage = Storage::new(data_dir.join(DB_FILE_NAME))?;
        let device_id = get_or_create_device_id(&storage)?;
        info!(device_id = %device_id, "Relay identity ready");

        Ok(Self {
            storage,
            device_id: RwLock::new(device_id),
            config,
            write_gate: Mutex::new(()),
            data_dir,
        })
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get a reference to the storage layer
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The local device id
    pub fn device_id(&self) -> DeviceId {
        self.device_id.read().clone()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Composing
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a message from this device and queue it for export.
    ///
    /// The message is stored in the outbox and its id is marked seen in the
    /// same unit of work, so our own message coming back in a bundle is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Validation` for an `Ack` kind, an empty
    /// recipient, an empty text body, or a body over the cap under
    /// `BodyPolicy::Reject`.
    pub async fn create_outgoing(
        &self,
        kind: MessageKind,
        to: DeviceId,
        body: &str,
        priority: i32,
    ) -> RelayResult<Message> {
        if kind == MessageKind::Ack {
            return Err(RelayError::Validation(
                "ack messages cannot be created directly".to_string(),
            ));
        }
        if to.as_str().is_empty() {
            return Err(RelayError::Validation("recipient must not be empty".to_string()));
        }

        let body = self.config.prepare_body(body)?;
        if kind == MessageKind::Text && body.trim().is_empty() {
            return Err(RelayError::Validation("message body is empty".to_string()));
        }

        let _gate = self.write_gate.lock().await;

        let mut message = Message::new_outgoing(
            self.device_id(),
            to,
            kind,
            body,
            priority,
            self.config.default_ttl,
        );

        let mut uow = self.storage.begin()?;
        while uow.has_seen(message.id)? {
            message.id = MessageId::random();
        }
        uow.put_message(&message)?;
        uow.mark_seen(message.id)?;
        uow.commit()?;

        info!(
            message_id = %message.id,
            to = %message.to,
            kind = ?message.kind,
            ttl = message.ttl,
            "Queued outgoing message"
        );
        Ok(message)
    }

    /// Queue a broadcast SOS at SOS priority.
    pub async fn send_sos(&self, body: &str) -> RelayResult<Message> {
        self.create_outgoing(MessageKind::Sos, DeviceId::broadcast(), body, SOS_PRIORITY)
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Exchange
    // ═══════════════════════════════════════════════════════════════════════

    /// Export everything this device forwards, plus its whole ack set.
    pub async fn export_bundle(&self) -> RelayResult<String> {
        let snapshot = self.storage.snapshot()?;
        let msgs = select_for_export(snapshot.messages, self.config.zero_ttl_policy);
        let bundle = Bundle::new(self.device_id(), msgs, snapshot.acks);

        let encoded = bundle.encode()?;
        info!(
            msgs = bundle.msgs.len(),
            acks = bundle.acks.len(),
            bytes = encoded.len(),
            "Exported bundle"
        );
        Ok(encoded)
    }

    /// Import a transport string received from another device.
    ///
    /// The bundle is decoded completely before anything is written, and the
    /// merge runs in a single unit of work. Either the whole bundle lands or
    /// nothing does.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Decode` for malformed input, with no state
    /// change. Returns `RelayError::Store` if the merge fails; it is rolled
    /// back.
    pub async fn import_bundle(&self, input: &str) -> RelayResult<MergeReport> {
        let bundle = match Bundle::decode(input) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "Rejected bundle");
                return Err(e);
            }
        };
        debug!(
            from = %bundle.from,
            msgs = bundle.msgs.len(),
            acks = bundle.acks.len(),
            "Decoded bundle"
        );

        let _gate = self.write_gate.lock().await;
        let local = self.device_id();

        let mut uow = self.storage.begin()?;
        match merge_bundle(&mut uow, bundle, &local) {
            Ok(report) => {
                uow.commit()?;
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Merge failed, rolling back");
                if let Err(rollback_err) = uow.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e.into())
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Views
    // ═══════════════════════════════════════════════════════════════════════

    /// Messages delivered here, newest first
    pub async fn list_inbox(&self) -> RelayResult<Vec<Message>> {
        Ok(view::list_inbox(&self.storage)?)
    }

    /// Messages carried for others, newest first
    pub async fn list_outbox(&self) -> RelayResult<Vec<Message>> {
        Ok(view::list_outbox(&self.storage)?)
    }

    /// Outbox messages addressed to `to`, newest first
    pub async fn list_outbox_for(&self, to: &DeviceId) -> RelayResult<Vec<Message>> {
        Ok(view::list_outbox_for(&self.storage, to)?)
    }

    pub fn list_acks(&self) -> RelayResult<Vec<MessageId>> {
        Ok(self.storage.list_acks()?)
    }

    pub fn is_acked(&self, id: MessageId) -> RelayResult<bool> {
        Ok(self.storage.has_ack(id)?)
    }

    pub fn delivery_status(&self, id: MessageId) -> RelayResult<DeliveryStatus> {
        Ok(view::delivery_status(&self.storage, id)?)
    }

    pub fn stats(&self) -> RelayResult<StoreStats> {
        Ok(self.storage.stats()?)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reset
    // ═══════════════════════════════════════════════════════════════════════

    /// Irreversibly wipe every collection and draw a new device id.
    ///
    /// Returns the new device id.
    pub async fn reset_all(&self) -> RelayResult<DeviceId> {
        let _gate = self.write_gate.lock().await;

        let old = self.device_id();
        self.storage.reset_all()?;

        let new_id = get_or_create_device_id(&self.storage)?;
        *self.device_id.write() = new_id.clone();

        warn!(old = %old, new = %new_id, "Relay state reset");
        Ok(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyPolicy;
    use crate::types::MAX_BODY_CHARS;
    use tempfile::TempDir;

    async fn create_test_engine() -> (RelayEngine, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let engine = RelayEngine::new(temp_dir.path()).await.unwrap();
        (engine, temp_dir)
    }

    #[tokio::test]
    async fn test_engine_creation() {
        let (engine, temp) = create_test_engine().await;
        assert!(temp.path().join(DB_FILE_NAME).exists());
        assert_eq!(engine.device_id().as_str().len(), 8);
        assert_eq!(engine.stats().unwrap(), StoreStats::default());
    }

    #[tokio::test]
    async fn test_device_id_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let engine = RelayEngine::new(temp_dir.path()).await.unwrap();
            engine.device_id()
        };
        let engine = RelayEngine::new(temp_dir.path()).await.unwrap();
        assert_eq!(engine.device_id(), id);
    }

    #[tokio::test]
    async fn test_create_outgoing_stores_in_outbox() {
        let (engine, _temp) = create_test_engine().await;

        let msg = engine
            .create_outgoing(MessageKind::Text, DeviceId::new("0000bbbb"), "hello", 1)
            .await
            .unwrap();

        assert_eq!(msg.from, engine.device_id());
        assert_eq!(msg.ttl, 6);
        assert_eq!(msg.prio, 1);
        assert!(!msg.inbox);
        assert!(engine.storage().is_seen(msg.id).unwrap());

        let outbox = engine.list_outbox().await.unwrap();
        assert_eq!(outbox, vec![msg]);
        assert!(engine.list_inbox().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_sos_is_broadcast_at_sos_priority() {
        let (engine, _temp) = create_test_engine().await;
        let msg = engine.send_sos("help").await.unwrap();
        assert!(msg.to.is_broadcast());
        assert_eq!(msg.prio, SOS_PRIORITY);
        assert_eq!(msg.kind, MessageKind::Sos);
    }

    #[tokio::test]
    async fn test_create_outgoing_validation() {
        let (engine, _temp) = create_test_engine().await;

        let ack = engine
            .create_outgoing(MessageKind::Ack, DeviceId::broadcast(), "x", 0)
            .await;
        assert!(matches!(ack, Err(RelayError::Validation(_))));

        let empty = engine
            .create_outgoing(MessageKind::Text, DeviceId::broadcast(), "   ", 0)
            .await;
        assert!(matches!(empty, Err(RelayError::Validation(_))));

        let no_recipient = engine
            .create_outgoing(MessageKind::Text, DeviceId::new(""), "hi", 0)
            .await;
        assert!(matches!(no_recipient, Err(RelayError::Validation(_))));

        let long = "x".repeat(MAX_BODY_CHARS + 1);
        let too_long = engine
            .create_outgoing(MessageKind::Text, DeviceId::broadcast(), &long, 0)
            .await;
        assert!(matches!(too_long, Err(RelayError::Validation(_))));

        assert_eq!(engine.stats().unwrap().messages, 0);
    }

    #[tokio::test]
    async fn test_truncate_policy_cuts_body() {
        let temp_dir = TempDir::new().unwrap();
        let config = RelayConfig {
            body_policy: BodyPolicy::Truncate,
            ..RelayConfig::default()
        };
        let engine = RelayEngine::with_config(temp_dir.path(), config)
            .await
            .unwrap();

        let msg = engine
            .create_outgoing(MessageKind::Text, DeviceId::broadcast(), &"y".repeat(400), 0)
            .await
            .unwrap();
        assert_eq!(msg.body_chars(), MAX_BODY_CHARS);
    }

    #[tokio::test]
    async fn test_own_message_coming_back_is_skipped() {
        let (engine, _temp) = create_test_engine().await;
        engine.send_sos("help").await.unwrap();

        let bundle = engine.export_bundle().await.unwrap();
        let report = engine.import_bundle(&bundle).await.unwrap();

        assert_eq!(report.merged, 0);
        assert_eq!(report.duplicates, 1);
        let outbox = engine.list_outbox().await.unwrap();
        assert_eq!(outbox[0].ttl, 6);
    }

    #[tokio::test]
    async fn test_import_rejects_garbage_without_writing() {
        let (engine, _temp) = create_test_engine().await;
        engine.send_sos("help").await.unwrap();
        let before = engine.stats().unwrap();

        let err = engine.import_bundle("%%% not a bundle %%%").await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(engine.stats().unwrap(), before);
    }

    #[tokio::test]
    async fn test_reset_draws_new_identity() {
        let (engine, _temp) = create_test_engine().await;
        engine.send_sos("help").await.unwrap();

        let new_id = engine.reset_all().await.unwrap();
        assert_eq!(engine.device_id(), new_id);
        assert_eq!(
            engine.stats().unwrap(),
            StoreStats {
                messages: 0,
                acks: 0,
                seen: 0
            }
        );
        assert!(engine.list_outbox().await.unwrap().is_empty());
    }
}
