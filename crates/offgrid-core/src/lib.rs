//! OffGrid Relay Core Library
//!
//! Store-and-forward messaging for places without a network.
//!
//! ## Overview
//!
//! Every device keeps a local store of messages. Messages move between
//! devices only as text bundles that people carry by hand: pasted into a
//! chat, shown as a QR code, saved to a file. Each device that imports a
//! bundle stores what is new and forwards it in its own next export, until
//! the hop budget (`ttl`) of a message runs out.
//!
//! Receipt is confirmed by acks: a device that gets a message addressed to
//! it personally records the id, and the ack set travels back through the
//! same bundles to the sender.
//!
//! ## Core Principles
//!
//! - **Local-first**: nothing ever needs a connection
//! - **Idempotent merge**: importing a bundle twice is the same as once
//! - **All or nothing**: a malformed bundle changes nothing
//!
//! ## Quick Start
//!
//! ```ignore
//! use offgrid_core::{DeviceId, MessageKind, RelayEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = RelayEngine::new("~/.offgrid/data").await?;
//!
//!     engine
//!         .create_outgoing(MessageKind::Text, DeviceId::new("1a2b3c4d"), "on my way", 0)
//!         .await?;
//!
//!     let bundle = engine.export_bundle().await?;
//!     println!("{}", bundle);
//!
//!     for msg in engine.list_inbox().await? {
//!         println!("{} {}", msg.kind.tag(), msg.body);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod storage;
pub mod sync;
pub mod types;
pub mod view;

// Re-exports
pub use config::{BodyPolicy, RelayConfig, ZeroTtlPolicy, DEFAULT_ZERO_TTL_POLICY};
pub use engine::{RelayEngine, DB_FILE_NAME};
pub use error::{RelayError, RelayResult, StoreError, StoreResult};
pub use storage::{Storage, StoreSnapshot, StoreStats, UnitOfWork};
pub use sync::{Bundle, MergeReport};
pub use types::*;
pub use view::DeliveryStatus;
