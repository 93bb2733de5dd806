//! Merging a received bundle into the local store
//!
//! ## Rules
//!
//! 1. Every ack in the bundle joins the local ack set.
//! 2. A message whose id was ever seen here is skipped, so re-importing a
//!    bundle changes nothing.
//! 3. A new message loses one hop of ttl (never below zero), is classified
//!    against the local device id, and is stored together with its seen
//!    marker.
//! 4. A new non-ack message addressed directly to this device is acked.
//!
//! All of this happens inside the caller's [`UnitOfWork`]; the caller
//! commits or rolls back the whole bundle.

use tracing::{debug, info};

use super::Bundle;
use crate::error::StoreResult;
use crate::storage::UnitOfWork;
use crate::types::{DeviceId, Message, MessageKind};

/// What a merge changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Acks carried by the bundle
    pub acks_received: usize,
    /// Acks that were not in the local set before
    pub acks_new: usize,
    /// Messages stored for the first time
    pub merged: usize,
    /// Messages skipped because their id was already seen
    pub duplicates: usize,
    /// Acks generated for messages addressed to this device
    pub acks_generated: usize,
    /// New messages classified into the inbox
    pub delivered: usize,
}

impl MergeReport {
    /// True if the merge wrote nothing new.
    pub fn is_noop(&self) -> bool {
        self.acks_new == 0 && self.merged == 0
    }
}

/// Turn a received message into the form it is stored in here.
///
/// Decrements the hop budget and recomputes the local inbox flag,
/// ignoring whatever the sender had in it.
pub fn prepare_incoming(mut message: Message, local: &DeviceId) -> Message {
    message.ttl = message.ttl.saturating_sub(1);
    message.inbox = message.is_for(local);
    message
}

/// Merge `bundle` into the store through `uow`.
///
/// Does not commit. On error the caller must drop or roll back `uow`.
pub fn merge_bundle(
    uow: &mut UnitOfWork,
    bundle: Bundle,
    local: &DeviceId,
) -> StoreResult<MergeReport> {
    let mut report = MergeReport {
        acks_received: bundle.acks.len(),
        ..MergeReport::default()
    };

    for id in &bundle.acks {
        if uow.put_ack(*id)? {
            report.acks_new += 1;
        }
    }

    for incoming in bundle.msgs {
        if uow.has_seen(incoming.id)? {
            debug!(message_id = %incoming.id, "Skipping already seen message");
            report.duplicates += 1;
            continue;
        }

        let message = prepare_incoming(incoming, local);

        if message.is_direct_to(local) && message.kind != MessageKind::Ack {
            uow.put_ack(message.id)?;
            report.acks_generated += 1;
        }
        if message.inbox {
            report.delivered += 1;
        }

        debug!(
            message_id = %message.id,
            from = %message.from,
            to = %message.to,
            ttl = message.ttl,
            inbox = message.inbox,
            "Merging message"
        );

        uow.put_message(&message)?;
        uow.mark_seen(message.id)?;
        report.merged += 1;
    }

    info!(
        from = %bundle.from,
        merged = report.merged,
        duplicates = report.duplicates,
        acks_new = report.acks_new,
        delivered = report.delivered,
        "Merged bundle"
    );

    Ok(report)
}
