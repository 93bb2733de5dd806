//! Inbox and outbox views
//!
//! Views are derived from the stored messages on every call and never
//! persisted. Both are newest first; equal timestamps fall back to the
//! larger id first so the order is total.

use std::cmp::Ordering;

use crate::error::StoreResult;
use crate::storage::Storage;
use crate::types::{DeviceId, Message, MessageId, MessageKind};

/// Whether a sent message has been confirmed by its recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// No ack has reached this device yet
    Pending,
    /// An ack for the message is in the local ack set
    Delivered,
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }
}

fn newest_first(a: &Message, b: &Message) -> Ordering {
    b.ts.cmp(&a.ts).then_with(|| b.id.cmp(&a.id))
}

/// Keep inbox messages, newest first.
pub fn inbox_view(messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
    let mut view: Vec<Message> = messages.into_iter().filter(|m| m.inbox).collect();
    view.sort_by(newest_first);
    view
}

/// Keep non-inbox, non-ack messages, newest first.
pub fn outbox_view(messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
    let mut view: Vec<Message> = messages
        .into_iter()
        .filter(|m| !m.inbox && m.kind != MessageKind::Ack)
        .collect();
    view.sort_by(newest_first);
    view
}

pub fn list_inbox(storage: &Storage) -> StoreResult<Vec<Message>> {
    Ok(inbox_view(storage.messages_by_inbox(true)?))
}

pub fn list_outbox(storage: &Storage) -> StoreResult<Vec<Message>> {
    Ok(outbox_view(storage.messages_by_inbox(false)?))
}

/// Outbox narrowed to one recipient, read through the recipient index.
pub fn list_outbox_for(storage: &Storage, recipient: &DeviceId) -> StoreResult<Vec<Message>> {
    Ok(outbox_view(storage.messages_for_recipient(recipient)?))
}

pub fn delivery_status(storage: &Storage, id: MessageId) -> StoreResult<DeliveryStatus> {
    if storage.has_ack(id)? {
        Ok(DeliveryStatus::Delivered)
    } else {
        Ok(DeliveryStatus::Pending)
    }
}
