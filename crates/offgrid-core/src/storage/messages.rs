//! Message storage with recipient and inbox indexes
//!
//! ```text
//! messages:              id -> postcard(Message)
//! messages_by_recipient: "{to}:{id}" -> id
//! messages_by_inbox:     "{0|1}:{id:020}" -> id
//! ```

use redb::{ReadOnlyTable, ReadableTable, TableDefinition};

use super::{decode_record, encode_record, Storage, UnitOfWork};
use crate::error::StoreResult;
use crate::types::{DeviceId, Message, MessageId};

/// Table for messages (key: message id, value: serialized Message)
pub(crate) const MESSAGES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("messages");

/// Secondary index by recipient
pub(crate) const MESSAGES_BY_RECIPIENT: TableDefinition<&str, u64> =
    TableDefinition::new("messages_by_recipient");

/// Secondary index by inbox flag
pub(crate) const MESSAGES_BY_INBOX: TableDefinition<&str, u64> =
    TableDefinition::new("messages_by_inbox");

fn recipient_key(to: &DeviceId, id: MessageId) -> String {
    format!("{}:{}", to.as_str(), id.as_u64())
}

fn inbox_prefix(inbox: bool) -> &'static str {
    if inbox {
        "1:"
    } else {
        "0:"
    }
}

fn inbox_key(inbox: bool, id: MessageId) -> String {
    // Zero padded so the index iterates in id order
    format!("{}{:020}", inbox_prefix(inbox), id.as_u64())
}

pub(super) fn read_all(table: &ReadOnlyTable<u64, &'static [u8]>) -> StoreResult<Vec<Message>> {
    let mut messages = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        messages.push(decode_record(value.value())?);
    }
    Ok(messages)
}

fn resolve(
    messages: &ReadOnlyTable<u64, &'static [u8]>,
    ids: impl IntoIterator<Item = u64>,
) -> StoreResult<Vec<Message>> {
    let mut out = Vec::new();
    for id in ids {
        if let Some(data) = messages.get(id)? {
            out.push(decode_record(data.value())?);
        }
    }
    Ok(out)
}

impl UnitOfWork {
    /// Insert or overwrite a message, keeping both indexes in step.
    pub fn put_message(&mut self, message: &Message) -> StoreResult<()> {
        let id = message.id;
        let data = encode_record(message)?;

        let mut previous: Option<Message> = None;
        {
            let mut table = self.txn.open_table(MESSAGES_TABLE)?;
            let old = table.insert(id.as_u64(), data.as_slice())?;
            if let Some(guard) = old {
                previous = Some(decode_record(guard.value())?);
            }
        }

        let mut by_recipient = self.txn.open_table(MESSAGES_BY_RECIPIENT)?;
        let mut by_inbox = self.txn.open_table(MESSAGES_BY_INBOX)?;

        if let Some(old) = previous {
            by_recipient.remove(recipient_key(&old.to, id).as_str())?;
            by_inbox.remove(inbox_key(old.inbox, id).as_str())?;
        }

        by_recipient.insert(recipient_key(&message.to, id).as_str(), id.as_u64())?;
        by_inbox.insert(inbox_key(message.inbox, id).as_str(), id.as_u64())?;
        Ok(())
    }

    /// Look up a message inside this unit (sees uncommitted writes).
    pub fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        let table = self.txn.open_table(MESSAGES_TABLE)?;
        let result = match table.get(id.as_u64())? {
            Some(data) => Ok(Some(decode_record(data.value())?)),
            None => Ok(None),
        };
        result
    }
}

impl Storage {
    /// Load a single message by id.
    ///
    /// Returns `None` if no message with the given id exists.
    pub fn load_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(MESSAGES_TABLE)?;

        match table.get(id.as_u64())? {
            Some(data) => Ok(Some(decode_record(data.value())?)),
            None => Ok(None),
        }
    }

    /// Load every stored message, in id order.
    pub fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        read_all(&read_txn.open_table(MESSAGES_TABLE)?)
    }

    /// Load the messages whose local `inbox` flag equals `inbox`.
    pub fn messages_by_inbox(&self, inbox: bool) -> StoreResult<Vec<Message>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let index = read_txn.open_table(MESSAGES_BY_INBOX)?;
        let messages = read_txn.open_table(MESSAGES_TABLE)?;

        let prefix = inbox_prefix(inbox);
        let mut ids = Vec::new();
        for entry in index.range(prefix..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(prefix) {
                break;
            }
            ids.push(value.value());
        }

        resolve(&messages, ids)
    }

    /// Load the messages addressed to `recipient`.
    ///
    /// Broadcast messages are only returned when `recipient` is the
    /// broadcast sentinel itself.
    pub fn messages_for_recipient(&self, recipient: &DeviceId) -> StoreResult<Vec<Message>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let index = read_txn.open_table(MESSAGES_BY_RECIPIENT)?;
        let messages = read_txn.open_table(MESSAGES_TABLE)?;

        let prefix = format!("{}:", recipient.as_str());
        let mut ids = Vec::new();
        for entry in index.range(prefix.as_str()..)? {
            let (key, value) = entry?;
            let key_str = key.value();
            if !key_str.starts_with(&prefix) {
                break;
            }
            // "{to}:{id}": ids never contain ':', recipients might
            let exact = key_str
                .rsplit_once(':')
                .map(|(to, _)| to == recipient.as_str())
                .unwrap_or(false);
            if exact {
                ids.push(value.value());
            }
        }

        resolve(&messages, ids)
    }
}
