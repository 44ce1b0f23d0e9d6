//! Wire data model for the portal REST API.
//!
//! Field names follow the JSON the portal server actually emits; anything the
//! server may omit carries `#[serde(default)]` so a sparse row still
//! deserializes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the contact list returned by `GET /api/chats`.
///
/// `message_count` is authoritative from the server; `unread_count` is derived
/// on the client by diffing successive counts and is never read off the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Opaque external identifier of the contact.
    pub wa_id: String,
    /// Display name; the server may not know it.
    #[serde(default)]
    pub name: String,
    /// Preview of the most recent message in the conversation.
    #[serde(default)]
    pub last_message: String,
    /// Timestamp of the most recent message, if any message exists.
    #[serde(default)]
    pub last_message_timestamp: Option<DateTime<Utc>>,
    /// Total number of messages the server holds for this conversation.
    #[serde(default)]
    pub message_count: i64,
    /// Client-derived unread counter, filled in by the sync engine.
    #[serde(skip_deserializing, default)]
    pub unread_count: i64,
}

/// Message direction relative to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Delivery status of an outbound message.
///
/// `Pending` is client-only: it marks an optimistic entry that has not been
/// acknowledged yet. The wire spells it `"sending"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[serde(rename = "sending")]
    Pending,
    Sent,
    Delivered,
    Read,
}

impl Default for MessageStatus {
    // The server's own default for stored rows.
    fn default() -> Self {
        MessageStatus::Delivered
    }
}

/// One message of a conversation as returned by `GET /api/chats/{wa_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server message id. Optimistic client entries have none until the
    /// reconcile fetch replaces them.
    #[serde(default)]
    pub id: Option<String>,
    /// Conversation the message belongs to.
    #[serde(default)]
    pub wa_id: String,
    /// Message text. Empty for pure media messages.
    #[serde(default)]
    pub body: String,
    /// Media URL when the message carries an image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Server-side content type tag, e.g. "text" or "image".
    #[serde(rename = "type", default = "default_msg_type")]
    pub msg_type: String,
    pub direction: Direction,
    #[serde(default)]
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

fn default_msg_type() -> String {
    "text".to_string()
}

impl Message {
    /// De-duplication key within one conversation: the server id when present,
    /// otherwise the timestamp. Optimistic entries are keyed by their
    /// client-generated timestamp, which is how a failed send finds them again.
    pub fn identity_key(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => self.timestamp.to_rfc3339(),
        }
    }
}

/// Response envelope of `GET /api/chats`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatsResp {
    #[serde(default)]
    pub chats: Vec<Contact>,
}

/// Response envelope of `GET /api/chats/{wa_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResp {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Error body the server attaches to non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResp {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_contact_row_deserializes_with_defaults() {
        let contact: Contact = serde_json::from_str(r#"{"wa_id":"491701234567"}"#).unwrap();
        assert_eq!(contact.wa_id, "491701234567");
        assert_eq!(contact.message_count, 0);
        assert_eq!(contact.unread_count, 0);
        assert!(contact.last_message_timestamp.is_none());
    }

    #[test]
    fn unread_count_is_never_taken_from_the_wire() {
        let contact: Contact =
            serde_json::from_str(r#"{"wa_id":"1","unread_count":99}"#).unwrap();
        assert_eq!(contact.unread_count, 0);
    }

    #[test]
    fn message_identity_prefers_server_id() {
        let msg: Message = serde_json::from_str(
            r#"{"id":"wamid.abc","direction":"inbound","timestamp":"2025-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.identity_key(), "wamid.abc");
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.msg_type, "text");
    }

    #[test]
    fn message_identity_falls_back_to_timestamp() {
        let msg: Message = serde_json::from_str(
            r#"{"direction":"outbound","status":"sending","timestamp":"2025-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.status, MessageStatus::Pending);
        assert_eq!(msg.identity_key(), "2025-03-01T10:00:00+00:00");
    }
}
