use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::content::{ContentType, MessageData};

/// Completion callback forwarded to the delivery paths; reports success.
pub type OnUpdateSuccess<'a> = Option<&'a dyn Fn(bool)>;

/// Returns a fresh random hex id (32 lowercase hex chars).
pub fn random_hex_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Outgoing message envelope handed to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    /// Restricts a group send to one member. Ignored by direct chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_recipient: Option<String>,
    #[serde(flatten)]
    pub data: MessageData,
}

impl OutgoingMessage {
    pub fn new(chat_id: impl Into<String>, data: MessageData) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id: random_hex_id(),
            reply_id: None,
            single_recipient: None,
            data,
        }
    }

    pub fn with_reply_id(mut self, reply_id: Option<String>) -> Self {
        self.reply_id = reply_id;
        self
    }

    /// Overrides the generated id. `None` keeps the generated one.
    pub fn with_message_id(mut self, message_id: Option<String>) -> Self {
        if let Some(message_id) = message_id {
            self.message_id = message_id;
        }
        self
    }

    pub fn with_single_recipient(mut self, single_recipient: Option<String>) -> Self {
        self.single_recipient = single_recipient;
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.data.content_type()
    }
}

/// A message that has already been decrypted and is ready for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: MessageData,
}

impl InboundMessage {
    pub fn content_type(&self) -> ContentType {
        self.data.content_type()
    }
}
