use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{chat::ChatType, content::ContentType};

/// Read status of the latest message of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Newly received and not yet seen.
    Latest,
    #[default]
    Read,
    Sent,
    Failed,
}

/// How an update changes the unread counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewMessageCountAction {
    Increment,
    Reset,
    Unchanged,
}

/// Chat list entry state derived from the latest message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionSummary {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_message_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_message_id: Option<String>,
    #[serde(default)]
    pub read_status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub chat_id: String,
    pub name: String,
    #[serde(default)]
    pub chat_type: ChatType,
    #[serde(default)]
    pub disconnected: bool,
    #[serde(default)]
    pub summary: ConnectionSummary,
}

/// Summary fields written when a new message lands in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub chat_id: String,
    pub text: String,
    pub recent_message_type: ContentType,
    pub latest_message_id: String,
    pub read_status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionSummary {
    pub fn apply(&mut self, update: &ConnectionUpdate, count_action: NewMessageCountAction) {
        self.text = update.text.clone();
        self.recent_message_type = Some(update.recent_message_type);
        self.latest_message_id = Some(update.latest_message_id.clone());
        self.read_status = update.read_status;
        self.timestamp = Some(update.timestamp);

        match count_action {
            NewMessageCountAction::Increment => {
                self.unread_count = self.unread_count.saturating_add(1)
            }
            NewMessageCountAction::Reset => self.unread_count = 0,
            NewMessageCountAction::Unchanged => {}
        }
    }
}
