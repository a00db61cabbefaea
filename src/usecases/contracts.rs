use thiserror::Error;

use crate::domain::{
    chat::{ChatPermissions, ChatType},
    connection::{Connection, ConnectionUpdate, NewMessageCountAction},
    message::{InboundMessage, OnUpdateSuccess, OutgoingMessage},
};

/// Errors reported by storage-backed collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("chat {0} is not a known connection")]
    ChatNotFound(String),
    #[error("identifier {0:?} is not valid")]
    InvalidId(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Errors reported by a delivery path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery transport unavailable: {0}")]
    Unavailable(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

pub trait ChatKindResolver {
    fn is_group_chat(&self, chat_id: &str) -> Result<bool, StoreError>;
}

/// One of the two outgoing paths (direct or group).
pub trait DeliveryPath {
    fn send(
        &self,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), DeliveryError>;

    fn retry(
        &self,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), DeliveryError>;
}

pub trait ConnectionStore {
    fn connection(&self, chat_id: &str) -> Result<Connection, StoreError>;

    fn update_on_new_message(
        &self,
        update: &ConnectionUpdate,
        count_action: NewMessageCountAction,
    ) -> Result<(), StoreError>;
}

pub trait PermissionsSource {
    fn chat_permissions(
        &self,
        chat_id: &str,
        chat_type: ChatType,
    ) -> Result<ChatPermissions, StoreError>;
}

pub trait MessageStore {
    /// Stores the message unless one with the same id is already stored.
    /// Returns `false` when it was already there.
    fn save_message(&self, message: &InboundMessage) -> Result<bool, StoreError>;

    /// Removes a stored message. A missing message is not an error.
    fn discard_message(&self, chat_id: &str, message_id: &str) -> Result<(), StoreError>;
}

/// Guards against processing the same inbound message twice.
pub trait DuplicateGuard {
    fn already_processed(&self, chat_id: &str, message_id: &str) -> Result<bool, StoreError>;
}

pub trait Notifier {
    fn display_simple_notification(
        &self,
        title: &str,
        body: &str,
        should_alert: bool,
        chat_id: &str,
    );
}

pub trait ConnectionListSource {
    fn connections(&self) -> Result<Vec<Connection>, StoreError>;
}
