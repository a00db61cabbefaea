//! Use case for sending and retrying outgoing messages.
//!
//! `MessageRouter` decides whether a chat is a group or a direct chat and
//! hands the envelope to the matching `DeliveryPath`. It never changes the
//! payload and never retries on its own.

use chrono::Utc;
use thiserror::Error;

use crate::{
    domain::{
        connection::{ConnectionUpdate, MessageStatus, NewMessageCountAction},
        message::{OnUpdateSuccess, OutgoingMessage},
    },
    usecases::contracts::{
        ChatKindResolver, ConnectionStore, DeliveryError, DeliveryPath, StoreError,
    },
};

const MESSAGE_ROUTED: &str = "MESSAGE_ROUTED";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The group/direct lookup for the chat failed.
    #[error("failed to resolve chat kind: {0}")]
    ChatLookup(#[source] StoreError),
    /// The delivery path failed; carries its error untouched.
    #[error(transparent)]
    Delivery(DeliveryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Send,
    Retry,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Send => "send",
            Operation::Retry => "retry",
        }
    }
}

pub struct MessageRouter<'a> {
    chats: &'a dyn ChatKindResolver,
    direct: &'a dyn DeliveryPath,
    group: &'a dyn DeliveryPath,
}

impl<'a> MessageRouter<'a> {
    pub fn new(
        chats: &'a dyn ChatKindResolver,
        direct: &'a dyn DeliveryPath,
        group: &'a dyn DeliveryPath,
    ) -> Self {
        Self {
            chats,
            direct,
            group,
        }
    }

    /// Sends the message through the path matching its chat.
    ///
    /// # Errors
    /// Returns `RouteError::ChatLookup` if the chat kind cannot be resolved
    /// and `RouteError::Delivery` with the path's own error otherwise.
    pub fn send(
        &self,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), RouteError> {
        self.dispatch(Operation::Send, message, on_update_success)
    }

    /// Retries a previously attempted message through the path matching its chat.
    pub fn retry(
        &self,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), RouteError> {
        self.dispatch(Operation::Retry, message, on_update_success)
    }

    fn dispatch(
        &self,
        operation: Operation,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), RouteError> {
        let is_group = self
            .chats
            .is_group_chat(&message.chat_id)
            .map_err(RouteError::ChatLookup)?;
        let path = if is_group { self.group } else { self.direct };

        tracing::debug!(
            code = MESSAGE_ROUTED,
            operation = operation.as_str(),
            group = is_group,
            message_id = %message.message_id,
            content_type = message.content_type().as_str(),
            "routing outgoing message"
        );

        let result = match operation {
            Operation::Send => path.send(message, on_update_success),
            Operation::Retry => path.retry(message, on_update_success),
        };

        result.map_err(RouteError::Delivery)
    }
}

/// Reflects an outgoing message in its chat summary.
///
/// A delivered message marks the chat as read; a failed one leaves the
/// unread count alone.
pub fn record_outgoing(
    connections: &dyn ConnectionStore,
    message: &OutgoingMessage,
    delivered: bool,
) -> Result<(), StoreError> {
    let (read_status, count_action) = if delivered {
        (MessageStatus::Sent, NewMessageCountAction::Reset)
    } else {
        (MessageStatus::Failed, NewMessageCountAction::Unchanged)
    };

    let update = ConnectionUpdate {
        chat_id: message.chat_id.clone(),
        text: message.data.preview_text(),
        recent_message_type: message.content_type(),
        latest_message_id: message.message_id.clone(),
        read_status,
        timestamp: Utc::now(),
    };

    connections.update_on_new_message(&update, count_action)
}
