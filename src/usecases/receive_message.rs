//! Receive pipeline for decrypted direct messages.
//!
//! `ReceiveAction` describes an inbound payload in the chat list and in a
//! notification. `perform_receive` checks the chat, then drives guard,
//! persistence, summary update and notify.

use thiserror::Error;

use crate::{
    domain::{
        chat::ChatType,
        connection::{ConnectionUpdate, MessageStatus, NewMessageCountAction},
        content::{ContentType, MessageData},
        message::InboundMessage,
    },
    usecases::contracts::{
        ConnectionStore, DuplicateGuard, MessageStore, Notifier, PermissionsSource, StoreError,
    },
};

const RECEIVE_DUPLICATE_SKIPPED: &str = "RECEIVE_DUPLICATE_SKIPPED";
const RECEIVE_PROCESSED: &str = "RECEIVE_PROCESSED";
const RECEIVE_ROLLBACK_FAILED: &str = "RECEIVE_ROLLBACK_FAILED";

/// Content-type specific behavior of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveAction<'a> {
    data: &'a MessageData,
}

impl<'a> ReceiveAction<'a> {
    pub fn select(data: &'a MessageData) -> Self {
        Self { data }
    }

    pub fn content_type(&self) -> ContentType {
        self.data.content_type()
    }

    pub fn preview_text(&self) -> String {
        self.data.preview_text()
    }

    pub fn notification_body(&self) -> String {
        match self.data {
            MessageData::ContactBundle(params) => format!(
                "contact of {} has been shared with you",
                params.bundle.name
            ),
            data => data.preview_text(),
        }
    }
}

/// Collaborators used by the receive pipeline.
pub struct ReceivePorts<'a> {
    pub guard: &'a dyn DuplicateGuard,
    pub messages: &'a dyn MessageStore,
    pub connections: &'a dyn ConnectionStore,
    pub permissions: &'a dyn PermissionsSource,
    pub notifier: &'a dyn Notifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The message was already processed; nothing was written.
    Duplicate,
    Processed { notified: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("failed to load connection: {0}")]
    Connection(#[source] StoreError),
    #[error("chat {chat_id} is a {} chat, not a direct one", .chat_type.as_str())]
    NotDirectChat { chat_id: String, chat_type: ChatType },
    #[error("failed to read chat permissions: {0}")]
    Permissions(#[source] StoreError),
    #[error("duplicate check failed: {0}")]
    Guard(#[source] StoreError),
    #[error("failed to save message: {0}")]
    Persist(#[source] StoreError),
    #[error("failed to update connection: {0}")]
    ConnectionUpdate(#[source] StoreError),
}

/// Runs one decrypted inbound message through the receive pipeline.
///
/// Every lookup happens before the first write. A failed summary update
/// discards the saved message so the message can be received again.
///
/// # Errors
/// Any collaborator failure stops the pipeline at that step.
pub fn perform_receive(
    ports: &ReceivePorts<'_>,
    message: &InboundMessage,
) -> Result<ReceiveOutcome, ReceiveError> {
    let action = ReceiveAction::select(&message.data);

    let connection = ports
        .connections
        .connection(&message.chat_id)
        .map_err(ReceiveError::Connection)?;
    if connection.chat_type != ChatType::Direct {
        return Err(ReceiveError::NotDirectChat {
            chat_id: message.chat_id.clone(),
            chat_type: connection.chat_type,
        });
    }

    let permissions = ports
        .permissions
        .chat_permissions(&message.chat_id, connection.chat_type)
        .map_err(ReceiveError::Permissions)?;

    let seen = ports
        .guard
        .already_processed(&message.chat_id, &message.message_id)
        .map_err(ReceiveError::Guard)?;
    if seen
        || !ports
            .messages
            .save_message(message)
            .map_err(ReceiveError::Persist)?
    {
        tracing::info!(
            code = RECEIVE_DUPLICATE_SKIPPED,
            chat_id = %message.chat_id,
            message_id = %message.message_id,
            "inbound message already processed"
        );
        return Ok(ReceiveOutcome::Duplicate);
    }

    let update = ConnectionUpdate {
        chat_id: message.chat_id.clone(),
        text: action.preview_text(),
        recent_message_type: action.content_type(),
        latest_message_id: message.message_id.clone(),
        read_status: MessageStatus::Latest,
        timestamp: message.received_at,
    };
    if let Err(error) = ports
        .connections
        .update_on_new_message(&update, NewMessageCountAction::Increment)
    {
        if let Err(rollback) = ports
            .messages
            .discard_message(&message.chat_id, &message.message_id)
        {
            tracing::error!(
                code = RECEIVE_ROLLBACK_FAILED,
                chat_id = %message.chat_id,
                message_id = %message.message_id,
                error = %rollback,
                "saved message could not be discarded"
            );
        }
        return Err(ReceiveError::ConnectionUpdate(error));
    }

    let notified = permissions.notifications;
    if notified {
        ports.notifier.display_simple_notification(
            &connection.name,
            &action.notification_body(),
            !connection.disconnected,
            &message.chat_id,
        );
    }

    tracing::info!(
        code = RECEIVE_PROCESSED,
        chat_id = %message.chat_id,
        message_id = %message.message_id,
        content_type = action.content_type().as_str(),
        notified,
        "inbound message processed"
    );

    Ok(ReceiveOutcome::Processed { notified })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::{
        chat::ChatPermissions,
        connection::Connection,
        content::{ContactBundle, ContactBundleParams, MediaParams, TextParams},
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Notification {
        title: String,
        body: String,
        should_alert: bool,
        chat_id: String,
    }

    #[derive(Default)]
    struct StubWorld {
        duplicate: bool,
        already_stored: bool,
        chat_type: ChatType,
        notifications_allowed: bool,
        disconnected: bool,
        fail_save: bool,
        fail_update: bool,
        fail_connection: bool,
        saved: RefCell<Vec<String>>,
        discarded: RefCell<Vec<String>>,
        updates: RefCell<Vec<(ConnectionUpdate, NewMessageCountAction)>>,
        permission_lookups: RefCell<Vec<(String, ChatType)>>,
        notifications: RefCell<Vec<Notification>>,
    }

    impl DuplicateGuard for StubWorld {
        fn already_processed(&self, _chat_id: &str, _message_id: &str) -> Result<bool, StoreError> {
            Ok(self.duplicate)
        }
    }

    impl MessageStore for StubWorld {
        fn save_message(&self, message: &InboundMessage) -> Result<bool, StoreError> {
            if self.fail_save {
                return Err(StoreError::Unavailable("disk full".to_owned()));
            }
            if self.already_stored {
                return Ok(false);
            }
            self.saved.borrow_mut().push(message.message_id.clone());
            Ok(true)
        }

        fn discard_message(&self, _chat_id: &str, message_id: &str) -> Result<(), StoreError> {
            self.discarded.borrow_mut().push(message_id.to_owned());
            Ok(())
        }
    }

    impl ConnectionStore for StubWorld {
        fn connection(&self, chat_id: &str) -> Result<Connection, StoreError> {
            if self.fail_connection {
                return Err(StoreError::ChatNotFound(chat_id.to_owned()));
            }
            Ok(Connection {
                chat_id: chat_id.to_owned(),
                name: "Alice".to_owned(),
                chat_type: self.chat_type,
                disconnected: self.disconnected,
                summary: Default::default(),
            })
        }

        fn update_on_new_message(
            &self,
            update: &ConnectionUpdate,
            count_action: NewMessageCountAction,
        ) -> Result<(), StoreError> {
            if self.fail_update {
                return Err(StoreError::Unavailable("locked".to_owned()));
            }
            self.updates
                .borrow_mut()
                .push((update.clone(), count_action));
            Ok(())
        }
    }

    impl PermissionsSource for StubWorld {
        fn chat_permissions(
            &self,
            chat_id: &str,
            chat_type: ChatType,
        ) -> Result<ChatPermissions, StoreError> {
            self.permission_lookups
                .borrow_mut()
                .push((chat_id.to_owned(), chat_type));
            Ok(ChatPermissions {
                notifications: self.notifications_allowed,
                ..ChatPermissions::default()
            })
        }
    }

    impl Notifier for StubWorld {
        fn display_simple_notification(
            &self,
            title: &str,
            body: &str,
            should_alert: bool,
            chat_id: &str,
        ) {
            self.notifications.borrow_mut().push(Notification {
                title: title.to_owned(),
                body: body.to_owned(),
                should_alert,
                chat_id: chat_id.to_owned(),
            });
        }
    }

    fn ports(world: &StubWorld) -> ReceivePorts<'_> {
        ReceivePorts {
            guard: world,
            messages: world,
            connections: world,
            permissions: world,
            notifier: world,
        }
    }

    fn contact_bundle_message() -> InboundMessage {
        InboundMessage {
            chat_id: "chat-a".to_owned(),
            message_id: "msg-1".to_owned(),
            reply_id: None,
            received_at: Utc.with_ymd_and_hms(2026, 5, 4, 10, 30, 0).unwrap(),
            data: MessageData::ContactBundle(ContactBundleParams {
                bundle: ContactBundle {
                    name: "Bob".to_owned(),
                    bundle_id: "bundle-9".to_owned(),
                },
            }),
        }
    }

    fn text_message() -> InboundMessage {
        InboundMessage {
            data: MessageData::Text(TextParams {
                text: "see you".to_owned(),
            }),
            ..contact_bundle_message()
        }
    }

    fn assert_untouched(world: &StubWorld) {
        assert!(world.saved.borrow().is_empty());
        assert!(world.updates.borrow().is_empty());
        assert!(world.notifications.borrow().is_empty());
    }

    #[test]
    fn contact_bundle_notification_names_shared_contact() {
        let world = StubWorld {
            notifications_allowed: true,
            ..StubWorld::default()
        };

        let outcome =
            perform_receive(&ports(&world), &contact_bundle_message()).expect("receive succeeds");

        assert_eq!(outcome, ReceiveOutcome::Processed { notified: true });
        assert_eq!(
            *world.notifications.borrow(),
            vec![Notification {
                title: "Alice".to_owned(),
                body: "contact of Bob has been shared with you".to_owned(),
                should_alert: true,
                chat_id: "chat-a".to_owned(),
            }]
        );
    }

    #[test]
    fn persists_and_updates_summary_with_increment() {
        let world = StubWorld::default();
        let message = text_message();

        perform_receive(&ports(&world), &message).expect("receive succeeds");

        assert_eq!(*world.saved.borrow(), vec!["msg-1".to_owned()]);
        let updates = world.updates.borrow();
        assert_eq!(updates.len(), 1);
        let (update, action) = &updates[0];
        assert_eq!(*action, NewMessageCountAction::Increment);
        assert_eq!(update.text, "see you");
        assert_eq!(update.read_status, MessageStatus::Latest);
        assert_eq!(update.recent_message_type, ContentType::Text);
        assert_eq!(update.latest_message_id, "msg-1");
        assert_eq!(update.timestamp, message.received_at);
    }

    #[test]
    fn duplicate_message_is_neither_saved_nor_notified() {
        let world = StubWorld {
            duplicate: true,
            notifications_allowed: true,
            ..StubWorld::default()
        };

        let outcome =
            perform_receive(&ports(&world), &text_message()).expect("receive succeeds");

        assert_eq!(outcome, ReceiveOutcome::Duplicate);
        assert_untouched(&world);
    }

    #[test]
    fn message_stored_by_a_concurrent_receive_counts_as_duplicate() {
        let world = StubWorld {
            already_stored: true,
            notifications_allowed: true,
            ..StubWorld::default()
        };

        let outcome =
            perform_receive(&ports(&world), &text_message()).expect("receive succeeds");

        assert_eq!(outcome, ReceiveOutcome::Duplicate);
        assert_untouched(&world);
    }

    #[test]
    fn muted_chat_is_not_notified() {
        let world = StubWorld::default();

        let outcome =
            perform_receive(&ports(&world), &text_message()).expect("receive succeeds");

        assert_eq!(outcome, ReceiveOutcome::Processed { notified: false });
        assert!(world.notifications.borrow().is_empty());
        assert_eq!(
            *world.permission_lookups.borrow(),
            vec![("chat-a".to_owned(), ChatType::Direct)]
        );
    }

    #[test]
    fn disconnected_connection_notifies_without_alert() {
        let world = StubWorld {
            notifications_allowed: true,
            disconnected: true,
            ..StubWorld::default()
        };

        perform_receive(&ports(&world), &text_message()).expect("receive succeeds");

        let notifications = world.notifications.borrow();
        assert_eq!(notifications.len(), 1);
        assert!(!notifications[0].should_alert);
        assert_eq!(notifications[0].body, "see you");
    }

    #[test]
    fn group_chat_is_rejected_before_any_write() {
        let world = StubWorld {
            chat_type: ChatType::Group,
            notifications_allowed: true,
            ..StubWorld::default()
        };

        let result = perform_receive(&ports(&world), &text_message());

        assert_eq!(
            result,
            Err(ReceiveError::NotDirectChat {
                chat_id: "chat-a".to_owned(),
                chat_type: ChatType::Group,
            })
        );
        assert!(world.permission_lookups.borrow().is_empty());
        assert_untouched(&world);
    }

    #[test]
    fn unknown_chat_is_rejected_before_any_write() {
        let world = StubWorld {
            fail_connection: true,
            ..StubWorld::default()
        };

        let result = perform_receive(&ports(&world), &text_message());

        assert_eq!(
            result,
            Err(ReceiveError::Connection(StoreError::ChatNotFound(
                "chat-a".to_owned()
            )))
        );
        assert_untouched(&world);
    }

    #[test]
    fn save_failure_stops_pipeline() {
        let world = StubWorld {
            fail_save: true,
            notifications_allowed: true,
            ..StubWorld::default()
        };

        let result = perform_receive(&ports(&world), &text_message());

        assert_eq!(
            result,
            Err(ReceiveError::Persist(StoreError::Unavailable(
                "disk full".to_owned()
            )))
        );
        assert_untouched(&world);
    }

    #[test]
    fn failed_summary_update_discards_saved_message() {
        let world = StubWorld {
            fail_update: true,
            notifications_allowed: true,
            ..StubWorld::default()
        };

        let result = perform_receive(&ports(&world), &text_message());

        assert_eq!(
            result,
            Err(ReceiveError::ConnectionUpdate(StoreError::Unavailable(
                "locked".to_owned()
            )))
        );
        assert_eq!(*world.discarded.borrow(), vec!["msg-1".to_owned()]);
        assert!(world.notifications.borrow().is_empty());
    }

    #[test]
    fn non_contact_payloads_use_preview_as_notification_body() {
        let data = MessageData::Image(MediaParams {
            file_name: "p.jpg".to_owned(),
            file_uri: "file:///p.jpg".to_owned(),
            mime_type: "image/jpeg".to_owned(),
            caption: Some("beach".to_owned()),
        });

        let action = ReceiveAction::select(&data);

        assert_eq!(action.content_type(), ContentType::Image);
        assert_eq!(action.preview_text(), "📷 beach");
        assert_eq!(action.notification_body(), "📷 beach");
    }
}
