//! File-backed store for connections, permissions and received messages.
//!
//! Connections live in a single `connections.toml`; every received message
//! is one TOML file under `messages/<chat_id>/`. Every write holds an
//! exclusive lock on `store.lock`.

use std::{
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        chat::{ChatPermissions, ChatType},
        connection::{Connection, ConnectionUpdate, NewMessageCountAction},
        message::InboundMessage,
    },
    infra::{error::AppError, storage_layout::StorageLayout},
    usecases::contracts::{
        ChatKindResolver, ConnectionListSource, ConnectionStore, DuplicateGuard, MessageStore,
        PermissionsSource, StoreError,
    },
};

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConnectionsFile {
    #[serde(default, rename = "connection")]
    connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConnectionRecord {
    #[serde(flatten)]
    connection: Connection,
    #[serde(default)]
    permissions: ChatPermissions,
}

impl ConnectionsFile {
    fn find(&self, chat_id: &str) -> Result<&ConnectionRecord, StoreError> {
        self.connections
            .iter()
            .find(|record| record.connection.chat_id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_owned()))
    }

    fn find_mut(&mut self, chat_id: &str) -> Result<&mut ConnectionRecord, StoreError> {
        self.connections
            .iter_mut()
            .find(|record| record.connection.chat_id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_owned()))
    }
}

/// Rejects ids that could escape the data directory when used as a path segment.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    layout: StorageLayout,
}

impl LocalStore {
    pub fn open(layout: StorageLayout) -> Result<Self, AppError> {
        layout.ensure_dirs()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Registers a chat, or updates name, kind, flags and permissions of a
    /// known one while keeping its summary.
    pub fn add_connection(
        &self,
        connection: Connection,
        permissions: ChatPermissions,
    ) -> Result<(), StoreError> {
        validate_id(&connection.chat_id)?;

        self.with_lock(|| {
            let mut file = self.read_connections()?;
            match file.find_mut(&connection.chat_id) {
                Ok(record) => {
                    record.connection.name = connection.name;
                    record.connection.chat_type = connection.chat_type;
                    record.connection.disconnected = connection.disconnected;
                    record.permissions = permissions;
                }
                Err(_) => file.connections.push(ConnectionRecord {
                    connection,
                    permissions,
                }),
            }
            self.write_connections(&file)
        })
    }

    fn message_path(&self, chat_id: &str, message_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(chat_id)?;
        validate_id(message_id)?;
        Ok(self
            .layout
            .chat_messages_dir(chat_id)
            .join(format!("{message_id}.toml")))
    }

    fn read_connections(&self) -> Result<ConnectionsFile, StoreError> {
        let path = self.layout.connections_file();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(ConnectionsFile::default())
            }
            Err(error) => return Err(unavailable(&path, error)),
        };

        toml::from_str(&raw)
            .map_err(|error| StoreError::Corrupt(format!("{}: {error}", path.display())))
    }

    fn write_connections(&self, file: &ConnectionsFile) -> Result<(), StoreError> {
        let path = self.layout.connections_file();
        let raw = toml::to_string(file).map_err(|error| StoreError::Corrupt(error.to_string()))?;
        write_atomically(&path, &raw)
    }

    fn with_lock<T>(
        &self,
        action: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock_path = self.layout.lock_file();
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|error| unavailable(&lock_path, error))?;
        FileExt::lock_exclusive(&lock).map_err(|error| unavailable(&lock_path, error))?;

        let result = action();

        if let Err(error) = FileExt::unlock(&lock) {
            tracing::warn!(error = %error, "failed to release store lock");
        }
        result
    }
}

impl ChatKindResolver for LocalStore {
    fn is_group_chat(&self, chat_id: &str) -> Result<bool, StoreError> {
        let file = self.read_connections()?;
        Ok(file.find(chat_id)?.connection.chat_type == ChatType::Group)
    }
}

impl ConnectionStore for LocalStore {
    fn connection(&self, chat_id: &str) -> Result<Connection, StoreError> {
        let file = self.read_connections()?;
        Ok(file.find(chat_id)?.connection.clone())
    }

    fn update_on_new_message(
        &self,
        update: &ConnectionUpdate,
        count_action: NewMessageCountAction,
    ) -> Result<(), StoreError> {
        self.with_lock(|| {
            let mut file = self.read_connections()?;
            file.find_mut(&update.chat_id)?
                .connection
                .summary
                .apply(update, count_action);
            self.write_connections(&file)
        })
    }
}

impl PermissionsSource for LocalStore {
    fn chat_permissions(
        &self,
        chat_id: &str,
        chat_type: ChatType,
    ) -> Result<ChatPermissions, StoreError> {
        let file = self.read_connections()?;
        let record = file.find(chat_id)?;

        // Permissions are kept per chat kind; a kind mismatch means no such chat.
        if record.connection.chat_type != chat_type {
            return Err(StoreError::ChatNotFound(chat_id.to_owned()));
        }

        Ok(record.permissions)
    }
}

impl MessageStore for LocalStore {
    /// Saves the message under the store lock. Only registered chats accept
    /// messages, and an existing message file is left untouched.
    fn save_message(&self, message: &InboundMessage) -> Result<bool, StoreError> {
        let path = self.message_path(&message.chat_id, &message.message_id)?;
        let raw = toml::to_string(message).map_err(|error| StoreError::Corrupt(error.to_string()))?;

        self.with_lock(|| {
            self.read_connections()?.find(&message.chat_id)?;
            if path.exists() {
                return Ok(false);
            }
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|error| unavailable(dir, error))?;
            }
            write_atomically(&path, &raw)?;
            Ok(true)
        })
    }

    fn discard_message(&self, chat_id: &str, message_id: &str) -> Result<(), StoreError> {
        let path = self.message_path(chat_id, message_id)?;

        self.with_lock(|| match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(unavailable(&path, error)),
        })
    }
}

impl DuplicateGuard for LocalStore {
    /// A message counts as processed once its message file exists.
    fn already_processed(&self, chat_id: &str, message_id: &str) -> Result<bool, StoreError> {
        Ok(self.message_path(chat_id, message_id)?.exists())
    }
}

impl ConnectionListSource for LocalStore {
    fn connections(&self) -> Result<Vec<Connection>, StoreError> {
        Ok(self
            .read_connections()?
            .connections
            .into_iter()
            .map(|record| record.connection)
            .collect())
    }
}

fn write_atomically(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, contents).map_err(|error| unavailable(&tmp, error))?;
    fs::rename(&tmp, path).map_err(|error| unavailable(path, error))
}

fn unavailable(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::{
        connection::MessageStatus,
        content::{ContentType, MessageData, TextParams},
    };

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalStore::open(StorageLayout::at(dir.path())).expect("store opens");
        (dir, store)
    }

    fn connection(chat_id: &str, chat_type: ChatType) -> Connection {
        Connection {
            chat_id: chat_id.to_owned(),
            name: format!("name-{chat_id}"),
            chat_type,
            disconnected: false,
            summary: Default::default(),
        }
    }

    fn inbound(chat_id: &str, message_id: &str) -> InboundMessage {
        InboundMessage {
            chat_id: chat_id.to_owned(),
            message_id: message_id.to_owned(),
            reply_id: None,
            received_at: Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap(),
            data: MessageData::Text(TextParams {
                text: "ping".to_owned(),
            }),
        }
    }

    #[test]
    fn validate_id_rejects_path_segments() {
        let too_long = "x".repeat(129);

        assert!(validate_id("abc_DEF-123").is_ok());
        for bad in ["", "../etc", "a/b", "a.b", too_long.as_str()] {
            assert_eq!(validate_id(bad), Err(StoreError::InvalidId(bad.to_owned())));
        }
    }

    #[test]
    fn resolves_group_and_direct_chats() {
        let (_dir, store) = store();
        store
            .add_connection(connection("g1", ChatType::Group), ChatPermissions::default())
            .expect("add group");
        store
            .add_connection(connection("d1", ChatType::Direct), ChatPermissions::default())
            .expect("add direct");

        assert_eq!(store.is_group_chat("g1"), Ok(true));
        assert_eq!(store.is_group_chat("d1"), Ok(false));
        assert_eq!(
            store.is_group_chat("zz"),
            Err(StoreError::ChatNotFound("zz".to_owned()))
        );
    }

    #[test]
    fn update_on_new_message_persists_summary() {
        let (_dir, store) = store();
        store
            .add_connection(connection("d1", ChatType::Direct), ChatPermissions::default())
            .expect("add direct");
        let update = ConnectionUpdate {
            chat_id: "d1".to_owned(),
            text: "ping".to_owned(),
            recent_message_type: ContentType::Text,
            latest_message_id: "m1".to_owned(),
            read_status: MessageStatus::Latest,
            timestamp: Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap(),
        };

        store
            .update_on_new_message(&update, NewMessageCountAction::Increment)
            .expect("first update");
        store
            .update_on_new_message(&update, NewMessageCountAction::Increment)
            .expect("second update");

        let summary = store.connection("d1").expect("connection").summary;
        assert_eq!(summary.unread_count, 2);
        assert_eq!(summary.text, "ping");
        assert_eq!(summary.read_status, MessageStatus::Latest);
        assert_eq!(summary.timestamp, Some(update.timestamp));
    }

    #[test]
    fn re_adding_connection_keeps_summary() {
        let (_dir, store) = store();
        store
            .add_connection(connection("d1", ChatType::Direct), ChatPermissions::default())
            .expect("add direct");
        let update = ConnectionUpdate {
            chat_id: "d1".to_owned(),
            text: "hi".to_owned(),
            recent_message_type: ContentType::Text,
            latest_message_id: "m1".to_owned(),
            read_status: MessageStatus::Latest,
            timestamp: Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap(),
        };
        store
            .update_on_new_message(&update, NewMessageCountAction::Increment)
            .expect("update");

        let mut renamed = connection("d1", ChatType::Direct);
        renamed.name = "Renamed".to_owned();
        store
            .add_connection(renamed, ChatPermissions::default())
            .expect("re-add");

        let stored = store.connection("d1").expect("connection");
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.summary.unread_count, 1);
    }

    #[test]
    fn permissions_are_scoped_by_chat_type() {
        let (_dir, store) = store();
        let muted = ChatPermissions {
            notifications: false,
            ..ChatPermissions::default()
        };
        store
            .add_connection(connection("d1", ChatType::Direct), muted)
            .expect("add direct");

        assert_eq!(store.chat_permissions("d1", ChatType::Direct), Ok(muted));
        assert_eq!(
            store.chat_permissions("d1", ChatType::Group),
            Err(StoreError::ChatNotFound("d1".to_owned()))
        );
    }

    #[test]
    fn saved_message_marks_it_processed() {
        let (dir, store) = store();
        store
            .add_connection(connection("d1", ChatType::Direct), ChatPermissions::default())
            .expect("add direct");
        let message = inbound("d1", "m1");

        assert_eq!(store.already_processed("d1", "m1"), Ok(false));
        assert_eq!(store.save_message(&message), Ok(true));
        assert_eq!(store.already_processed("d1", "m1"), Ok(true));
        assert_eq!(store.already_processed("d1", "m2"), Ok(false));

        let raw = fs::read_to_string(dir.path().join("messages/d1/m1.toml")).expect("message file");
        let parsed: InboundMessage = toml::from_str(&raw).expect("message parses");
        assert_eq!(parsed, message);
    }

    #[test]
    fn second_save_of_same_message_keeps_first_copy() {
        let (dir, first) = store();
        let second = LocalStore::open(StorageLayout::at(dir.path())).expect("store opens");
        first
            .add_connection(connection("d1", ChatType::Direct), ChatPermissions::default())
            .expect("add direct");
        let original = inbound("d1", "m1");
        let mut replay = inbound("d1", "m1");
        replay.data = MessageData::Text(TextParams {
            text: "replayed".to_owned(),
        });

        assert_eq!(first.already_processed("d1", "m1"), Ok(false));
        assert_eq!(second.already_processed("d1", "m1"), Ok(false));
        assert_eq!(first.save_message(&original), Ok(true));
        assert_eq!(second.save_message(&replay), Ok(false));

        let raw = fs::read_to_string(dir.path().join("messages/d1/m1.toml")).expect("message file");
        let parsed: InboundMessage = toml::from_str(&raw).expect("message parses");
        assert_eq!(parsed, original);
    }

    #[test]
    fn save_message_refuses_unknown_chat() {
        let (dir, store) = store();

        assert_eq!(
            store.save_message(&inbound("nobody", "m1")),
            Err(StoreError::ChatNotFound("nobody".to_owned()))
        );
        assert!(!dir.path().join("messages/nobody").exists());
    }

    #[test]
    fn discarded_message_can_be_saved_again() {
        let (_dir, store) = store();
        store
            .add_connection(connection("d1", ChatType::Direct), ChatPermissions::default())
            .expect("add direct");
        let message = inbound("d1", "m1");
        store.save_message(&message).expect("save");

        store.discard_message("d1", "m1").expect("discard");
        store.discard_message("d1", "m1").expect("discard is idempotent");

        assert_eq!(store.already_processed("d1", "m1"), Ok(false));
        assert_eq!(store.save_message(&message), Ok(true));
    }

    #[test]
    fn corrupt_connections_file_is_reported() {
        let (dir, store) = store();
        fs::write(dir.path().join("connections.toml"), "[[connection]\n").expect("write");

        assert!(matches!(store.connections(), Err(StoreError::Corrupt(_))));
    }
}
