//! Outbox spool: the hand-off point between the router and the transport.
//!
//! Each path writes envelopes to its own outbox directory, one TOML file per
//! message id. A transport process drains those directories.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        chat::ChatType,
        message::{OnUpdateSuccess, OutgoingMessage},
    },
    infra::{local_store::validate_id, storage_layout::StorageLayout},
    usecases::contracts::{DeliveryError, DeliveryPath},
};

const MESSAGE_SPOOLED: &str = "MESSAGE_SPOOLED";
const MESSAGE_SPOOL_FAILED: &str = "MESSAGE_SPOOL_FAILED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpooledMessage {
    pub attempts: u32,
    pub spooled_at: DateTime<Utc>,
    pub message: OutgoingMessage,
}

#[derive(Debug, Clone)]
pub struct SpoolDelivery {
    chat_type: ChatType,
    dir: PathBuf,
}

impl SpoolDelivery {
    pub fn new(layout: &StorageLayout, chat_type: ChatType) -> Self {
        let dir = match chat_type {
            ChatType::Direct => layout.direct_outbox(),
            ChatType::Group => layout.group_outbox(),
        };
        Self { chat_type, dir }
    }

    fn path_for(&self, message_id: &str) -> Result<PathBuf, DeliveryError> {
        validate_id(message_id).map_err(|error| DeliveryError::Rejected(error.to_string()))?;
        Ok(self.dir.join(format!("{message_id}.toml")))
    }

    fn spool(&self, message: &OutgoingMessage, retry: bool) -> Result<u32, DeliveryError> {
        let path = self.path_for(&message.message_id)?;
        let existing = read_spooled(&path)?;
        if !retry && existing.is_some() {
            return Err(DeliveryError::Rejected(format!(
                "message {} is already spooled",
                message.message_id
            )));
        }
        let previous_attempts = existing.map_or(0, |spooled| spooled.attempts);

        let mut message = message.clone();
        if self.chat_type == ChatType::Direct {
            message.single_recipient = None;
        }

        let spooled = SpooledMessage {
            attempts: previous_attempts.saturating_add(1),
            spooled_at: Utc::now(),
            message,
        };
        let raw = toml::to_string(&spooled)
            .map_err(|error| DeliveryError::Rejected(error.to_string()))?;

        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, raw)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|error| DeliveryError::Unavailable(format!("{}: {error}", path.display())))?;

        Ok(spooled.attempts)
    }

    fn deliver(
        &self,
        message: &OutgoingMessage,
        retry: bool,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), DeliveryError> {
        let result = self.spool(message, retry);

        match &result {
            Ok(attempts) => tracing::info!(
                code = MESSAGE_SPOOLED,
                chat_type = self.chat_type.as_str(),
                message_id = %message.message_id,
                attempts,
                "message spooled for delivery"
            ),
            Err(error) => tracing::warn!(
                code = MESSAGE_SPOOL_FAILED,
                chat_type = self.chat_type.as_str(),
                message_id = %message.message_id,
                error = %error,
                "message could not be spooled"
            ),
        }

        if let Some(callback) = on_update_success {
            callback(result.is_ok());
        }

        result.map(|_| ())
    }
}

impl DeliveryPath for SpoolDelivery {
    fn send(
        &self,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), DeliveryError> {
        self.deliver(message, false, on_update_success)
    }

    fn retry(
        &self,
        message: &OutgoingMessage,
        on_update_success: OnUpdateSuccess<'_>,
    ) -> Result<(), DeliveryError> {
        self.deliver(message, true, on_update_success)
    }
}

/// Looks a message up in both outboxes.
pub fn find_spooled(
    layout: &StorageLayout,
    message_id: &str,
) -> Result<Option<SpooledMessage>, DeliveryError> {
    validate_id(message_id).map_err(|error| DeliveryError::Rejected(error.to_string()))?;
    let file_name = format!("{message_id}.toml");

    for dir in [layout.direct_outbox(), layout.group_outbox()] {
        if let Some(spooled) = read_spooled(&dir.join(&file_name))? {
            return Ok(Some(spooled));
        }
    }

    Ok(None)
}

fn read_spooled(path: &Path) -> Result<Option<SpooledMessage>, DeliveryError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(DeliveryError::Unavailable(format!(
                "{}: {error}",
                path.display()
            )))
        }
    };

    toml::from_str(&raw)
        .map(Some)
        .map_err(|error| DeliveryError::Rejected(format!("{}: {error}", path.display())))
}
