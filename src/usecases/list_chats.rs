use std::cmp::Ordering;

use thiserror::Error;

use crate::{
    domain::connection::Connection,
    usecases::contracts::{ConnectionListSource, StoreError},
};

const DEFAULT_CHAT_PAGE_SIZE: usize = 50;
const MAX_CHAT_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChatsQuery {
    pub limit: usize,
}

impl Default for ListChatsQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CHAT_PAGE_SIZE,
        }
    }
}

impl ListChatsQuery {
    fn normalized_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_CHAT_PAGE_SIZE,
            value if value > MAX_CHAT_PAGE_SIZE => MAX_CHAT_PAGE_SIZE,
            value => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChatsOutput {
    pub chats: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListChatsError {
    #[error("chat list temporarily unavailable: {0}")]
    TemporarilyUnavailable(String),
    #[error("chat list data is invalid: {0}")]
    DataContractViolation(String),
}

/// Lists connections, most recent activity first.
pub fn list_chats(
    source: &dyn ConnectionListSource,
    query: ListChatsQuery,
) -> Result<ListChatsOutput, ListChatsError> {
    let limit = query.normalized_limit();
    let mut chats = source.connections().map_err(map_source_error)?;

    chats.sort_by(compare_by_activity);
    chats.truncate(limit);

    Ok(ListChatsOutput { chats })
}

fn compare_by_activity(left: &Connection, right: &Connection) -> Ordering {
    match (left.summary.timestamp, right.summary.timestamp) {
        (Some(l), Some(r)) => r.cmp(&l),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.name.cmp(&right.name),
    }
}

fn map_source_error(error: StoreError) -> ListChatsError {
    match error {
        StoreError::Corrupt(details) => ListChatsError::DataContractViolation(details),
        other => ListChatsError::TemporarilyUnavailable(other.to_string()),
    }
}
