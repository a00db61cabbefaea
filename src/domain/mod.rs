//! Domain layer: message, content and connection entities.

pub mod chat;
pub mod connection;
pub mod content;
pub mod message;
