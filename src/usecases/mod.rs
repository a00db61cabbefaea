//! Use case layer: messaging workflows and the collaborator traits they use.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod list_chats;
pub mod receive_message;
pub mod send_message;
