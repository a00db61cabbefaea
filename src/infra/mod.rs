//! Infrastructure layer: adapters for config, logging, storage and delivery.

pub mod config;
pub mod error;
pub mod local_store;
pub mod logging;
pub mod notifier;
pub mod spool;
pub mod storage_layout;
