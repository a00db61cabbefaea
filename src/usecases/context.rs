use crate::infra::{
    config::AppConfig, local_store::LocalStore, logging::LoggingGuard,
    storage_layout::StorageLayout,
};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub store: LocalStore,
    _logging: Option<LoggingGuard>,
}

impl AppContext {
    pub fn new(config: AppConfig, store: LocalStore, logging: Option<LoggingGuard>) -> Self {
        Self {
            config,
            store,
            _logging: logging,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        self.store.layout()
    }
}
