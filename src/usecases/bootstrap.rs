use std::path::Path;

use crate::{
    infra::{self, error::AppError, local_store::LocalStore, storage_layout::StorageLayout},
    usecases::context::AppContext,
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;
    let logging = infra::logging::init(&config.logging)?;
    let context = build_context(config, Some(logging))?;

    tracing::debug!(
        data_dir = %context.layout().data_dir.display(),
        "storage opened"
    );

    Ok(context)
}

pub fn build_context(
    config: infra::config::AppConfig,
    logging: Option<infra::logging::LoggingGuard>,
) -> Result<AppContext, AppError> {
    let layout = StorageLayout::resolve(&config.storage)?;
    let store = LocalStore::open(layout)?;

    Ok(AppContext::new(config, store, logging))
}
