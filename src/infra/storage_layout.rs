use std::{env, fs, path::PathBuf};

use crate::infra::{config::StorageConfig, error::AppError};

const APP_DIR_NAME: &str = "portmsg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub data_dir: PathBuf,
    pub messages_dir: PathBuf,
    pub outbox_dir: PathBuf,
}

impl StorageLayout {
    pub fn resolve(config: &StorageConfig) -> Result<Self, AppError> {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => env::var_os("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(dirs::data_dir)
                .map(|base| base.join(APP_DIR_NAME))
                .ok_or_else(|| AppError::StoragePathResolution {
                    details: "unable to resolve data directory (XDG_DATA_HOME/platform data dir)"
                        .into(),
                })?,
        };

        Ok(Self::at(data_dir))
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            messages_dir: data_dir.join("messages"),
            outbox_dir: data_dir.join("outbox"),
            data_dir,
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        for dir in [
            self.data_dir.clone(),
            self.messages_dir.clone(),
            self.direct_outbox(),
            self.group_outbox(),
        ] {
            fs::create_dir_all(&dir)
                .map_err(|source| AppError::StorageDirCreate { path: dir, source })?;
        }

        Ok(())
    }

    pub fn connections_file(&self) -> PathBuf {
        self.data_dir.join("connections.toml")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join("store.lock")
    }

    pub fn chat_messages_dir(&self, chat_id: &str) -> PathBuf {
        self.messages_dir.join(chat_id)
    }

    pub fn direct_outbox(&self) -> PathBuf {
        self.outbox_dir.join("direct")
    }

    pub fn group_outbox(&self) -> PathBuf {
        self.outbox_dir.join("group")
    }
}
