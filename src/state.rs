use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{self, Store};
use crate::storage::{self, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = db::connect(&config).await?;
        let storage = storage::from_config(&config.storage, &config.media_url).await?;
        Ok(Self::from_parts(store, config, storage))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            store,
            config,
            storage,
        }
    }
}
