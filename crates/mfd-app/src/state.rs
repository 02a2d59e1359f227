use std::path::PathBuf;
use std::sync::Arc;

use mfd_dal::Pool;
use url::Url;

use crate::cache::Cache;
use crate::error::ApiResult;
use crate::store::file_store::FileStore;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool, store: FileStore, cache: Cache) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                pool,
                app_config,
                store,
                cache,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn build_url(&self, relative_url: &str) -> ApiResult<Url> {
        let base = &self.config().base_url;
        let url = base
            .join(relative_url)
            .map_err(|e| crate::error::ApiError::InternalError(e.to_string()))?;
        Ok(url)
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn store(&self) -> &FileStore {
        &self.state.store
    }

    pub fn cache(&self) -> &Cache {
        &self.state.cache
    }
}

struct AppStateInner {
    pool: Pool,
    app_config: AppConfig,
    store: FileStore,
    cache: Cache,
}

pub struct AppConfig {
    pub base_url: Url,
    pub media_dir: PathBuf,
}
