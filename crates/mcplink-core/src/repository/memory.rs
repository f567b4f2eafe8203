use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ConfigStore, RepoResult};
use crate::domain::{ServerCatalog, ServerConfig};

/// Process-local config store
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    catalog: RwLock<ServerCatalog>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: ServerCatalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn list(&self) -> RepoResult<ServerCatalog> {
        Ok(self.catalog.read().clone())
    }

    async fn get(&self, id: &str) -> RepoResult<Option<ServerConfig>> {
        Ok(self.catalog.read().get(id).cloned())
    }

    async fn upsert(&self, id: &str, config: &ServerConfig) -> RepoResult<()> {
        self.catalog.write().upsert(id, config.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        self.catalog.write().remove(id);
        Ok(())
    }
}
