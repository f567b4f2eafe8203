//! Repository traits for data access
//!
//! The config store is an external collaborator; the core only reads and
//! writes whole entries by id through this trait.

mod memory;

use async_trait::async_trait;

use crate::domain::{ServerCatalog, ServerConfig};

pub use memory::InMemoryConfigStore;

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Durable key-value store of server configs
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All configured servers, in the store's iteration order
    async fn list(&self) -> RepoResult<ServerCatalog>;

    /// Get a config by id
    async fn get(&self, id: &str) -> RepoResult<Option<ServerConfig>>;

    /// Insert or replace the config for an id
    async fn upsert(&self, id: &str, config: &ServerConfig) -> RepoResult<()>;

    /// Delete the config for an id; deleting a missing id is not an error
    async fn delete(&self, id: &str) -> RepoResult<()>;
}
