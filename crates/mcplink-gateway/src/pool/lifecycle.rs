//! ConnectionManager - per-server connection lifecycle
//!
//! Persisted config lives in the `ConfigStore`; runtime state lives in the
//! `ConnectionRegistry`. Status reads merge the two.
//!
//! - `add` / `restart_all` / `initialize_all` write `Initializing` and connect
//!   in a background task, so a status read right after them may still see
//!   `Initializing`.
//! - `pause` / `remove` / `resume` finish their teardown or connect before
//!   returning. Operations on the same id run one at a time, so a `pause`
//!   issued during a `resume` applies after it.
//! - Connection failures become `Error` entries; only `resume` returns them.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mcplink_core::{
    ConfigStore, DisplayStatus, McpError, McpResult, ServerCatalog, ServerConfig, ServerStatus,
};
use mcplink_mcp::{ClientOptions, McpClient, Tool, TransportFactory};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::registry::{resolve_display_status, ConnectionRegistry, ConnectionState};

pub struct ConnectionManager {
    store: Arc<dyn ConfigStore>,
    registry: Arc<ConnectionRegistry>,
    factory: Arc<TransportFactory>,
    /// Per-id lock held by add / pause / resume / remove
    operations: DashMap<String, Arc<Mutex<()>>>,
}

impl ConnectionManager {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        registry: Arc<ConnectionRegistry>,
        factory: Arc<TransportFactory>,
    ) -> Self {
        Self {
            store,
            registry,
            factory,
            operations: DashMap::new(),
        }
    }

    /// Manager with a fresh registry and a factory built from `options`
    pub fn with_options(store: Arc<dyn ConfigStore>, options: ClientOptions) -> McpResult<Self> {
        Ok(Self::new(
            store,
            Arc::new(ConnectionRegistry::new()),
            Arc::new(TransportFactory::new(options)?),
        ))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn factory(&self) -> &Arc<TransportFactory> {
        &self.factory
    }

    async fn lock_server(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = self.operations.entry(id.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    async fn catalog(&self) -> McpResult<ServerCatalog> {
        Ok(self.store.list().await?)
    }

    async fn require_config(&self, id: &str) -> McpResult<ServerConfig> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| McpError::NotFound(id.to_string()))
    }

    // =========================================================================
    // Status reads
    // =========================================================================

    /// Display status of every configured server, in store order
    pub async fn get_status(&self) -> McpResult<Vec<(String, DisplayStatus)>> {
        let catalog = self.catalog().await?;
        Ok(catalog
            .iter()
            .map(|(id, config)| {
                let state = self.registry.get(id);
                (id.to_string(), resolve_display_status(config, state.as_ref()))
            })
            .collect())
    }

    /// Display status of one server; `Undefined` when it is not configured
    pub async fn get_client_status(&self, id: &str) -> McpResult<DisplayStatus> {
        Ok(match self.store.get(id).await? {
            Some(config) => resolve_display_status(&config, self.registry.get(id).as_ref()),
            None => DisplayStatus::Undefined,
        })
    }

    /// Cached tool list of an active server
    pub fn get_client_tools(&self, id: &str) -> Option<Arc<Vec<Tool>>> {
        self.registry.get(id).and_then(|state| state.tools().cloned())
    }

    /// Tool list (or `None`) for every registry entry
    pub fn get_all_tools(&self) -> Vec<(String, Option<Arc<Vec<Tool>>>)> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|(id, state)| {
                let tools = state.tools().cloned();
                (id, tools)
            })
            .collect()
    }

    /// Number of registry entries that are not in error
    pub fn available_clients_count(&self) -> usize {
        self.registry
            .snapshot()
            .iter()
            .filter(|(_, state)| !state.is_error())
            .count()
    }

    /// Wait for a pending initialization of `id` to finish
    pub async fn wait_until_settled(&self, id: &str, timeout: Duration) -> McpResult<DisplayStatus> {
        self.registry.wait_until_settled(id, timeout).await;
        self.get_client_status(id).await
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Insert or update a server config and connect it when appropriate.
    ///
    /// A new id without a status is stored as active. New ids and active
    /// configs are (re)initialized; an update to paused tears the connection
    /// down. Connection failures land in the registry, not in the result.
    pub async fn add(&self, id: &str, mut config: ServerConfig) -> McpResult<ServerCatalog> {
        let _guard = self.lock_server(id).await;
        let is_new = self.store.get(id).await?.is_none();
        if is_new && config.status.is_none() {
            config.status = Some(ServerStatus::Active);
        }

        self.store.upsert(id, &config).await?;
        info!(
            server_id = %id,
            is_new,
            status = config.status.map(|s| s.as_str()).unwrap_or("unset"),
            "Server config saved"
        );

        if config.is_paused() {
            self.teardown(id).await;
        } else if is_new || config.status == Some(ServerStatus::Active) {
            self.initialize_single_client(id, config);
        }

        self.catalog().await
    }

    /// Persist paused, then close the transport and drop the registry entry
    pub async fn pause(&self, id: &str) -> McpResult<ServerCatalog> {
        let _guard = self.lock_server(id).await;
        let config = self.require_config(id).await?;
        self.store
            .upsert(id, &config.with_status(ServerStatus::Paused))
            .await?;

        self.teardown(id).await;
        info!(server_id = %id, "Server paused");
        self.catalog().await
    }

    /// Connect now and report the outcome.
    ///
    /// Nothing is written to the registry until the connection attempt is
    /// over. Success persists active and installs the client; failure
    /// persists error, records it in the registry and returns it.
    pub async fn resume(&self, id: &str) -> McpResult<()> {
        let _guard = self.lock_server(id).await;
        let config = self.require_config(id).await?;

        match connect_and_list(&self.factory, id, &config).await {
            Ok(state) => {
                if let Err(e) = self
                    .store
                    .upsert(id, &config.with_status(ServerStatus::Active))
                    .await
                {
                    close_state(Some(state)).await;
                    return Err(e.into());
                }
                let (_, previous) = self.registry.install(id, state);
                close_state(previous).await;
                info!(server_id = %id, "Server resumed");
                Ok(())
            }
            Err(e) => {
                self.store
                    .upsert(id, &config.with_status(ServerStatus::Error))
                    .await?;
                let (_, previous) = self
                    .registry
                    .install(id, ConnectionState::Error(e.to_string()));
                close_state(previous).await;
                warn!(server_id = %id, error = %e, "Server resume failed");
                Err(e)
            }
        }
    }

    /// Close the transport, drop the registry entry and delete the config.
    ///
    /// Removing an unknown id is a no-op.
    pub async fn remove(&self, id: &str) -> McpResult<ServerCatalog> {
        let _guard = self.lock_server(id).await;
        self.teardown(id).await;
        self.store.delete(id).await?;
        info!(server_id = %id, "Server removed");
        self.catalog().await
    }

    /// Close everything, clear the registry and reinitialize every configured server.
    ///
    /// Paused servers are skipped by the initialize primitive.
    pub async fn restart_all(&self) -> McpResult<ServerCatalog> {
        info!("Restarting all clients");
        for (id, state) in self.registry.drain() {
            debug!(server_id = %id, state = state.label(), "Dropping connection for restart");
            close_state(Some(state)).await;
        }

        let catalog = self.catalog().await?;
        for (id, config) in catalog.iter() {
            self.initialize_single_client(id, config.clone());
        }
        Ok(catalog)
    }

    /// One-shot bootstrap: initialize every configured server unless the
    /// registry already holds entries.
    pub async fn initialize_all(&self) -> McpResult<ServerCatalog> {
        let catalog = self.catalog().await?;
        if !self.registry.is_empty() {
            info!("Connection registry already populated, skipping initialization");
            return Ok(catalog);
        }

        info!(servers = catalog.len(), "Initializing configured servers");
        for (id, config) in catalog.iter() {
            self.initialize_single_client(id, config.clone());
        }
        Ok(catalog)
    }

    /// Per-id initialize primitive.
    ///
    /// No-op for paused configs. Otherwise writes `Initializing` before
    /// returning and spawns the handshake; the task's only effect is the
    /// final registry write. Must be called from within a tokio runtime.
    pub fn initialize_single_client(&self, id: &str, config: ServerConfig) -> Option<JoinHandle<()>> {
        if config.is_paused() {
            debug!(server_id = %id, "Skipping initialization for paused server");
            return None;
        }

        info!(
            server_id = %id,
            name = %config.display_name(id),
            transport = %config.transport_type,
            "Initializing client"
        );
        let (generation, previous) = self.registry.begin(id);

        let registry = Arc::clone(&self.registry);
        let factory = Arc::clone(&self.factory);
        let id = id.to_string();

        Some(tokio::spawn(async move {
            close_state(previous).await;

            let state = match connect_and_list(&factory, &id, &config).await {
                Ok(state) => {
                    info!(
                        server_id = %id,
                        tools = state.tools().map(|t| t.len()).unwrap_or(0),
                        "Client initialized"
                    );
                    state
                }
                Err(e) => {
                    error!(server_id = %id, error = %e, "Failed to initialize client");
                    ConnectionState::Error(e.to_string())
                }
            };

            if let Err(stale) = registry.complete(&id, generation, state) {
                debug!(server_id = %id, generation, "Dropping stale initialization result");
                close_state(Some(stale)).await;
            }
        }))
    }

    /// Opaque JSON-RPC passthrough to an active server
    pub async fn execute(&self, id: &str, request: Value) -> McpResult<Value> {
        let client = self
            .registry
            .get(id)
            .and_then(ConnectionState::into_client)
            .ok_or_else(|| McpError::NotFound(id.to_string()))?;

        let method = request
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("-");
        debug!(server_id = %id, method = %method, "Executing request");
        client.execute(request).await
    }

    async fn teardown(&self, id: &str) {
        if let Some(state) = self.registry.remove(id) {
            debug!(server_id = %id, state = state.label(), "Connection removed");
            close_state(Some(state)).await;
        }
    }
}

/// Connect, handshake and fetch tools; the client is closed if listing fails
async fn connect_and_list(
    factory: &TransportFactory,
    id: &str,
    config: &ServerConfig,
) -> McpResult<ConnectionState> {
    let client = factory.connect(id, config).await?;
    match client.list_tools().await {
        Ok(tools) => Ok(ConnectionState::Active {
            client: Arc::new(client),
            tools: Arc::new(tools),
        }),
        Err(e) => {
            client.close().await;
            Err(e)
        }
    }
}

async fn close_state(state: Option<ConnectionState>) {
    if let Some(client) = state.and_then(ConnectionState::into_client) {
        close_client(&client).await;
    }
}

async fn close_client(client: &McpClient) {
    client.close().await;
    debug!(server_id = %client.server_id(), "Transport closed");
}
