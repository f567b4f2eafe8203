//! Connection Registry - runtime state per server id
//!
//! Single source of truth for connection status. Every write replaces a whole
//! entry and stamps it with a fresh generation taken from a monotonic counter.
//! Background initializations complete against the generation they started
//! with; a result whose generation is no longer current is handed back to the
//! caller instead of being installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mcplink_core::{DisplayStatus, ServerConfig};
use mcplink_mcp::{McpClient, Tool};
use tokio::sync::Notify;
use tracing::trace;

/// Runtime connection state of one server
#[derive(Debug, Clone)]
pub enum ConnectionState {
    /// Handshake in flight
    Initializing,
    /// Connected, with the tool list fetched right after the handshake
    Active {
        client: Arc<McpClient>,
        tools: Arc<Vec<Tool>>,
    },
    /// Last connection attempt failed
    Error(String),
}

impl ConnectionState {
    pub fn is_initializing(&self) -> bool {
        matches!(self, ConnectionState::Initializing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionState::Error(_))
    }

    pub fn client(&self) -> Option<&Arc<McpClient>> {
        match self {
            ConnectionState::Active { client, .. } => Some(client),
            _ => None,
        }
    }

    pub fn tools(&self) -> Option<&Arc<Vec<Tool>>> {
        match self {
            ConnectionState::Active { tools, .. } => Some(tools),
            _ => None,
        }
    }

    /// Consume the state, returning the live client if there is one
    pub fn into_client(self) -> Option<Arc<McpClient>> {
        match self {
            ConnectionState::Active { client, .. } => Some(client),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Initializing => "initializing",
            ConnectionState::Active { .. } => "active",
            ConnectionState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub generation: u64,
    pub state: ConnectionState,
}

/// Map of server id to connection state
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<String, RegistryEntry>,
    generation: AtomicU64,
    changed: Notify,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install `state` unconditionally, returning its generation and the replaced state
    pub fn install(&self, id: &str, state: ConnectionState) -> (u64, Option<ConnectionState>) {
        let generation = self.next_generation();
        trace!(server_id = %id, generation, state = state.label(), "registry install");
        let previous = self
            .entries
            .insert(id.to_string(), RegistryEntry { generation, state })
            .map(|entry| entry.state);
        self.changed.notify_waiters();
        (generation, previous)
    }

    /// Start a connection attempt: writes `Initializing` under a new generation
    pub fn begin(&self, id: &str) -> (u64, Option<ConnectionState>) {
        self.install(id, ConnectionState::Initializing)
    }

    /// Finish the attempt started under `generation`.
    ///
    /// Returns the state back when the entry was removed or replaced in the
    /// meantime, so the caller can close whatever it carries.
    pub fn complete(
        &self,
        id: &str,
        generation: u64,
        state: ConnectionState,
    ) -> Result<(), ConnectionState> {
        if let Some(mut entry) = self.entries.get_mut(id) {
            if entry.generation == generation {
                trace!(server_id = %id, generation, state = state.label(), "registry complete");
                entry.state = state;
                drop(entry);
                self.changed.notify_waiters();
                return Ok(());
            }
        }
        Err(state)
    }

    pub fn remove(&self, id: &str) -> Option<ConnectionState> {
        let removed = self.entries.remove(id).map(|(_, entry)| entry.state);
        if removed.is_some() {
            self.changed.notify_waiters();
        }
        removed
    }

    /// Remove every entry, returning them
    pub fn drain(&self) -> Vec<(String, ConnectionState)> {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let drained = ids
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|(id, entry)| (id, entry.state))
            .collect();
        self.changed.notify_waiters();
        drained
    }

    pub fn get(&self, id: &str) -> Option<ConnectionState> {
        self.entries.get(id).map(|entry| entry.state.clone())
    }

    pub fn generation_of(&self, id: &str) -> Option<u64> {
        self.entries.get(id).map(|entry| entry.generation)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn snapshot(&self) -> Vec<(String, ConnectionState)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wait until `id` is no longer `Initializing`, or `timeout` elapses.
    ///
    /// Returns the state observed last (`None` when there is no entry).
    pub async fn wait_until_settled(&self, id: &str, timeout: Duration) -> Option<ConnectionState> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.get(id) {
                Some(ConnectionState::Initializing) => {}
                other => return other,
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get(id);
            }
        }
    }
}

/// Display status from the persisted config and the registry entry.
///
/// A paused config wins over any entry, then a missing entry is `Undefined`.
pub fn resolve_display_status(config: &ServerConfig, state: Option<&ConnectionState>) -> DisplayStatus {
    if config.is_paused() {
        return DisplayStatus::Paused;
    }
    match state {
        None => DisplayStatus::Undefined,
        Some(ConnectionState::Initializing) => DisplayStatus::Initializing,
        Some(ConnectionState::Error(message)) => DisplayStatus::Error(message.clone()),
        Some(ConnectionState::Active { .. }) => DisplayStatus::Active,
    }
}
