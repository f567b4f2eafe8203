use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::ServerConfig;

/// Ordered collection of server configs as returned by the config store.
///
/// Iteration order is the store's order; `restart_all` and `initialize_all`
/// walk it front to back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerCatalog {
    entries: Vec<(String, ServerConfig)>,
}

impl ServerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace in place, keeping the original position of an existing id
    pub fn upsert(&mut self, id: impl Into<String>, config: ServerConfig) {
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = config,
            None => self.entries.push((id, config)),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ServerConfig> {
        let pos = self.entries.iter().position(|(existing, _)| existing == id)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, id: &str) -> Option<&ServerConfig> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, config)| config)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerConfig)> {
        self.entries.iter().map(|(id, config)| (id.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ServerConfig)> for ServerCatalog {
    fn from_iter<T: IntoIterator<Item = (String, ServerConfig)>>(iter: T) -> Self {
        let mut catalog = ServerCatalog::new();
        for (id, config) in iter {
            catalog.upsert(id, config);
        }
        catalog
    }
}

impl IntoIterator for ServerCatalog {
    type Item = (String, ServerConfig);
    type IntoIter = std::vec::IntoIter<(String, ServerConfig)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Serialized in the store's `{"mcpServers": {id: config}}` layout
impl Serialize for ServerCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Servers<'a>(&'a [(String, ServerConfig)]);

        impl Serialize for Servers<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (id, config) in self.0 {
                    map.serialize_entry(id, config)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("mcpServers", &Servers(&self.entries))?;
        map.end()
    }
}
