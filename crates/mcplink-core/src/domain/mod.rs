//! Domain entities and value objects
//!
//! - `ServerConfig` and its transport/status enums (persisted by the config store)
//! - `ServerCatalog`, the ordered id → config collection
//! - `DisplayStatus`, computed on read from config + registry

mod catalog;
mod server;
mod status;

pub use catalog::ServerCatalog;
pub use server::*;
pub use status::*;
