//! Distributed in-memory map over a consistent hash ring.
//!
//! Every node owns the keys whose placement falls between its predecessor's
//! placement (exclusive) and its own (inclusive). This crate provides:
//! - The node-local store and the dispatcher serving peers from it
//! - The map engine routing each operation to the key's owner
//! - Key migration when a node joins or leaves
//! - Node lifecycle and configuration

pub mod config;
pub mod handler;
pub mod map;
pub mod migration;
pub mod node;
pub mod store;

pub use config::NodeConfig;
pub use handler::MapHandler;
pub use map::MeshMap;
pub use node::MeshNode;
pub use store::{LocalStore, MapKey, MapValue};
