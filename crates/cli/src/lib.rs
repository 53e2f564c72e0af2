//! Interactive front end for a single MeshMap node.
//!
//! Provides:
//! - Command line options for joining a cluster through a shared directory
//! - A line-oriented command language over the distributed map

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
