//! Command line options.

use clap::Parser;
use meshmap::NodeConfig;
use std::path::PathBuf;
use streaming::ServerMode;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "meshmap", about = "Join a MeshMap cluster and work with it interactively")]
pub struct CliConfig {
    /// Shared directory holding one file per cluster member.
    #[arg(short, long)]
    pub directory: PathBuf,

    /// Host to bind and advertise.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on; 0 picks a free one.
    #[arg(short, long, default_value_t = 0)]
    pub port: u16,

    /// Run the accept loop on the main task instead of a spawned one.
    #[arg(long, default_value_t = false)]
    pub inline: bool,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CliConfig {
    pub fn node_config(&self) -> NodeConfig {
        let mode = if self.inline {
            ServerMode::Inline
        } else {
            ServerMode::Background
        };
        NodeConfig {
            host: self.host.clone(),
            ..NodeConfig::default()
        }
        .with_port(self.port)
        .with_server_mode(mode)
    }

    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
