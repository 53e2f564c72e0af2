//! Interactive MeshMap node.

use anyhow::Context;
use clap::Parser;
use cli::{CliConfig, Command, CommandResult};
use corelib::FsDirectory;
use meshmap::{MeshMap, MeshNode};
use std::sync::Arc;
use streaming::ServerMode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .try_init()
        .ok();

    let directory = FsDirectory::open(&config.directory)
        .with_context(|| format!("cannot use {} as cluster directory", config.directory.display()))?;
    let node_config = config.node_config();
    let mut node = MeshNode::<String, String>::join(&node_config, Arc::new(directory)).await?;
    info!("{} is up, type 'help' for commands", node.node());

    let map = node.map().clone();
    let session = match node_config.server_mode {
        ServerMode::Background => repl(&map).await,
        // Dropping the serve future closes the inline listener.
        ServerMode::Inline => tokio::select! {
            served = node.serve() => served.map_err(anyhow::Error::from),
            session = repl(&map) => session,
        },
    };
    if let Err(e) = &session {
        error!("Session ended with failure: {:#}", e);
    }

    node.leave().await.context("unable to leave the cluster")?;
    session
}

/// Reads commands from stdin until `quit` or end of input.
async fn repl(map: &MeshMap<String, String>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match command.execute(map).await {
            Ok(CommandResult::Output(text)) => {
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Ok(CommandResult::Quit) => break,
            Err(e) => error!("{} failed: {:#}", line.trim(), e),
        }
    }
    Ok(())
}
