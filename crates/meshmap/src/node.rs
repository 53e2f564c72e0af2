//! Node lifecycle: join the ring, serve peers, leave the ring.

use crate::config::NodeConfig;
use crate::handler::MapHandler;
use crate::map::MeshMap;
use crate::migration::written_since;
use crate::store::{LocalStore, MapKey, MapValue};
use corelib::{
    CachedRing, Error, HashRing, MembershipDirectory, Node, NodeAddress, Result, Ring,
};
use std::sync::Arc;
use streaming::{
    BincodeCodec, Message, PayloadCodec, ServerMode, ShutdownHandle, StreamReceiver, StreamSender,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A running cluster member hosting one [`MeshMap`].
pub struct MeshNode<K: MapKey, V: MapValue, C = BincodeCodec> {
    map: MeshMap<K, V, C>,
    shutdown: ShutdownHandle,
    server: Option<JoinHandle<Result<()>>>,
    inline_receiver: Option<StreamReceiver>,
}

impl<K: MapKey, V: MapValue, C: PayloadCodec> MeshNode<K, V, C> {
    /// Binds the server, registers in the ring, claims keys from the
    /// successor and announces itself with `HI`.
    ///
    /// In [`ServerMode::Background`] the server is already accepting when
    /// this returns. In [`ServerMode::Inline`] the listener is bound but
    /// connections wait until [`MeshNode::serve`] is awaited.
    pub async fn join(config: &NodeConfig, directory: Arc<dyn MembershipDirectory>) -> Result<Self> {
        let ring = Arc::new(CachedRing::new(HashRing::new(directory)));
        let store = LocalStore::new();
        let sender =
            StreamSender::new(config.send_attempts).with_max_payload_len(config.max_payload_len);

        let handler = MapHandler::<K, V, C>::new(store.clone(), Arc::clone(&ring));
        let receiver = StreamReceiver::bind(
            (config.host.as_str(), config.port),
            Arc::new(handler),
            config.server_mode,
        )
        .await?
        .with_max_payload_len(config.max_payload_len);

        let port = receiver.local_addr()?.port();
        let self_node = Node::with_random_id(NodeAddress::new(config.host.clone(), port));
        let map = MeshMap::new(self_node.clone(), Arc::clone(&ring), sender, store);
        let shutdown = receiver.shutdown_handle();

        let (server, inline_receiver) = match config.server_mode {
            ServerMode::Background => (receiver.start().await?, None),
            ServerMode::Inline => (None, Some(receiver)),
        };
        let mut node = Self {
            map,
            shutdown,
            server,
            inline_receiver,
        };

        if let Err(e) = ring.join(&self_node) {
            error!("{} could not register: {}", self_node, e);
            node.stop_server().await;
            return Err(e);
        }
        info!(
            "{} joined the ring at placement {}",
            self_node,
            self_node.placement()
        );

        if let Err(e) = node.map.open().await {
            error!("{} failed while claiming keys: {}", self_node, e);
            node.stop_server().await;
            if let Err(cleanup) = ring.leave(&self_node) {
                error!("{} could not deregister after a failed join: {}", self_node, cleanup);
            }
            return Err(e);
        }
        node.map.announce(Message::hi()).await?;

        Ok(node)
    }

    pub fn map(&self) -> &MeshMap<K, V, C> {
        &self.map
    }

    pub fn node(&self) -> &Node {
        self.map.self_node()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serves peers until the server is shut down.
    ///
    /// Runs the accept loop on the calling task in inline mode; in background
    /// mode waits for the spawned loop to end.
    pub async fn serve(&mut self) -> Result<()> {
        if let Some(receiver) = self.inline_receiver.take() {
            return receiver.run().await;
        }
        match self.server.take() {
            Some(handle) => join_server(handle).await,
            None => Ok(()),
        }
    }

    /// Hands entries to the successor, deregisters, announces `BYE` and
    /// stops the server.
    ///
    /// A failure while handing over or deregistering aborts the leave: the
    /// node stays registered, keeps its entries and keeps serving. Entries
    /// written by peers with a stale ring between the first hand-over and the
    /// server stopping are handed over in a second pass.
    pub async fn leave(&mut self) -> Result<()> {
        let node = self.node().clone();
        let handed_over = self.map.local_store().entries();
        self.map.hand_over(handed_over.clone()).await?;
        self.map.ring().leave(&node)?;
        self.map.announce(Message::bye()).await?;

        self.shutdown.shutdown();
        self.inline_receiver = None;
        let stopped = match self.server.take() {
            Some(handle) => join_server(handle).await,
            None => Ok(()),
        };

        let late = written_since(&handed_over, self.map.local_store().entries());
        if !late.is_empty() {
            warn!("{} received {} entries while leaving", node, late.len());
            self.map.hand_over(late).await?;
        }
        self.map.local_store().clear();
        info!(
            "{} left the ring after handing over {} entries",
            node,
            handed_over.len()
        );
        stopped
    }

    async fn stop_server(&mut self) {
        self.shutdown.shutdown();
        self.inline_receiver = None;
        if let Some(handle) = self.server.take() {
            if let Err(e) = join_server(handle).await {
                error!("Server stopped with failure: {}", e);
            }
        }
    }
}

impl<K: MapKey, V: MapValue, C> Drop for MeshNode<K, V, C> {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

async fn join_server(handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => Err(Error::transport("server task failed", e)),
    }
}
