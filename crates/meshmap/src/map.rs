//! Distributed map engine.
//!
//! Each operation resolves the key's owner on the ring, then either works on
//! the local store or sends the matching request to the owner. Aggregate
//! operations broadcast to every other node and degrade per peer: a peer
//! that cannot be reached contributes nothing.

use crate::handler::MapHandler;
use crate::store::{LocalStore, MapKey, MapValue};
use corelib::{CachedRing, Error, Node, Placement, Result, Ring};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use streaming::{BincodeCodec, Message, MessageType, PayloadCodec, StreamSender};
use tracing::{debug, warn};

/// Map view over the whole cluster, hosted by one node.
pub struct MeshMap<K: MapKey, V: MapValue, C = BincodeCodec> {
    self_node: Node,
    ring: Arc<CachedRing>,
    sender: StreamSender,
    store: LocalStore<K, V>,
    _codec: PhantomData<fn() -> C>,
}

impl<K: MapKey, V: MapValue, C> Clone for MeshMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            self_node: self.self_node.clone(),
            ring: Arc::clone(&self.ring),
            sender: self.sender.clone(),
            store: self.store.clone(),
            _codec: PhantomData,
        }
    }
}

impl<K: MapKey, V: MapValue, C: PayloadCodec> MeshMap<K, V, C> {
    pub fn new(
        self_node: Node,
        ring: Arc<CachedRing>,
        sender: StreamSender,
        store: LocalStore<K, V>,
    ) -> Self {
        Self {
            self_node,
            ring,
            sender,
            store,
            _codec: PhantomData,
        }
    }

    /// Dispatcher serving peers from this map's local store.
    pub fn handler(&self) -> MapHandler<K, V, C> {
        MapHandler::new(self.store.clone(), Arc::clone(&self.ring))
    }

    pub fn self_node(&self) -> &Node {
        &self.self_node
    }

    pub fn ring(&self) -> &Arc<CachedRing> {
        &self.ring
    }

    pub fn sender(&self) -> &StreamSender {
        &self.sender
    }

    pub fn local_store(&self) -> &LocalStore<K, V> {
        &self.store
    }

    /// Number of entries held by this node alone.
    pub fn local_len(&self) -> usize {
        self.store.len()
    }

    /// Keys held by this node alone.
    pub fn local_keys(&self) -> Vec<K> {
        self.store.keys()
    }

    /// Ring position of `key`, hashed from its marshalled bytes so every
    /// node using the same codec agrees on it.
    pub fn placement_of(&self, key: &K) -> Result<Placement> {
        Ok(Placement::of_bytes(&C::encode(key)?))
    }

    /// Node currently responsible for `key`.
    pub fn owner_of(&self, key: &K) -> Result<Node> {
        self.ring.owner_for_key(&C::encode(key)?)
    }

    fn is_local(&self, node: &Node) -> bool {
        *node == self.self_node
    }

    fn peers(&self) -> Result<Vec<Node>> {
        self.ring.all_nodes_except(&self.self_node)
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let owner = self.owner_of(key)?;
        self.get_from(&owner, key).await
    }

    pub async fn put(&self, key: K, value: V) -> Result<()> {
        let owner = self.owner_of(&key)?;
        self.put_to(&owner, key, value).await
    }

    pub async fn remove(&self, key: &K) -> Result<Option<V>> {
        let owner = self.owner_of(key)?;
        self.remove_from(&owner, key).await
    }

    pub async fn contains_key(&self, key: &K) -> Result<bool> {
        let owner = self.owner_of(key)?;
        if self.is_local(&owner) {
            return Ok(self.store.contains_key(key));
        }

        let request = Message::encoded::<C, _>(MessageType::CONTAINS_KEY, key)?;
        let reply = self.sender.send(&owner, &request).await?;
        if reply.is(&MessageType::YES) {
            Ok(true)
        } else if reply.is(&MessageType::NO) {
            Ok(false)
        } else {
            Err(unexpected_reply(&request, &owner, &reply))
        }
    }

    /// True if any node holds `value`. Checks the local store first.
    pub async fn contains_value(&self, value: &V) -> Result<bool> {
        if self.store.contains_value(value) {
            return Ok(true);
        }

        let request = Message::encoded::<C, _>(MessageType::CONTAINS_VALUE, value)?;
        let responses = self.sender.broadcast(&self.peers()?, &request).await;
        Ok(responses.values().any(|reply| reply.is(&MessageType::YES)))
    }

    /// Total entry count. Unreachable peers count as zero.
    pub async fn size(&self) -> Result<usize> {
        let responses = self
            .sender
            .broadcast(&self.peers()?, &Message::empty(MessageType::SIZE))
            .await;

        let mut total = self.store.len();
        for (node, reply) in responses {
            if reply.is(&MessageType::SIZE) {
                total += reply.payload_as_u32()? as usize;
            } else {
                debug!("{} contributed nothing to size ({})", node, reply.message_type());
            }
        }
        Ok(total)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.size().await? == 0)
    }

    /// Union of every reachable node's keys.
    pub async fn key_set(&self) -> Result<HashSet<K>> {
        let responses = self
            .sender
            .broadcast(&self.peers()?, &Message::empty(MessageType::KEY_SET))
            .await;

        let mut keys: HashSet<K> = self.store.keys().into_iter().collect();
        for (node, reply) in responses {
            if !reply.is(&MessageType::KEY_SET) {
                debug!("{} contributed no keys ({})", node, reply.message_type());
                continue;
            }
            let remote: Vec<K> = reply.decode_payload::<C, _>()?;
            keys.extend(remote);
        }
        Ok(keys)
    }

    /// Every reachable node's entries merged with the local ones.
    pub async fn entry_set(&self) -> Result<HashMap<K, V>> {
        let responses = self
            .sender
            .broadcast(&self.peers()?, &Message::empty(MessageType::DUMP_ENTRIES))
            .await;

        let mut entries: HashMap<K, V> = self.store.entries().into_iter().collect();
        for (node, reply) in responses {
            if !reply.is(&MessageType::DUMP_ENTRIES) {
                debug!("{} contributed no entries ({})", node, reply.message_type());
                continue;
            }
            let remote: Vec<(K, V)> = reply.decode_payload::<C, _>()?;
            entries.extend(remote);
        }
        Ok(entries)
    }

    pub async fn values(&self) -> Result<Vec<V>> {
        Ok(self.entry_set().await?.into_values().collect())
    }

    /// Puts every pair concurrently, in no particular order.
    ///
    /// All puts run to completion; the first failure is returned.
    pub async fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let pending: Vec<_> = entries
            .into_iter()
            .map(|(key, value)| {
                let map = self.clone();
                tokio::spawn(async move { map.put(key, value).await })
            })
            .collect();

        let mut first_failure = None;
        for handle in pending {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::transport("put task failed", e)),
            };
            if let Err(e) = outcome {
                warn!("put_all entry failed: {}", e);
                first_failure.get_or_insert(e);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Clears every reachable peer, then the local store.
    ///
    /// Not transactional: peers that could not be reached keep their entries.
    pub async fn clear(&self) -> Result<()> {
        let responses = self
            .sender
            .broadcast(&self.peers()?, &Message::empty(MessageType::CLEAR))
            .await;
        for (node, reply) in &responses {
            if !reply.is(&MessageType::ACK) {
                warn!("{} did not acknowledge CLEAR ({})", node, reply.message_type());
            }
        }
        self.store.clear();
        Ok(())
    }

    /// Sends a control message (HI/BYE) to every other node.
    pub async fn announce(&self, message: Message) -> Result<()> {
        let peers = self.peers()?;
        let responses = self.sender.broadcast(&peers, &message).await;
        let acknowledged = responses
            .values()
            .filter(|reply| reply.is(&MessageType::ACK))
            .count();
        debug!(
            "{} acknowledged by {}/{} peers",
            message.message_type(),
            acknowledged,
            peers.len()
        );
        Ok(())
    }

    pub(crate) async fn get_from(&self, target: &Node, key: &K) -> Result<Option<V>> {
        if self.is_local(target) {
            return Ok(self.store.get(key));
        }

        let request = Message::encoded::<C, _>(MessageType::GET, key)?;
        let reply = self.sender.send(target, &request).await?;
        if reply.is(&MessageType::GET) {
            reply.decode_payload::<C, _>()
        } else if reply.is(&MessageType::ACK) {
            Ok(None)
        } else {
            Err(unexpected_reply(&request, target, &reply))
        }
    }

    pub(crate) async fn put_to(&self, target: &Node, key: K, value: V) -> Result<()> {
        if self.is_local(target) {
            self.store.insert(key, value);
            return Ok(());
        }

        let request = Message::encoded::<C, _>(MessageType::PUT, &(key, value))?;
        let reply = self.sender.send(target, &request).await?;
        if reply.is(&MessageType::ACK) {
            Ok(())
        } else {
            Err(unexpected_reply(&request, target, &reply))
        }
    }

    pub(crate) async fn remove_from(&self, target: &Node, key: &K) -> Result<Option<V>> {
        if self.is_local(target) {
            return Ok(self.store.remove(key));
        }

        let request = Message::encoded::<C, _>(MessageType::REMOVE, key)?;
        let reply = self.sender.send(target, &request).await?;
        if reply.is(&MessageType::REMOVE) {
            reply.decode_payload::<C, _>()
        } else {
            Err(unexpected_reply(&request, target, &reply))
        }
    }

    pub(crate) async fn key_set_of(&self, target: &Node) -> Result<Vec<K>> {
        if self.is_local(target) {
            return Ok(self.store.keys());
        }

        let request = Message::empty(MessageType::KEY_SET);
        let reply = self.sender.send(target, &request).await?;
        if reply.is(&MessageType::KEY_SET) {
            reply.decode_payload::<C, _>()
        } else {
            Err(unexpected_reply(&request, target, &reply))
        }
    }
}

fn unexpected_reply(request: &Message, target: &Node, reply: &Message) -> Error {
    Error::protocol(format!(
        "{} to {} was answered with {}",
        request.message_type(),
        target,
        reply.message_type()
    ))
}
