//! Memoizing ring decorator.

use crate::error::Result;
use crate::node::Node;
use crate::ring::Ring;
use parking_lot::Mutex;
use tracing::debug;

/// Wraps a [`Ring`] and memoizes its node snapshot.
///
/// The snapshot is filled on first read and kept until [`CachedRing::clear_cache`]
/// is called. There is no time-based expiry: peers clear their caches when they
/// receive a join/leave notification. Reads and invalidation share one lock.
pub struct CachedRing {
    inner: Box<dyn Ring>,
    nodes: Mutex<Option<Vec<Node>>>,
}

impl CachedRing {
    pub fn new(inner: impl Ring) -> Self {
        Self {
            inner: Box::new(inner),
            nodes: Mutex::new(None),
        }
    }

    /// Drops the memoized snapshot so the next query recomputes membership.
    pub fn clear_cache(&self) {
        *self.nodes.lock() = None;
        debug!("Ring cache cleared");
    }

    pub fn is_cached(&self) -> bool {
        self.nodes.lock().is_some()
    }
}

impl Ring for CachedRing {
    fn all_nodes(&self) -> Result<Vec<Node>> {
        let mut nodes = self.nodes.lock();
        if let Some(cached) = nodes.as_ref() {
            return Ok(cached.clone());
        }
        let fresh = self.inner.all_nodes()?;
        *nodes = Some(fresh.clone());
        Ok(fresh)
    }

    fn join(&self, node: &Node) -> Result<()> {
        let result = self.inner.join(node);
        self.clear_cache();
        result
    }

    fn leave(&self, node: &Node) -> Result<()> {
        let result = self.inner.leave(node);
        self.clear_cache();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MembershipDirectory, MemoryDirectory};
    use crate::node::{NodeAddress, NodeId};
    use crate::ring::HashRing;
    use std::sync::Arc;

    fn node(id: u128) -> Node {
        Node::new(NodeId(id), NodeAddress::new("127.0.0.1", 7000 + id as u16))
    }

    #[test]
    fn test_snapshot_is_stale_until_cleared() {
        let directory = MemoryDirectory::new();
        let cached = CachedRing::new(HashRing::new(Arc::new(directory.clone())));

        directory.add(&node(1).to_token()).unwrap();
        let first = cached.all_nodes().unwrap();
        assert_eq!(first, vec![node(1)]);

        // Membership changes behind the cache's back.
        directory.add(&node(2).to_token()).unwrap();
        assert_eq!(cached.all_nodes().unwrap(), first);

        cached.clear_cache();
        assert_eq!(cached.all_nodes().unwrap().len(), 2);
    }

    #[test]
    fn test_join_and_leave_invalidate() {
        let directory = MemoryDirectory::new();
        let cached = CachedRing::new(HashRing::new(Arc::new(directory)));

        cached.join(&node(1)).unwrap();
        assert_eq!(cached.all_nodes().unwrap().len(), 1);
        assert!(cached.is_cached());

        cached.join(&node(2)).unwrap();
        assert!(!cached.is_cached());
        assert_eq!(cached.all_nodes().unwrap().len(), 2);

        cached.leave(&node(1)).unwrap();
        assert_eq!(cached.all_nodes().unwrap(), vec![node(2)]);
    }

    #[test]
    fn test_failed_join_still_invalidates() {
        let directory = MemoryDirectory::new();
        let cached = CachedRing::new(HashRing::new(Arc::new(directory)));
        cached.join(&node(1)).unwrap();
        cached.all_nodes().unwrap();

        assert!(cached.join(&node(1)).is_err());
        assert!(!cached.is_cached());
    }
}
