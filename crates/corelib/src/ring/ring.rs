//! Hash ring over the membership directory.

use crate::directory::MembershipDirectory;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::token::Placement;
use std::sync::Arc;
use tracing::warn;

/// Ring capability shared by the directory-backed ring and its cache.
///
/// Only `all_nodes`, `join` and `leave` have to be provided; every derived
/// query is answered from the `all_nodes` snapshot, so a decorator that
/// memoizes the snapshot speeds up all of them at once.
pub trait Ring: Send + Sync + 'static {
    /// All registered nodes, ordered by placement.
    fn all_nodes(&self) -> Result<Vec<Node>>;

    /// Registers `node` as a ring member.
    fn join(&self, node: &Node) -> Result<()>;

    /// Deregisters `node`.
    fn leave(&self, node: &Node) -> Result<()>;

    /// All registered nodes except `node`, ordered by placement.
    fn all_nodes_except(&self, node: &Node) -> Result<Vec<Node>> {
        let mut nodes = self.all_nodes()?;
        nodes.retain(|n| n != node);
        Ok(nodes)
    }

    /// Next node strictly after `node`, wrapping to the first node.
    ///
    /// Returns `None` when no other node is registered.
    fn successor(&self, node: &Node) -> Result<Option<Node>> {
        let others = self.all_nodes_except(node)?;
        let placement = node.placement();
        let next = others
            .iter()
            .find(|n| n.placement() > placement)
            .or_else(|| others.first())
            .cloned();
        Ok(next)
    }

    /// Node with the smallest placement `>= placement`, wrapping to the
    /// smallest-placement node overall.
    fn owner_of(&self, placement: Placement) -> Result<Node> {
        let nodes = self.all_nodes()?;
        let idx = nodes.partition_point(|n| n.placement() < placement);
        nodes
            .get(idx)
            .or_else(|| nodes.first())
            .cloned()
            .ok_or_else(|| Error::RingOperation("ring has no members".to_string()))
    }

    /// Owner of a key given in its marshalled form.
    fn owner_for_key(&self, key: &[u8]) -> Result<Node> {
        self.owner_of(Placement::of_bytes(key))
    }
}

/// Ring that recomputes membership from the directory on every query.
#[derive(Clone)]
pub struct HashRing {
    directory: Arc<dyn MembershipDirectory>,
}

impl HashRing {
    pub fn new(directory: Arc<dyn MembershipDirectory>) -> Self {
        Self { directory }
    }

    /// Parses and orders a list of directory tokens.
    ///
    /// Tokens that do not parse are skipped; another process may be writing
    /// into the same directory.
    pub fn nodes_from_tokens<I, S>(tokens: I) -> Vec<Node>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut nodes: Vec<Node> = tokens
            .into_iter()
            .filter_map(|token| match Node::from_token(token.as_ref()) {
                Ok(node) => Some(node),
                Err(e) => {
                    warn!("Skipping directory entry {:?}: {}", token.as_ref(), e);
                    None
                }
            })
            .collect();
        nodes.sort_by_key(|n| (n.placement(), n.id()));
        nodes
    }
}

impl Ring for HashRing {
    fn all_nodes(&self) -> Result<Vec<Node>> {
        Ok(Self::nodes_from_tokens(self.directory.list()?))
    }

    fn join(&self, node: &Node) -> Result<()> {
        self.directory.add(&node.to_token())
    }

    fn leave(&self, node: &Node) -> Result<()> {
        self.directory.remove(&node.to_token())
    }
}

impl<R: Ring + ?Sized> Ring for Arc<R> {
    fn all_nodes(&self) -> Result<Vec<Node>> {
        (**self).all_nodes()
    }

    fn join(&self, node: &Node) -> Result<()> {
        (**self).join(node)
    }

    fn leave(&self, node: &Node) -> Result<()> {
        (**self).leave(node)
    }

    fn all_nodes_except(&self, node: &Node) -> Result<Vec<Node>> {
        (**self).all_nodes_except(node)
    }

    fn successor(&self, node: &Node) -> Result<Option<Node>> {
        (**self).successor(node)
    }

    fn owner_of(&self, placement: Placement) -> Result<Node> {
        (**self).owner_of(placement)
    }

    fn owner_for_key(&self, key: &[u8]) -> Result<Node> {
        (**self).owner_for_key(key)
    }
}
