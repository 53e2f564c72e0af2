use std::sync::Arc;

use corelib::{MemoryDirectory, Node, Ring};
use meshmap::{MeshNode, NodeConfig};

pub type StringNode = MeshNode<String, String>;

/// In-process cluster sharing one directory.
pub struct TestCluster {
    pub directory: MemoryDirectory,
    pub nodes: Vec<StringNode>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self {
            directory: MemoryDirectory::new(),
            nodes: Vec::new(),
        }
    }

    pub async fn with_nodes(count: usize) -> Self {
        let mut cluster = Self::new();
        for _ in 0..count {
            cluster.add_node().await;
        }
        cluster
    }

    /// Joins one more background-mode node and returns its index.
    pub async fn add_node(&mut self) -> usize {
        self.add_node_with(&NodeConfig::default()).await
    }

    pub async fn add_node_with(&mut self, config: &NodeConfig) -> usize {
        let node = StringNode::join(config, Arc::new(self.directory.clone()))
            .await
            .expect("node should join");
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node(&self, idx: usize) -> &StringNode {
        &self.nodes[idx]
    }

    /// Index of the node hosting `target`.
    pub fn index_of(&self, target: &Node) -> usize {
        self.nodes
            .iter()
            .position(|n| n.node() == target)
            .expect("node should be part of the cluster")
    }

    /// Total number of entries held across all local stores.
    pub fn local_total(&self) -> usize {
        self.nodes.iter().map(|n| n.map().local_len()).sum()
    }

    /// Ring members ordered by placement, as seen by node `idx`.
    pub fn ring_order(&self, idx: usize) -> Vec<Node> {
        self.nodes[idx].map().ring().all_nodes().unwrap()
    }
}

pub fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{}", i)).collect()
}
