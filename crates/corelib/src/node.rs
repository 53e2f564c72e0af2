//! Node abstractions for the mesh ring.
//!
//! Nodes are identified by a random 128-bit `NodeId` plus the address their
//! server listens on. Both are fixed for the lifetime of the process.

use crate::error::{Error, Result};
use crate::token::Placement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the fields of a directory token.
const TOKEN_SEPARATOR: char = '#';

/// Compact identifier for a node in the cluster.
///
/// Newtype over `u128` so comparisons and hashing are very fast while giving
/// plenty of space for uniqueness.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u128);

impl NodeId {
    /// Draws a fresh random identifier.
    pub fn random() -> Self {
        NodeId(rand::random())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        u128::from_str_radix(s, 16)
            .map(NodeId)
            .map_err(|e| Error::InvalidNode(format!("node id '{}' is not a 128-bit hex value: {}", s, e)))
    }
}

/// Host and port a node's server is reachable on.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Logical node participating in the ring.
///
/// Immutable once constructed. Two nodes are equal only if both id and
/// address match.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    address: NodeAddress,
}

impl Node {
    pub fn new(id: NodeId, address: NodeAddress) -> Self {
        Self { id, address }
    }

    /// Node with a freshly drawn random id.
    pub fn with_random_id(address: NodeAddress) -> Self {
        Self::new(NodeId::random(), address)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Position of this node on the ring, derived from the big-endian bytes
    /// of its id.
    pub fn placement(&self) -> Placement {
        Placement::of_bytes(&self.id.0.to_be_bytes())
    }

    /// Directory token form: `host#port#id`.
    pub fn to_token(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.address.host,
            self.address.port,
            self.id,
            sep = TOKEN_SEPARATOR
        )
    }

    /// Parses a token produced by [`Node::to_token`].
    pub fn from_token(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split(TOKEN_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(Error::InvalidNode(format!(
                "token '{}' must have the form host#port#id",
                token
            )));
        }

        let host = parts[0];
        if host.is_empty() {
            return Err(Error::InvalidNode(format!("token '{}' has an empty host", token)));
        }
        let port = parts[1]
            .parse::<u16>()
            .map_err(|e| Error::InvalidNode(format!("token '{}' has an invalid port: {}", token, e)))?;
        let id = parts[2].parse::<NodeId>()?;

        Ok(Self::new(id, NodeAddress::new(host, port)))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Node::from_token(s)
    }
}
