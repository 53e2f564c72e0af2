//! Core library for the mesh map ring.
//!
//! This crate provides the fundamental abstractions every node shares:
//! - Node identity and its directory token form
//! - Placement tokens on the 31-bit hash ring
//! - The membership directory seam
//! - Ring ownership/successor queries and the memoizing ring cache

pub mod directory;
pub mod error;
pub mod node;
pub mod ring;
pub mod token;

pub use directory::{FsDirectory, MembershipDirectory, MemoryDirectory};
pub use error::{Error, ErrorKind, Result};
pub use node::{Node, NodeAddress, NodeId};
pub use ring::{CachedRing, HashRing, Ring};
pub use token::Placement;
