//! Consistent hash ring implementation.
//!
//! The ring orders the registered nodes by placement and answers
//! ownership and successor queries for keys.

pub mod cached;
pub mod ring;

pub use cached::CachedRing;
pub use ring::{HashRing, Ring};
