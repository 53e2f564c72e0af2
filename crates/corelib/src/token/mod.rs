//! Placement tokens for the mesh ring.
//!
//! Nodes and keys are both hashed onto the same 31-bit token space; the
//! ordering of those tokens is what defines ownership.

pub mod placement;

pub use placement::Placement;
