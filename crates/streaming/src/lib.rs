//! Wire protocol and transport between mesh map nodes.
//!
//! This crate provides the protocol and transports for node-to-node traffic:
//! - Framed messages with a fixed 36-byte header
//! - Pluggable, symmetric payload codecs
//! - A retrying, broadcasting sender
//! - A one-request-per-connection receiver

pub mod codec;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use codec::{BincodeCodec, JsonCodec, PayloadCodec};
pub use protocol::{Message, MessageType};
pub use receiver::{MessageHandler, ServerMode, ShutdownHandle, StreamReceiver};
pub use sender::StreamSender;
