//! Client side of the transport.
//!
//! Every request opens its own connection, writes one message, reads one
//! reply and closes. I/O failures retry the whole sequence.

use crate::protocol::{Message, DEFAULT_MAX_PAYLOAD_LEN};
use corelib::error::BoxError;
use corelib::{Error, ErrorKind, Node, Result};
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Attempts made for one request unless configured otherwise.
pub const DEFAULT_SEND_ATTEMPTS: usize = 3;

/// Sends messages to peers and fans broadcasts out concurrently.
#[derive(Debug, Clone)]
pub struct StreamSender {
    attempts: usize,
    max_payload_len: usize,
}

impl Default for StreamSender {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_ATTEMPTS)
    }
}

impl StreamSender {
    /// Sender retrying each request up to `attempts` times in total.
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts: attempts.max(1),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }

    pub fn with_max_payload_len(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Sends `message` to `node` and returns its reply.
    ///
    /// Transport failures are retried without backoff; any other failure
    /// (an oversized or malformed reply) is returned at once.
    pub async fn send(&self, node: &Node, message: &Message) -> Result<Message> {
        let mut last_failure = None;

        for attempt in 1..=self.attempts {
            match self.exchange(node, message).await {
                Ok(reply) => {
                    debug!(
                        "{} -> {} answered {} ({} bytes)",
                        message.message_type(),
                        node.address(),
                        reply.message_type(),
                        reply.len()
                    );
                    return Ok(reply);
                }
                Err(e) if e.kind() == ErrorKind::Transport => {
                    debug!(
                        "Attempt {}/{} sending {} to {} failed: {}",
                        attempt,
                        self.attempts,
                        message.message_type(),
                        node.address(),
                        e
                    );
                    last_failure = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Transport {
            message: format!(
                "unable to send {} to {} after {} attempts",
                message.message_type(),
                node,
                self.attempts
            ),
            source: last_failure.map(|e| Box::new(e) as BoxError),
        })
    }

    /// Sends `message` to every node concurrently.
    ///
    /// Waits for all of them. A node whose send failed is mapped to the
    /// `ERR` sentinel; this never fails as a whole.
    pub async fn broadcast(&self, nodes: &[Node], message: &Message) -> HashMap<Node, Message> {
        let pending: Vec<_> = nodes
            .iter()
            .map(|node| {
                let sender = self.clone();
                let target = node.clone();
                let message = message.clone();
                let handle = tokio::spawn(async move { sender.send(&target, &message).await });
                (node.clone(), handle)
            })
            .collect();

        let mut responses = HashMap::with_capacity(pending.len());
        for (node, handle) in pending {
            let response = match handle.await {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    warn!("Unable to broadcast {} to {}: {}", message.message_type(), node, e);
                    Message::err()
                }
                Err(e) => {
                    warn!("Broadcast of {} to {} aborted: {}", message.message_type(), node, e);
                    Message::err()
                }
            };
            responses.insert(node, response);
        }
        responses
    }

    async fn exchange(&self, node: &Node, message: &Message) -> Result<Message> {
        let address = node.address();
        let mut stream = TcpStream::connect((address.host.as_str(), address.port))
            .await
            .map_err(|e| Error::transport(format!("unable to connect to {}", address), e))?;

        message.write_to(&mut stream).await?;
        let reply = Message::read_from(&mut stream, self.max_payload_len).await?;
        // The reply is complete; a failing close does not invalidate it.
        let _ = stream.shutdown().await;
        Ok(reply)
    }
}
