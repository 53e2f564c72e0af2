//! Node configuration.

use serde::Deserialize;
use streaming::protocol::DEFAULT_MAX_PAYLOAD_LEN;
use streaming::sender::DEFAULT_SEND_ATTEMPTS;
use streaming::ServerMode;

/// Settings for one [`MeshNode`](crate::MeshNode).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Host the server binds to and peers connect to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port; 0 picks an ephemeral port.
    #[serde(default)]
    pub port: u16,

    /// Whether the accept loop runs inline or on a spawned task.
    #[serde(default)]
    pub server_mode: ServerMode,

    /// Total attempts per request before a transport failure is reported.
    #[serde(default = "default_send_attempts")]
    pub send_attempts: usize,

    /// Largest payload accepted when reading a frame (unit: bytes).
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            server_mode: ServerMode::default(),
            send_attempts: default_send_attempts(),
            max_payload_len: default_max_payload_len(),
        }
    }
}

impl NodeConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_server_mode(mut self, server_mode: ServerMode) -> Self {
        self.server_mode = server_mode;
        self
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_send_attempts() -> usize {
    DEFAULT_SEND_ATTEMPTS
}

fn default_max_payload_len() -> usize {
    DEFAULT_MAX_PAYLOAD_LEN
}
