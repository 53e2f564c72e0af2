//! Error types shared by every layer of the mesh map.

use std::fmt;

/// Boxed underlying cause carried by an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing, marshalling or managing membership.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure that survived every send attempt
    #[error("Transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Payload could not be encoded or decoded
    #[error("Marshalling failure: {message}")]
    Marshalling {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Peer answered with something the caller did not expect
    #[error("Protocol violation: {message}")]
    Protocol { message: String },

    /// Membership token could not be listed, created or deleted
    #[error("Directory failure: {message}")]
    Directory {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Invalid node token or address
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Ring query could not be answered
    #[error("Ring operation failed: {0}")]
    RingOperation(String),
}

/// Flat tag for the variants of [`Error`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Marshalling,
    Protocol,
    Directory,
    InvalidNode,
    RingOperation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Marshalling => "marshalling",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Directory => "directory",
            ErrorKind::InvalidNode => "invalid-node",
            ErrorKind::RingOperation => "ring",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Marshalling { .. } => ErrorKind::Marshalling,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Directory { .. } => ErrorKind::Directory,
            Error::InvalidNode(_) => ErrorKind::InvalidNode,
            Error::RingOperation(_) => ErrorKind::RingOperation,
        }
    }

    pub fn transport(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn marshalling(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Marshalling {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub fn directory(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Error::Directory {
            message: message.into(),
            source,
        }
    }
}
