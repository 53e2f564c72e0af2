//! Server side of the transport.
//!
//! One request per connection: read a message, dispatch it, write the
//! reply, close. The accept loop ends cleanly when the listener is shut down
//! through its [`ShutdownHandle`].

use crate::protocol::{Message, DEFAULT_MAX_PAYLOAD_LEN};
use corelib::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Turns a request into an optional reply. `None` is answered with `ACK`.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, message: Message) -> Result<Option<Message>>;
}

/// Where the accept loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// On the caller's task; `start` returns once the server is shut down.
    Inline,
    /// On a spawned task; `start` returns immediately.
    #[default]
    Background,
}

/// Closes a running receiver's listener.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    pub fn shutdown(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.signal.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }
}

/// Accepts peer connections and dispatches their messages.
pub struct StreamReceiver {
    listener: TcpListener,
    handler: Arc<dyn MessageHandler>,
    mode: ServerMode,
    max_payload_len: usize,
    shutdown: ShutdownHandle,
}

impl StreamReceiver {
    /// Binds the listening socket. Port 0 picks an ephemeral port.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        handler: Arc<dyn MessageHandler>,
        mode: ServerMode,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::transport("unable to bind listener", e))?;
        Ok(Self {
            listener,
            handler,
            mode,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn with_max_payload_len(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::transport("listener has no local address", e))
    }

    pub fn mode(&self) -> ServerMode {
        self.mode
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Starts the accept loop according to the configured [`ServerMode`].
    ///
    /// Inline mode returns `None` after the loop has ended; background mode
    /// returns the spawned loop's handle right away.
    pub async fn start(self) -> Result<Option<JoinHandle<Result<()>>>> {
        match self.mode {
            ServerMode::Inline => {
                self.run().await?;
                Ok(None)
            }
            ServerMode::Background => Ok(Some(tokio::spawn(self.run()))),
        }
    }

    /// Accept loop. Returns `Ok` on shutdown and `Err` on any accept failure.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        let mut shutdown = self.shutdown.subscribe();
        info!("Listening on {} ({:?})", addr, self.mode);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(|e| {
                        error!("Accept on {} failed: {}", addr, e);
                        Error::transport(format!("accept on {} failed", addr), e)
                    })?;

                    let handler = Arc::clone(&self.handler);
                    let max_payload_len = self.max_payload_len;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, handler, max_payload_len).await {
                            warn!("Dropped connection from {}: {}", peer, e);
                        }
                    });
                }
            }
        }

        info!("Listener on {} closed", addr);
        Ok(())
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    handler: Arc<dyn MessageHandler>,
    max_payload_len: usize,
) -> Result<()> {
    let request = Message::read_from(&mut stream, max_payload_len).await?;
    let request_type = request.message_type().clone();

    let response = match handler.handle(request) {
        Ok(Some(reply)) => reply,
        Ok(None) => Message::ack(),
        Err(e) => {
            warn!("Handling {} failed: {}", request_type, e);
            Message::err()
        }
    };
    debug!("{} answered with {}", request_type, response.message_type());

    response.write_to(&mut stream).await?;
    stream
        .shutdown()
        .await
        .map_err(|e| Error::transport("unable to close connection", e))
}
