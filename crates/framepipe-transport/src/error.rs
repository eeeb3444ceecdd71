use std::net::SocketAddr;

/// Errors that can occur in pipe transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the loopback listener.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to create the named pipe object.
    #[error("failed to create pipe {path}: {source}")]
    CreatePipe {
        path: String,
        source: std::io::Error,
    },

    /// Failed to accept the incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection wait was already started on this endpoint.
    #[error("endpoint is already waiting for a connection")]
    AlreadyConnecting,

    /// The endpoint has been closed.
    #[error("endpoint closed")]
    Closed,

    /// The peer never attached: the wait was cancelled, timed out, or the
    /// pipe was left unconnected.
    #[error("connection wait cancelled")]
    Cancelled,
}

impl TransportError {
    /// True for the "peer never showed up" signal, as opposed to transfer errors.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
