use std::time::Duration;

/// Default prefix for generated pipe names.
pub const DEFAULT_PIPE_PREFIX: &str = "framepipe";

/// Default block size for stream copies and inbound reads: 4 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Configuration shared by an endpoint and the pump that drives it.
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Prefix for generated named-pipe names. Ignored by loopback sockets.
    pub pipe_prefix: String,
    /// Read/write block size in bytes. Default: 4 KiB.
    pub chunk_size: usize,
    /// Give up waiting for the subprocess after this long.
    ///
    /// An elapsed wait is reported as [`TransportError::Cancelled`](crate::TransportError::Cancelled).
    pub connect_timeout: Option<Duration>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            pipe_prefix: DEFAULT_PIPE_PREFIX.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: None,
        }
    }
}
