use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::PipeStream;

/// Loopback TCP listener used where native named pipes are unavailable.
///
/// Binds `127.0.0.1` on an ephemeral port. The subprocess reaches it through
/// the `tcp://127.0.0.1:<port>` URI returned by [`uri`](Self::uri).
///
/// Binding does not need a Tokio runtime; the listener is registered with
/// the reactor only when [`accept_one`](Self::accept_one) runs.
pub struct LoopbackListener {
    listener: std::net::TcpListener,
    addr: SocketAddr,
}

impl LoopbackListener {
    /// Bind a listener on the loopback address with an OS-assigned port.
    pub fn bind() -> Result<Self> {
        let requested = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));
        let bind_err = |source| TransportError::Bind {
            addr: requested,
            source,
        };

        let listener = std::net::TcpListener::bind(requested).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;

        info!(%addr, "listening on loopback socket");

        Ok(Self { listener, addr })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The path handed to the subprocess.
    pub fn uri(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    /// Accept exactly one connection, then stop listening.
    ///
    /// The listener is consumed, so no second peer can attach.
    pub async fn accept_one(self) -> Result<PipeStream> {
        let listener = TcpListener::from_std(self.listener).map_err(TransportError::Accept)?;
        let (stream, peer) = listener.accept().await.map_err(TransportError::Accept)?;
        drop(listener);

        debug!(addr = %self.addr, %peer, "accepted loopback connection");
        // Frames are written whole; don't hold the tail of one back.
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "failed to set TCP_NODELAY");
        }
        Ok(PipeStream::from_tcp(stream))
    }
}

impl std::fmt::Debug for LoopbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackListener")
            .field("addr", &self.addr)
            .finish()
    }
}
