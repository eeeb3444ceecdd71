use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::config::PipeConfig;
use crate::connection::ConnectionTask;
use crate::error::{Result, TransportError};
use crate::tcp::LoopbackListener;
use crate::traits::PipeStream;

#[cfg(windows)]
use crate::named_pipe::NamedPipeEndpoint;

/// Transfer direction, relative to the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The subprocess writes, the host reads (subprocess output).
    Inbound,
    /// The host writes, the subprocess reads (subprocess input).
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rendezvous primitive behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    NamedPipe,
    LoopbackSocket,
}

impl PlatformKind {
    /// The primitive this platform supports natively.
    pub fn native() -> Self {
        if cfg!(windows) {
            PlatformKind::NamedPipe
        } else {
            PlatformKind::LoopbackSocket
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlatformKind::NamedPipe => "named-pipe",
            PlatformKind::LoopbackSocket => "loopback-socket",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a process-unique pipe name: `<prefix>_<uuid>`.
pub fn unique_pipe_name(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Full named-pipe path for a pipe name.
pub fn pipe_path(name: &str) -> String {
    format!(r"\\.\pipe\{name}")
}

/// Backend waiting to be handed to the connect task.
enum Backend {
    Loopback(LoopbackListener),
    #[cfg(windows)]
    NamedPipe(NamedPipeEndpoint),
}

impl Backend {
    async fn accept(self) -> Result<PipeStream> {
        match self {
            Backend::Loopback(listener) => listener.accept_one().await,
            #[cfg(windows)]
            Backend::NamedPipe(pipe) => pipe.connect().await,
        }
    }
}

/// One OS-level rendezvous object and the path the subprocess opens it by.
///
/// An endpoint accepts exactly one connection. [`begin_connect`](Self::begin_connect)
/// hands the underlying listener or pipe to a background task; [`close`](Self::close)
/// cancels that task and releases every handle. Dropping the endpoint closes it.
pub struct TransportEndpoint {
    path: String,
    direction: Direction,
    kind: PlatformKind,
    connect_timeout: Option<Duration>,
    backend: Option<Backend>,
    pending: Option<(CancellationToken, AbortHandle)>,
    closed: bool,
}

impl TransportEndpoint {
    /// Open an endpoint for `direction` using the platform's native primitive.
    ///
    /// On Windows this must run inside a Tokio runtime.
    pub fn open(direction: Direction, config: &PipeConfig) -> Result<Self> {
        #[cfg(windows)]
        {
            let pipe = NamedPipeEndpoint::create(&config.pipe_prefix, direction)?;
            Ok(Self::new(
                pipe.path().to_string(),
                direction,
                PlatformKind::NamedPipe,
                config.connect_timeout,
                Backend::NamedPipe(pipe),
            ))
        }

        #[cfg(not(windows))]
        {
            Self::open_loopback(direction, config)
        }
    }

    /// Open a loopback-socket endpoint regardless of platform.
    pub fn open_loopback(direction: Direction, config: &PipeConfig) -> Result<Self> {
        let listener = LoopbackListener::bind()?;
        Ok(Self::new(
            listener.uri(),
            direction,
            PlatformKind::LoopbackSocket,
            config.connect_timeout,
            Backend::Loopback(listener),
        ))
    }

    fn new(
        path: String,
        direction: Direction,
        kind: PlatformKind,
        connect_timeout: Option<Duration>,
        backend: Backend,
    ) -> Self {
        Self {
            path,
            direction,
            kind,
            connect_timeout,
            backend: Some(backend),
            pending: None,
            closed: false,
        }
    }

    /// Path or URI to pass to the subprocess.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Start waiting for the subprocess on a background task.
    ///
    /// Returns immediately. The wait ends when a peer attaches, when `token`
    /// (or the endpoint's own child of it) is cancelled, or when the
    /// configured connect timeout elapses. Must be called inside a Tokio
    /// runtime, at most once per endpoint.
    pub fn begin_connect(&mut self, token: &CancellationToken) -> Result<ConnectionTask> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let backend = self.backend.take().ok_or(TransportError::AlreadyConnecting)?;

        let wait_token = token.child_token();
        let task_token = wait_token.clone();
        let timeout = self.connect_timeout;
        let path = self.path.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!(%path, "connection wait cancelled");
                    Err(TransportError::Cancelled)
                }
                result = accept_within(backend.accept(), timeout) => result,
            }
        });

        self.pending = Some((wait_token.clone(), handle.abort_handle()));
        debug!(path = %self.path, direction = %self.direction, "waiting for subprocess to connect");

        Ok(ConnectionTask::new(handle, wait_token))
    }

    /// Release the pipe handle or stop the listener.
    ///
    /// Cancels a pending connection wait. Idempotent, and safe when no
    /// connection ever completed. A stream already handed out by the
    /// connection task is owned by its holder and is not affected.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some((token, abort)) = self.pending.take() {
            token.cancel();
            abort.abort();
        }
        drop(self.backend.take());

        debug!(path = %self.path, kind = %self.kind, "endpoint closed");
    }
}

async fn accept_within<F>(accept: F, timeout: Option<Duration>) -> Result<PipeStream>
where
    F: Future<Output = Result<PipeStream>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, accept).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?limit, "connection wait timed out");
                Err(TransportError::Cancelled)
            }
        },
        None => accept.await,
    }
}

impl Drop for TransportEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TransportEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportEndpoint")
            .field("path", &self.path)
            .field("direction", &self.direction)
            .field("kind", &self.kind)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;

    fn loopback_addr(endpoint: &TransportEndpoint) -> SocketAddr {
        endpoint
            .path()
            .strip_prefix("tcp://")
            .expect("loopback path should be a tcp uri")
            .parse()
            .expect("loopback path should carry a socket address")
    }

    async fn wait_until_refused(addr: SocketAddr) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while TcpStream::connect(addr).await.is_ok() {
            assert!(Instant::now() < deadline, "listener should be released");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    #[test]
    fn unique_pipe_names_differ() {
        let a = unique_pipe_name("framepipe");
        let b = unique_pipe_name("framepipe");
        assert!(a.starts_with("framepipe_"));
        assert_eq!(a.len(), "framepipe_".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn pipe_path_uses_pipe_namespace() {
        assert_eq!(pipe_path("framepipe_x"), r"\\.\pipe\framepipe_x");
    }

    #[test]
    #[cfg(not(windows))]
    fn native_kind_is_loopback_socket() {
        assert_eq!(PlatformKind::native(), PlatformKind::LoopbackSocket);
        let endpoint = TransportEndpoint::open(Direction::Outbound, &PipeConfig::default())
            .expect("endpoint should open");
        assert_eq!(endpoint.kind(), PlatformKind::LoopbackSocket);
        assert!(endpoint.path().starts_with("tcp://127.0.0.1:"));
        assert_eq!(endpoint.direction(), Direction::Outbound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connects_exactly_one_peer() {
        let mut endpoint =
            TransportEndpoint::open_loopback(Direction::Inbound, &PipeConfig::default()).unwrap();
        let addr = loopback_addr(&endpoint);
        let token = CancellationToken::new();
        let task = endpoint.begin_connect(&token).unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"payload").await.unwrap();
        client.shutdown().await.unwrap();

        let mut stream = task.wait().await.expect("peer should be accepted");
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"payload");

        wait_until_refused(addr).await;
        endpoint.close();
    }

    #[tokio::test]
    async fn begin_connect_twice_is_rejected() {
        let mut endpoint =
            TransportEndpoint::open_loopback(Direction::Outbound, &PipeConfig::default()).unwrap();
        let token = CancellationToken::new();
        let _task = endpoint.begin_connect(&token).unwrap();

        let err = endpoint.begin_connect(&token).unwrap_err();
        assert!(matches!(err, TransportError::AlreadyConnecting));
    }

    #[tokio::test]
    async fn cancellation_before_peer_yields_cancelled() {
        let mut endpoint =
            TransportEndpoint::open_loopback(Direction::Outbound, &PipeConfig::default()).unwrap();
        let token = CancellationToken::new();
        let task = endpoint.begin_connect(&token).unwrap();

        token.cancel();
        let err = task.wait().await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn connect_timeout_yields_cancelled() {
        let config = PipeConfig {
            connect_timeout: Some(Duration::from_millis(50)),
            ..PipeConfig::default()
        };
        let mut endpoint = TransportEndpoint::open_loopback(Direction::Inbound, &config).unwrap();
        let task = endpoint.begin_connect(&CancellationToken::new()).unwrap();

        let err = task.wait().await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_listener() {
        let mut endpoint =
            TransportEndpoint::open_loopback(Direction::Outbound, &PipeConfig::default()).unwrap();
        let addr = loopback_addr(&endpoint);
        let task = endpoint.begin_connect(&CancellationToken::new()).unwrap();

        endpoint.close();
        endpoint.close();
        assert!(endpoint.is_closed());

        let err = task.wait().await.unwrap_err();
        assert!(err.is_cancelled());
        wait_until_refused(addr).await;
    }

    #[tokio::test]
    async fn close_without_connect_wait_releases_listener() {
        let mut endpoint =
            TransportEndpoint::open_loopback(Direction::Inbound, &PipeConfig::default()).unwrap();
        let addr = loopback_addr(&endpoint);

        endpoint.close();
        wait_until_refused(addr).await;

        let err = endpoint
            .begin_connect(&CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
