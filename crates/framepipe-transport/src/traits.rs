use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use crate::endpoint::PlatformKind;

/// Whether a write destination may vanish mid-transfer.
///
/// A transient sink is one whose reader is expected to go away without
/// warning, typically a socket whose subprocess has already exited. Frame
/// writers swallow write failures on transient sinks and propagate them on
/// everything else.
pub trait Transience {
    fn is_transient(&self) -> bool {
        false
    }
}

impl Transience for Vec<u8> {}
impl<T> Transience for io::Cursor<T> {}
impl Transience for std::fs::File {}
impl Transience for tokio::fs::File {}
impl Transience for tokio::io::DuplexStream {}
impl Transience for tokio::io::Sink {}

impl Transience for TcpStream {
    fn is_transient(&self) -> bool {
        true
    }
}

impl<T: Transience + ?Sized> Transience for &mut T {
    fn is_transient(&self) -> bool {
        (**self).is_transient()
    }
}

impl<T: Transience + ?Sized> Transience for Box<T> {
    fn is_transient(&self) -> bool {
        (**self).is_transient()
    }
}

/// Write half used by pipe sources: an async writer that knows its transience.
pub trait PipeWrite: AsyncWrite + Transience + Unpin + Send {}

impl<T: AsyncWrite + Transience + Unpin + Send + ?Sized> PipeWrite for T {}

/// Read half used by pipe sinks.
pub trait PipeRead: AsyncRead + Unpin + Send {}

impl<T: AsyncRead + Unpin + Send + ?Sized> PipeRead for T {}

/// A connected pipe stream: implements `AsyncRead` + `AsyncWrite`.
///
/// This is what a [`ConnectionTask`](crate::ConnectionTask) resolves to once
/// the subprocess attaches. On Windows it wraps the named pipe server handle;
/// elsewhere it wraps the accepted loopback socket.
pub struct PipeStream {
    inner: PipeStreamInner,
}

enum PipeStreamInner {
    Tcp(TcpStream),
    #[cfg(windows)]
    NamedPipe(tokio::net::windows::named_pipe::NamedPipeServer),
}

impl PipeStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: PipeStreamInner::Tcp(stream),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_named_pipe(pipe: tokio::net::windows::named_pipe::NamedPipeServer) -> Self {
        Self {
            inner: PipeStreamInner::NamedPipe(pipe),
        }
    }

    /// Which rendezvous primitive carries this stream.
    pub fn kind(&self) -> PlatformKind {
        match &self.inner {
            PipeStreamInner::Tcp(_) => PlatformKind::LoopbackSocket,
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(_) => PlatformKind::NamedPipe,
        }
    }

    /// Tear the connection down from the host side.
    ///
    /// Sockets get a write shutdown so the peer sees end-of-data; pipes are
    /// disconnected from their client. A peer that already left is not an
    /// error.
    pub async fn disconnect(&mut self) -> io::Result<()> {
        match &mut self.inner {
            PipeStreamInner::Tcp(stream) => match stream.shutdown().await {
                Ok(()) => Ok(()),
                Err(err) if is_peer_gone(&err) => Ok(()),
                Err(err) => Err(err),
            },
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(pipe) => match pipe.disconnect() {
                Ok(()) => Ok(()),
                Err(err) if is_peer_gone(&err) => Ok(()),
                Err(err) => Err(err),
            },
        }
    }
}

fn is_peer_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

impl Transience for PipeStream {
    fn is_transient(&self) -> bool {
        match &self.inner {
            PipeStreamInner::Tcp(stream) => stream.is_transient(),
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(_) => false,
        }
    }
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            PipeStreamInner::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(pipe) => Pin::new(pipe).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            PipeStreamInner::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(pipe) => Pin::new(pipe).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            PipeStreamInner::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(pipe) => Pin::new(pipe).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            PipeStreamInner::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(pipe) => Pin::new(pipe).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for PipeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            PipeStreamInner::Tcp(stream) => f
                .debug_struct("PipeStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
            #[cfg(windows)]
            PipeStreamInner::NamedPipe(_) => f
                .debug_struct("PipeStream")
                .field("type", &"named-pipe")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn in_memory_sinks_are_not_transient() {
        assert!(!Vec::<u8>::new().is_transient());
        assert!(!io::Cursor::new(Vec::<u8>::new()).is_transient());
        let mut vec = Vec::<u8>::new();
        let by_ref = &mut vec;
        assert!(!by_ref.is_transient());
    }

    #[tokio::test]
    async fn tcp_stream_is_transient_and_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            received
        });

        let (accepted, _) = listener.accept().await.unwrap();
        let mut stream = PipeStream::from_tcp(accepted);
        assert!(stream.is_transient());
        assert_eq!(stream.kind(), PlatformKind::LoopbackSocket);

        stream.write_all(b"frame").await.unwrap();
        stream.disconnect().await.unwrap();

        assert_eq!(client.await.unwrap(), b"frame");
    }
}
