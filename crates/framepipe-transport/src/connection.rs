use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TransportError};
use crate::traits::PipeStream;

/// A pending connection started by [`TransportEndpoint::begin_connect`](crate::TransportEndpoint::begin_connect).
///
/// Resolves to the connected [`PipeStream`], or to
/// [`TransportError::Cancelled`] when the peer never attached.
#[derive(Debug)]
pub struct ConnectionTask {
    handle: JoinHandle<Result<PipeStream>>,
    token: CancellationToken,
}

impl ConnectionTask {
    pub(crate) fn new(handle: JoinHandle<Result<PipeStream>>, token: CancellationToken) -> Self {
        Self { handle, token }
    }

    /// Wait for the background connect/accept to finish.
    pub async fn wait(self) -> Result<PipeStream> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(TransportError::Cancelled),
            Err(err) => Err(TransportError::Io(std::io::Error::other(format!(
                "connection task failed: {err}"
            )))),
        }
    }

    /// Abort the wait. The task resolves to [`TransportError::Cancelled`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the background wait has finished, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
