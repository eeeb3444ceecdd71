use tokio::net::windows::named_pipe::{NamedPipeServer, PipeMode, ServerOptions};
use tracing::{debug, info};
use windows_sys::Win32::Foundation::{ERROR_BROKEN_PIPE, ERROR_NO_DATA, ERROR_PIPE_NOT_CONNECTED};

use crate::endpoint::{pipe_path, unique_pipe_name, Direction};
use crate::error::{Result, TransportError};
use crate::traits::PipeStream;

/// Single-instance, byte-mode, overlapped named pipe server.
///
/// Must be created from within a Tokio runtime: the pipe handle is
/// registered with the reactor on creation.
pub struct NamedPipeEndpoint {
    server: NamedPipeServer,
    path: String,
}

impl NamedPipeEndpoint {
    /// Create a uniquely named pipe open in `direction` only.
    pub fn create(prefix: &str, direction: Direction) -> Result<Self> {
        let path = pipe_path(&unique_pipe_name(prefix));

        let mut options = ServerOptions::new();
        options
            .first_pipe_instance(true)
            .max_instances(1)
            .pipe_mode(PipeMode::Byte);
        match direction {
            Direction::Inbound => options.access_inbound(true).access_outbound(false),
            Direction::Outbound => options.access_inbound(false).access_outbound(true),
        };

        let server = options
            .create(&path)
            .map_err(|source| TransportError::CreatePipe {
                path: path.clone(),
                source,
            })?;

        info!(%path, %direction, "created named pipe");

        Ok(Self { server, path })
    }

    /// The `\\.\pipe\...` path handed to the subprocess.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the subprocess to open the pipe.
    ///
    /// A pipe left unconnected when the wait returns is reported as
    /// [`TransportError::Cancelled`], not as an I/O failure.
    pub async fn connect(self) -> Result<PipeStream> {
        match self.server.connect().await {
            Ok(()) => {
                debug!(path = %self.path, "named pipe client connected");
                Ok(PipeStream::from_named_pipe(self.server))
            }
            Err(err) if is_unconnected(&err) => {
                debug!(path = %self.path, error = %err, "named pipe left unconnected");
                Err(TransportError::Cancelled)
            }
            Err(err) => Err(TransportError::Accept(err)),
        }
    }
}

fn is_unconnected(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error().map(|code| code as u32),
        Some(ERROR_NO_DATA | ERROR_BROKEN_PIPE | ERROR_PIPE_NOT_CONNECTED)
    )
}

impl std::fmt::Debug for NamedPipeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedPipeEndpoint")
            .field("path", &self.path)
            .finish()
    }
}
