use std::fmt;

use framepipe_transport::{
    ConnectionTask, Direction, PipeConfig, PlatformKind, TransportEndpoint,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PipeError, Result};
use crate::pump::{DataPump, PumpOutcome};
use crate::sink::PipeSink;
use crate::source::PipeSource;

/// Lifecycle of a [`PipeArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    Unopened,
    Connecting,
    Transferring,
    Closed,
}

impl PipeState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipeState::Unopened => "unopened",
            PipeState::Connecting => "connecting",
            PipeState::Transferring => "transferring",
            PipeState::Closed => "closed",
        }
    }
}

impl fmt::Display for PipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subprocess argument backed by a pipe endpoint.
///
/// Drive it with [`pre`](Self::pre), then [`during`](Self::during) while
/// the subprocess runs, then [`post`](Self::post):
///
/// ```text
/// Unopened --pre--> Connecting --during--> Transferring --post--> Closed
///     |                 |                                           ^
///     +-----------------+------------------post---------------------+
/// ```
///
/// An argument is single-use: once closed it cannot be opened again.
pub struct PipeArgument {
    pump: DataPump,
    config: PipeConfig,
    state: PipeState,
    endpoint: Option<TransportEndpoint>,
    connection: Option<ConnectionTask>,
    path: Option<String>,
    attached: bool,
}

impl PipeArgument {
    /// Subprocess input: the host writes `source` into the pipe.
    pub fn input(source: impl PipeSource + 'static) -> Self {
        Self::new(DataPump::outbound(source))
    }

    /// Subprocess output: the host reads the pipe into `sink`.
    pub fn output(sink: impl PipeSink + 'static) -> Self {
        Self::new(DataPump::inbound(sink))
    }

    pub fn new(pump: DataPump) -> Self {
        Self {
            pump,
            config: PipeConfig::default(),
            state: PipeState::Unopened,
            endpoint: None,
            connection: None,
            path: None,
            attached: false,
        }
    }

    pub fn with_config(mut self, config: PipeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> PipeState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.pump.direction()
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Endpoint path, available from `pre` on.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Kind of the live endpoint, if any.
    pub fn kind(&self) -> Option<PlatformKind> {
        self.endpoint.as_ref().map(TransportEndpoint::kind)
    }

    /// True once a subprocess has connected to the endpoint.
    pub fn attached(&self) -> bool {
        self.attached
    }

    /// Command-line fragment for the subprocess, available from `pre` on.
    ///
    /// Input: `-y <stream arguments> -i "<path>"`. Output: `"<path>" -y`.
    pub fn text(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        Some(match self.pump.direction() {
            Direction::Outbound => {
                let arguments = self.pump.stream_arguments();
                if arguments.is_empty() {
                    format!("-y -i \"{path}\"")
                } else {
                    format!("-y {arguments} -i \"{path}\"")
                }
            }
            Direction::Inbound => format!("\"{path}\" -y"),
        })
    }

    /// Open the endpoint and start waiting for the subprocess.
    ///
    /// Returns the path to put on the subprocess command line. Fails with
    /// [`PipeError::StateMisuse`] unless the argument is unopened. Must run
    /// inside a Tokio runtime.
    pub fn pre(&mut self, token: &CancellationToken) -> Result<&str> {
        if self.state != PipeState::Unopened {
            return Err(PipeError::StateMisuse {
                operation: "pre",
                state: self.state,
            });
        }

        let mut endpoint = TransportEndpoint::open(self.direction(), &self.config)?;
        self.pump.configure(&self.config);
        let connection = endpoint.begin_connect(token)?;

        info!(
            path = endpoint.path(),
            direction = %endpoint.direction(),
            kind = %endpoint.kind(),
            "pipe endpoint opened"
        );

        let path = endpoint.path().to_string();
        self.endpoint = Some(endpoint);
        self.connection = Some(connection);
        self.state = PipeState::Connecting;
        Ok(self.path.insert(path).as_str())
    }

    /// Wait for the subprocess, then run the pump.
    ///
    /// Cancellation (peer never connected, token fired, connect timeout)
    /// is logged and swallowed: the call still returns `Ok(())`. The
    /// connection is torn down before returning, so [`post`](Self::post)
    /// never blocks.
    pub async fn during(&mut self, token: &CancellationToken) -> Result<()> {
        if self.state != PipeState::Connecting {
            return Err(PipeError::StateMisuse {
                operation: "during",
                state: self.state,
            });
        }
        let connection = self.connection.take().ok_or(PipeError::StateMisuse {
            operation: "during",
            state: self.state,
        })?;
        self.state = PipeState::Transferring;

        match self.transfer(connection, token).await {
            Ok(outcome) => {
                debug!(path = ?self.path, ?outcome, "pipe transfer finished");
                Ok(())
            }
            Err(err) if err.is_cancellation() => {
                debug!(path = ?self.path, error = %err, "pipe transfer cancelled");
                Ok(())
            }
            Err(err) => {
                warn!(path = ?self.path, error = %err, "pipe transfer failed");
                Err(err)
            }
        }
    }

    async fn transfer(
        &mut self,
        connection: ConnectionTask,
        token: &CancellationToken,
    ) -> Result<PumpOutcome> {
        let connected = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipeError::Cancelled),
            stream = connection.wait() => stream.map_err(PipeError::from),
        };
        let mut stream = match connected {
            Ok(stream) => stream,
            Err(err) => {
                if let Some(endpoint) = self.endpoint.as_mut() {
                    endpoint.close();
                }
                return Err(err);
            }
        };
        self.attached = true;
        debug!(path = ?self.path, "subprocess connected");

        let outcome = self.pump.run(&mut stream, token).await;

        if let Err(err) = stream.disconnect().await {
            debug!(error = %err, "disconnect after transfer failed");
        }
        drop(stream);
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.close();
        }

        outcome
    }

    /// Release every OS resource acquired by `pre`.
    ///
    /// Valid from any state, idempotent. Callers must let `during` finish
    /// first when it was started.
    pub fn post(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel();
        }
        if let Some(mut endpoint) = self.endpoint.take() {
            debug!(path = endpoint.path(), "releasing pipe endpoint");
            endpoint.close();
        }
        self.state = PipeState::Closed;
    }
}

impl Drop for PipeArgument {
    fn drop(&mut self) {
        self.post();
    }
}

impl fmt::Debug for PipeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeArgument")
            .field("direction", &self.direction())
            .field("state", &self.state)
            .field("path", &self.path)
            .finish()
    }
}
