use framepipe_transport::{Direction, PipeConfig, PipeRead, PipeWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::sink::PipeSink;
use crate::source::PipeSource;

/// How a pump run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The source was exhausted or the stream reached end-of-data.
    Completed,
    /// Cancellation stopped the transfer after the current chunk.
    Cancelled,
}

/// Moves bytes between a connected stream and the application.
///
/// Outbound pumps write a [`PipeSource`] into the stream; inbound pumps read
/// the stream into a [`PipeSink`].
pub enum DataPump {
    Outbound(Box<dyn PipeSource>),
    Inbound(Box<dyn PipeSink>),
}

impl DataPump {
    pub fn outbound(source: impl PipeSource + 'static) -> Self {
        DataPump::Outbound(Box::new(source))
    }

    pub fn inbound(sink: impl PipeSink + 'static) -> Self {
        DataPump::Inbound(Box::new(sink))
    }

    pub fn direction(&self) -> Direction {
        match self {
            DataPump::Outbound(_) => Direction::Outbound,
            DataPump::Inbound(_) => Direction::Inbound,
        }
    }

    /// Hand the config to the source or sink.
    pub fn configure(&mut self, config: &PipeConfig) {
        match self {
            DataPump::Outbound(source) => source.configure(config),
            DataPump::Inbound(sink) => sink.configure(config),
        }
    }

    /// Stream-format arguments of an outbound source; empty for inbound pumps.
    pub fn stream_arguments(&self) -> String {
        match self {
            DataPump::Outbound(source) => source.stream_arguments(),
            DataPump::Inbound(_) => String::new(),
        }
    }

    /// Run the transfer to completion.
    ///
    /// Cancellation is not an error here: it ends the run with
    /// [`PumpOutcome::Cancelled`]. Every other failure is returned.
    pub async fn run<S>(&mut self, stream: &mut S, token: &CancellationToken) -> Result<PumpOutcome>
    where
        S: PipeRead + PipeWrite,
    {
        let result = match self {
            DataPump::Outbound(source) => source.write(stream, token).await,
            DataPump::Inbound(sink) => sink.read(stream, token).await,
        };

        match result {
            Ok(()) => Ok(PumpOutcome::Completed),
            Err(err) if err.is_cancellation() => {
                debug!(direction = %self.direction(), "pump cancelled");
                Ok(PumpOutcome::Cancelled)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for DataPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPump")
            .field("direction", &self.direction())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::error::PipeError;
    use crate::sink::StreamSink;
    use crate::source::StreamSource;

    struct CancellingSource;

    #[async_trait]
    impl PipeSource for CancellingSource {
        fn stream_arguments(&self) -> String {
            "-f s16le".to_string()
        }

        async fn write(
            &mut self,
            _stream: &mut dyn PipeWrite,
            _token: &CancellationToken,
        ) -> Result<()> {
            Err(PipeError::Cancelled)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PipeSource for FailingSource {
        fn stream_arguments(&self) -> String {
            String::new()
        }

        async fn write(
            &mut self,
            _stream: &mut dyn PipeWrite,
            _token: &CancellationToken,
        ) -> Result<()> {
            Err(PipeError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[tokio::test]
    async fn cancellation_inside_pump_is_swallowed() {
        let (_peer, mut host) = tokio::io::duplex(64);
        let mut pump = DataPump::outbound(CancellingSource);
        assert_eq!(pump.stream_arguments(), "-f s16le");

        let outcome = pump
            .run(&mut host, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, PumpOutcome::Cancelled);
    }

    #[tokio::test]
    async fn other_failures_propagate() {
        let (_peer, mut host) = tokio::io::duplex(64);
        let mut pump = DataPump::outbound(FailingSource);

        let err = pump
            .run(&mut host, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipeError::Io(_)));
    }

    #[tokio::test]
    async fn outbound_and_inbound_move_bytes() {
        let (mut peer, mut host) = tokio::io::duplex(1024);
        let mut outbound = DataPump::outbound(StreamSource::new(std::io::Cursor::new(
            b"outbound".to_vec(),
        )));
        assert_eq!(outbound.direction(), Direction::Outbound);
        let outcome = outbound
            .run(&mut host, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, PumpOutcome::Completed);

        let mut received = [0u8; 8];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"outbound");

        peer.write_all(b"inbound").await.unwrap();
        drop(peer);
        let mut inbound = DataPump::inbound(StreamSink::new(tokio::io::sink()));
        assert_eq!(inbound.direction(), Direction::Inbound);
        let outcome = inbound
            .run(&mut host, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, PumpOutcome::Completed);
    }
}
