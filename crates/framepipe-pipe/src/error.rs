use framepipe_frame::FrameError;
use framepipe_transport::TransportError;

use crate::argument::PipeState;
use crate::source::FrameShape;

/// Errors that can occur while driving a pipe argument.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame serialization error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A lifecycle step was called out of order.
    #[error("cannot {operation} a pipe argument that is {state}")]
    StateMisuse {
        operation: &'static str,
        state: PipeState,
    },

    /// A raw video source produced a frame unlike the first one.
    #[error("frame mismatch: stream is {expected}, frame is {actual}")]
    FrameMismatch {
        expected: FrameShape,
        actual: FrameShape,
    },

    /// A raw video source was created without frames.
    #[error("raw video source has no frames")]
    EmptySource,

    /// I/O error while copying a stream.
    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transfer was cancelled.
    #[error("pipe transfer cancelled")]
    Cancelled,
}

impl PipeError {
    /// True for cancellation signals, which `during` recovers from.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            PipeError::Cancelled | PipeError::Transport(TransportError::Cancelled)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipeError>;
