//! Pipe arguments: stream data into or out of a media subprocess.
//!
//! A [`PipeArgument`] is driven by orchestration code in three steps:
//! 1. [`pre`](PipeArgument::pre) opens the endpoint and starts waiting for
//!    the subprocess; its path goes on the subprocess command line.
//! 2. [`during`](PipeArgument::during) runs the [`DataPump`] while the
//!    subprocess runs. Cancellation ends it quietly.
//! 3. [`post`](PipeArgument::post) releases every OS handle.
//!
//! Outbound arguments feed a [`PipeSource`] (raw video frames, any byte
//! stream) to the subprocess; inbound arguments drain its output into a
//! [`PipeSink`].

pub mod argument;
pub mod error;
pub mod pump;
pub mod sink;
pub mod source;

pub use argument::{PipeArgument, PipeState};
pub use error::{PipeError, Result};
pub use pump::{DataPump, PumpOutcome};
pub use sink::{PipeSink, StreamSink};
pub use source::{FrameShape, PipeSource, RawVideoSource, StreamSource, DEFAULT_FRAME_RATE};
