//! Stream raster frames and byte streams to subprocesses over OS pipes.
//!
//! A [`pipe::PipeArgument`] stands in for a file path on a subprocess command
//! line. It opens a one-shot endpoint (a named pipe on Windows, a loopback
//! socket elsewhere), waits for the subprocess to attach, pumps data through,
//! and releases every resource afterwards.
//!
//! # Crate Structure
//!
//! - [`transport`]: Pipe endpoints, connection tasks and stream traits
//! - [`frame`]: Raster layouts, pixel-format tags and the frame adapter
//! - [`pipe`]: Pre/during/post pipe arguments, sources and sinks (behind `pipe` feature)

/// Re-export transport types.
pub mod transport {
    pub use framepipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framepipe_frame::*;
}

/// Re-export pipe argument types (requires `pipe` feature).
#[cfg(feature = "pipe")]
pub mod pipe {
    pub use framepipe_pipe::*;
}
