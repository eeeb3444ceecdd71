//! Rendezvous endpoints for streaming bytes into and out of a media subprocess.
//!
//! The subprocess opens the endpoint by path, the way it would open a file:
//! - Named pipes (`\\.\pipe\...`) on Windows
//! - Loopback TCP listeners (`tcp://127.0.0.1:<port>`) everywhere else
//!
//! This is the lowest layer of framepipe. An endpoint serves exactly one
//! connection, handed out as a [`PipeStream`] by a [`ConnectionTask`].

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(windows)]
pub mod named_pipe;

pub use config::{PipeConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PIPE_PREFIX};
pub use connection::ConnectionTask;
pub use endpoint::{pipe_path, unique_pipe_name, Direction, PlatformKind, TransportEndpoint};
pub use error::{Result, TransportError};
pub use tcp::LoopbackListener;
pub use traits::{PipeRead, PipeStream, PipeWrite, Transience};

#[cfg(windows)]
pub use named_pipe::NamedPipeEndpoint;
