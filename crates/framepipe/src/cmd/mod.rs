use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use framepipe_transport::Direction;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod formats;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a pipe endpoint and pump a file through it.
    Serve(ServeArgs),
    /// List raster layouts and their pixel-format tags.
    Formats(FormatsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Formats(args) => formats::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DirectionArg {
    /// Host writes, subprocess reads (`--input`).
    Outbound,
    /// Subprocess writes, host reads (`--output`).
    Inbound,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Outbound => Direction::Outbound,
            DirectionArg::Inbound => Direction::Inbound,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Which way data flows through the endpoint.
    #[arg(long, value_enum)]
    pub direction: DirectionArg,
    /// File to send to the subprocess (outbound).
    #[arg(long, conflicts_with = "output")]
    pub input: Option<PathBuf>,
    /// File to receive subprocess output into (inbound).
    #[arg(long, conflicts_with = "input")]
    pub output: Option<PathBuf>,
    /// Input format hint placed before `-i` (outbound), e.g. "-f mp4".
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub stream_args: Option<String>,
    /// Copy block size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,
    /// Give up if no subprocess attaches in time (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub connect_timeout: Option<String>,
    /// Pipe name prefix.
    #[arg(long, env = "FRAMEPIPE_PREFIX")]
    pub prefix: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct FormatsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
