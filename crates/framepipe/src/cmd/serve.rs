use std::time::Duration;

use framepipe_pipe::{PipeArgument, StreamSink, StreamSource};
use framepipe_transport::{Direction, PipeConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{
    io_error, pipe_error, CliError, CliResult, CANCELLED, INTERNAL, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_endpoint, EndpointOutput, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = pipe_config(&args)?;
    let direction = Direction::from(args.direction);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    let token = CancellationToken::new();
    install_ctrlc_handler(token.clone())?;

    runtime.block_on(serve(args, direction, config, format, token))
}

async fn serve(
    args: ServeArgs,
    direction: Direction,
    config: PipeConfig,
    format: OutputFormat,
    token: CancellationToken,
) -> CliResult<i32> {
    let argument = match direction {
        Direction::Outbound => {
            let path = args
                .input
                .ok_or_else(|| CliError::new(USAGE, "outbound serve requires --input"))?;
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|err| io_error(&format!("open {}", path.display()), err))?;
            let source = StreamSource::new(file)
                .with_stream_arguments(args.stream_args.unwrap_or_default());
            PipeArgument::input(source)
        }
        Direction::Inbound => {
            let path = args
                .output
                .ok_or_else(|| CliError::new(USAGE, "inbound serve requires --output"))?;
            let file = tokio::fs::File::create(&path)
                .await
                .map_err(|err| io_error(&format!("create {}", path.display()), err))?;
            PipeArgument::output(StreamSink::new(file))
        }
    };
    let mut argument = argument.with_config(config);

    let path = argument
        .pre(&token)
        .map_err(|err| pipe_error("open endpoint failed", err))?
        .to_string();
    let text = argument.text().unwrap_or_default();
    let kind = argument
        .kind()
        .map(|kind| kind.as_str())
        .unwrap_or_default();
    print_endpoint(
        &EndpointOutput {
            path: &path,
            direction: direction.as_str(),
            kind,
            argument: &text,
        },
        format,
    );

    let transferred = argument.during(&token).await;
    let attached = argument.attached();
    argument.post();
    transferred.map_err(|err| pipe_error("transfer failed", err))?;

    if token.is_cancelled() {
        info!(path = %path, "serve interrupted");
        return Ok(CANCELLED);
    }
    if !attached {
        return Err(CliError::new(
            TIMEOUT,
            "no subprocess attached before the connect timeout",
        ));
    }
    Ok(SUCCESS)
}

fn pipe_config(args: &ServeArgs) -> CliResult<PipeConfig> {
    let mut config = PipeConfig::default();
    if let Some(prefix) = &args.prefix {
        if prefix.is_empty() {
            return Err(CliError::new(USAGE, "pipe prefix must not be empty"));
        }
        config.pipe_prefix = prefix.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        if chunk_size == 0 {
            return Err(CliError::new(USAGE, "chunk size must be greater than zero"));
        }
        config.chunk_size = chunk_size;
    }
    if let Some(timeout) = &args.connect_timeout {
        config.connect_timeout = Some(parse_duration(timeout)?);
    }
    Ok(config)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn install_ctrlc_handler(token: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || token.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::DirectionArg;

    fn serve_args() -> ServeArgs {
        ServeArgs {
            direction: DirectionArg::Inbound,
            input: None,
            output: None,
            stream_args: None,
            chunk_size: None,
            connect_timeout: None,
            prefix: None,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn config_follows_flags() {
        let args = ServeArgs {
            chunk_size: Some(512),
            connect_timeout: Some("250ms".to_string()),
            prefix: Some("render".to_string()),
            ..serve_args()
        };
        let config = pipe_config(&args).unwrap();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.pipe_prefix, "render");

        let defaults = pipe_config(&serve_args()).unwrap();
        assert_eq!(defaults.chunk_size, PipeConfig::default().chunk_size);
        assert!(defaults.connect_timeout.is_none());
    }

    #[test]
    fn zero_chunk_size_is_usage_error() {
        let args = ServeArgs {
            chunk_size: Some(0),
            ..serve_args()
        };
        assert_eq!(pipe_config(&args).unwrap_err().code, USAGE);
    }
}
