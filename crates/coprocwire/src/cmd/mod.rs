use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use coprocwire_client::{
    connect, decode_count_map, decode_list, ClientConfig, DynClient, Endpoint,
    DEFAULT_APPLICATION_ID,
};
use coprocwire_frame::{Operation, ReaderConfig};
use tracing::warn;

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::{CallReport, Decoded, OutputFormat};

pub mod call;
pub mod echo;
pub mod eval;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate an expression on the companion.
    Eval(EvalArgs),
    /// Call a named companion function.
    Call(CallArgs),
    /// Load and run a program on the companion.
    Run(RunArgs),
    /// Serve an echoing companion on a Unix socket.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Eval(args) => eval::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Companion endpoint: unix:<path>, tcp:<host>:<port>, serial:<device>[@<baud>].
    #[arg(long, short = 'e', env = "COPROCWIRE_ENDPOINT")]
    pub endpoint: String,
    /// Application id echoed back in every response.
    #[arg(long, env = "COPROCWIRE_APP_ID", default_value = DEFAULT_APPLICATION_ID)]
    pub app_id: String,
    /// Give up on a response after this long (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// Pause between byte-count polls.
    #[arg(long, default_value = "10ms")]
    pub poll_interval: String,
    /// Keep input already pending on the link instead of discarding it.
    #[arg(long)]
    pub no_drain: bool,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Expression to evaluate.
    pub expression: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DecodeMode {
    /// Comma-delimited names.
    List,
    /// Comma-delimited name:::count entries.
    Counts,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Function name.
    pub name: String,
    /// Argument string, passed through as-is.
    #[arg(default_value = "")]
    pub arguments: String,
    /// Decode the payload before printing.
    #[arg(long, value_name = "SHAPE")]
    pub decode: Option<DecodeMode>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("program").required(true).args(["source", "file"])))]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Program source text.
    #[arg(long, conflicts_with = "file")]
    pub source: Option<String>,
    /// Read program source from a file.
    #[arg(long, conflicts_with = "source")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after answering this many calls.
    #[arg(long)]
    pub max_calls: Option<u64>,
    /// How long one read waits before re-checking for shutdown (e.g. 500ms).
    #[arg(long, default_value = "500ms")]
    pub idle_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

/// Reader settings that give up after roughly `timeout`.
pub(crate) fn reader_config(timeout: Duration, poll_interval: Duration) -> ReaderConfig {
    let poll_ms = poll_interval.as_millis().max(1);
    let iterations = timeout.as_millis().div_ceil(poll_ms).max(1);
    ReaderConfig {
        poll_interval,
        timeout_iterations: u32::try_from(iterations).unwrap_or(u32::MAX),
        ..ReaderConfig::default()
    }
}

pub(crate) fn client_config(args: &ConnectArgs) -> CliResult<ClientConfig> {
    let timeout = parse_duration(&args.timeout)?;
    let poll_interval = parse_duration(&args.poll_interval)?;
    Ok(ClientConfig {
        application_id: args.app_id.clone(),
        reader: reader_config(timeout, poll_interval),
        drain_before_call: !args.no_drain,
        ..ClientConfig::default()
    })
}

pub(crate) fn open_client(args: &ConnectArgs) -> CliResult<DynClient> {
    let config = client_config(args)?;
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .map_err(|err| client_error("invalid endpoint", err))?;
    connect(&endpoint, config).map_err(|err| client_error("connect failed", err))
}

pub(crate) fn report(
    operation: Operation,
    call_id: u64,
    payload: String,
    decode: Option<DecodeMode>,
) -> CallReport {
    let decoded = match decode {
        None => Decoded::Text,
        Some(DecodeMode::List) => Decoded::List(decode_list(&payload)),
        Some(DecodeMode::Counts) => {
            let decoded = decode_count_map(&payload);
            for err in &decoded.errors {
                warn!(error = %err, "skipping count entry");
            }
            Decoded::Counts(decoded)
        }
    };
    CallReport {
        operation,
        call_id,
        payload,
        decoded,
    }
}
