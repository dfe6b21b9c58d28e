mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "coprocwire", version, about = "Coprocessor call CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::DecodeMode;

    #[test]
    fn parses_call_with_decode() {
        let cli = Cli::try_parse_from([
            "coprocwire",
            "call",
            "--endpoint",
            "unix:/tmp/c.sock",
            "getUnread",
            "--decode",
            "counts",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.name, "getUnread");
                assert_eq!(args.arguments, "");
                assert_eq!(args.decode, Some(DecodeMode::Counts));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn run_requires_a_program_source() {
        let err = Cli::try_parse_from(["coprocwire", "run", "--endpoint", "unix:/tmp/c.sock"])
            .expect_err("missing source should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_conflicting_program_sources() {
        let err = Cli::try_parse_from([
            "coprocwire",
            "run",
            "--endpoint",
            "unix:/tmp/c.sock",
            "--source",
            "x",
            "--file",
            "/tmp/p.js",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_eval_with_app_id() {
        let cli = Cli::try_parse_from([
            "coprocwire",
            "--format",
            "raw",
            "eval",
            "-e",
            "tcp:127.0.0.1:9000",
            "--app-id",
            "chat-ui",
            "1+1",
        ])
        .expect("eval args should parse");

        match cli.command {
            Command::Eval(args) => {
                assert_eq!(args.connect.app_id, "chat-ui");
                assert_eq!(args.expression, "1+1");
            }
            other => panic!("expected eval, got {other:?}"),
        }
    }
}
