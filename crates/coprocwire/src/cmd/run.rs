use std::fs;

use coprocwire_frame::Operation;

use crate::cmd::{open_client, report, RunArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_call, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let source = resolve_source(&args)?;
    let mut client = open_client(&args.connect)?;
    let call_id = client.next_call_id();
    let payload = client
        .run_program(&source)
        .map_err(|err| client_error("program failed", err))?;

    print_call(&report(Operation::Program, call_id, payload, None), format);
    Ok(SUCCESS)
}

fn resolve_source(args: &RunArgs) -> CliResult<String> {
    if let Some(source) = &args.source {
        return Ok(source.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --source or --file is required"))
}
