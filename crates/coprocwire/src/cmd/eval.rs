use coprocwire_frame::Operation;

use crate::cmd::{open_client, report, EvalArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_call, OutputFormat};

pub fn run(args: EvalArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = open_client(&args.connect)?;
    let call_id = client.next_call_id();
    let payload = client
        .evaluate(&args.expression)
        .map_err(|err| client_error("eval failed", err))?;

    print_call(&report(Operation::Eval, call_id, payload, None), format);
    Ok(SUCCESS)
}
