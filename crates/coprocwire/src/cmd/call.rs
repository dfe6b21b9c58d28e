use coprocwire_frame::Operation;

use crate::cmd::{open_client, report, CallArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_call, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = open_client(&args.connect)?;
    let call_id = client.next_call_id();
    let payload = client
        .call_function(&args.name, &args.arguments)
        .map_err(|err| client_error(&format!("call {} failed", args.name), err))?;

    print_call(
        &report(Operation::Function, call_id, payload, args.decode),
        format,
    );
    Ok(SUCCESS)
}
