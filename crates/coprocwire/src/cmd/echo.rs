use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use coprocwire_client::{unpack_function_call, ClientError, Responder, ServeOutcome};
use coprocwire_frame::{CallEnvelope, FrameError, Operation, ReadError};
use coprocwire_transport::{SocketListener, TransportError};
use tracing::{info, warn};

use crate::cmd::{parse_duration, reader_config, EchoArgs};
use crate::exit::{client_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

const ECHO_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = parse_duration(&args.idle_timeout)?;
    let reader = reader_config(idle_timeout, ECHO_POLL_INTERVAL);

    let listener =
        SocketListener::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %listener.path().display(), "echo companion listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let limit_reached = |answered: u64| args.max_calls.is_some_and(|max| answered >= max);
    let mut answered = 0u64;

    while running.load(Ordering::SeqCst) && !limit_reached(answered) {
        let transport = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        info!("client connected");

        let mut responder = Responder::new(transport, reader.clone());
        while running.load(Ordering::SeqCst) && !limit_reached(answered) {
            match responder.serve_one(echo_call) {
                Ok(ServeOutcome::Served(_)) => answered += 1,
                Ok(ServeOutcome::Closed) => break,
                Ok(ServeOutcome::Idle | ServeOutcome::Rejected(_)) => {}
                Err(err) if is_disconnect(&err) => {
                    warn!(error = %err, "client went away mid-call");
                    break;
                }
                Err(err) => return Err(client_error("serve failed", err)),
            }
        }
    }

    info!(answered, "echo companion stopping");
    Ok(SUCCESS)
}

/// Eval and function calls echo their input; programs succeed silently.
fn echo_call(call: &CallEnvelope) -> Result<String, String> {
    info!(
        call_id = call.call_id,
        operation = %call.operation,
        bytes = call.operand.len(),
        "echoing call"
    );
    Ok(match call.operation {
        Operation::Eval => call.operand.clone(),
        Operation::Function => unpack_function_call(&call.operand).1.to_string(),
        Operation::Program => String::new(),
    })
}

fn is_disconnect(err: &ClientError) -> bool {
    let transport = match err {
        ClientError::Transport(err)
        | ClientError::Frame(FrameError::Transport(err))
        | ClientError::Read(ReadError::Transport(err)) => err,
        _ => return false,
    };
    match transport {
        TransportError::Closed => true,
        TransportError::Io(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
