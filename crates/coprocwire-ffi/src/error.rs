use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use coprocwire_client::ClientError;

use crate::types::CwResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> CwResult {
    set_error_message(message);
    CwResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_client_error(err: &ClientError) -> CwResult {
    set_error_message(err.to_string());
    match err {
        ClientError::Transport(_) => CwResult::TransportError,
        ClientError::Frame(_) => CwResult::FrameError,
        ClientError::Read(read) if read.is_timeout() => CwResult::Timeout,
        ClientError::Read(_) => CwResult::TransportError,
        ClientError::Protocol(_) if err.remote_failure().is_some() => CwResult::RemoteFailure,
        ClientError::Protocol(_) => CwResult::ProtocolError,
        ClientError::InvalidFunctionName(_) => CwResult::InvalidArgument,
        ClientError::InvalidConfig(_) => CwResult::InvalidConfig,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
