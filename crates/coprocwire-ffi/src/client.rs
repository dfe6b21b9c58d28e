use std::os::raw::c_char;

use coprocwire_client::{connect, ClientConfig, Endpoint};

use crate::args;
use crate::error;
use crate::types::{ClientHandle, CwClientHandle, CwResult};

fn with_client_mut(handle: CwClientHandle, f: impl FnOnce(&mut ClientHandle) -> CwResult) -> CwResult {
    if handle.is_null() {
        return error::set_invalid_argument("client handle cannot be null");
    }

    let client_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &mut *(handle as *mut ClientHandle) }
    };

    f(client_handle)
}

fn finish_call(
    result: coprocwire_client::Result<String>,
    out_payload: *mut *mut c_char,
) -> CwResult {
    match result {
        Ok(payload) => args::write_string_out(out_payload, payload),
        Err(err) => error::map_client_error(&err),
    }
}

/// Connect to the companion at `endpoint`.
///
/// `endpoint` uses the `unix:<path>`, `tcp:<host>:<port>` or
/// `serial:<device>[@<baud>]` forms. A null `application_id` selects the
/// default id. `timeout_iterations` of 0 keeps the default read budget.
/// Returns null on failure; see `cw_last_error`.
///
/// # Safety
/// `endpoint` must be a non-null UTF-8 C string. `application_id` must be
/// null or a UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn cw_client_connect(
    endpoint: *const c_char,
    application_id: *const c_char,
    timeout_iterations: u32,
) -> CwClientHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let endpoint = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(endpoint, "endpoint") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };

        let mut config = ClientConfig::default();
        if !application_id.is_null() {
            // SAFETY: We validate UTF-8 in helper.
            match unsafe { args::required_str_arg(application_id, "application_id") } {
                Some(v) => config.application_id = v.to_string(),
                None => return std::ptr::null_mut(),
            }
        }
        if timeout_iterations > 0 {
            config.reader.timeout_iterations = timeout_iterations;
        }

        let endpoint = match endpoint.parse::<Endpoint>() {
            Ok(v) => v,
            Err(err) => {
                let _ = error::map_client_error(&err);
                return std::ptr::null_mut();
            }
        };

        match connect(&endpoint, config) {
            Ok(client) => Box::into_raw(Box::new(ClientHandle { client })) as CwClientHandle,
            Err(err) => {
                let _ = error::map_client_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Free a client handle and close its link.
///
/// # Safety
/// `client` must be null or a handle previously returned by `cw_client_connect`.
#[no_mangle]
pub unsafe extern "C" fn cw_client_free(client: CwClientHandle) {
    crate::ffi_boundary((), || {
        if client.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by cw_client_connect.
        unsafe {
            drop(Box::from_raw(client as *mut ClientHandle));
        }
    });
}

/// Evaluate an expression. On success `*out_payload` receives a string that
/// must be released with `cw_string_free`.
///
/// # Safety
/// `client` must be a valid handle, `expression` a UTF-8 C string, and
/// `out_payload` a writable pointer.
#[no_mangle]
pub unsafe extern "C" fn cw_client_evaluate(
    client: CwClientHandle,
    expression: *const c_char,
    out_payload: *mut *mut c_char,
) -> CwResult {
    crate::ffi_boundary(CwResult::Internal, || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let Some(expression) = (unsafe { args::required_str_arg(expression, "expression") })
        else {
            return CwResult::InvalidArgument;
        };

        with_client_mut(client, |handle| {
            finish_call(handle.client.evaluate(expression), out_payload)
        })
    })
}

/// Invoke a named function. A null `arguments` is sent as empty.
///
/// # Safety
/// `client` must be a valid handle, `name` a UTF-8 C string, `arguments`
/// null or a UTF-8 C string, and `out_payload` a writable pointer.
#[no_mangle]
pub unsafe extern "C" fn cw_client_call_function(
    client: CwClientHandle,
    name: *const c_char,
    arguments: *const c_char,
    out_payload: *mut *mut c_char,
) -> CwResult {
    crate::ffi_boundary(CwResult::Internal, || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let Some(name) = (unsafe { args::required_str_arg(name, "name") }) else {
            return CwResult::InvalidArgument;
        };
        // SAFETY: We validate UTF-8 in helper.
        let Some(arguments) = (unsafe { args::optional_str_arg(arguments, "arguments") }) else {
            return CwResult::InvalidArgument;
        };

        with_client_mut(client, |handle| {
            finish_call(handle.client.call_function(name, arguments), out_payload)
        })
    })
}

/// Load and run a program on the companion side.
///
/// # Safety
/// `client` must be a valid handle, `source` a UTF-8 C string, and
/// `out_payload` a writable pointer.
#[no_mangle]
pub unsafe extern "C" fn cw_client_run_program(
    client: CwClientHandle,
    source: *const c_char,
    out_payload: *mut *mut c_char,
) -> CwResult {
    crate::ffi_boundary(CwResult::Internal, || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let Some(source) = (unsafe { args::required_str_arg(source, "source") }) else {
            return CwResult::InvalidArgument;
        };

        with_client_mut(client, |handle| {
            finish_call(handle.client.run_program(source), out_payload)
        })
    })
}

/// The id the next call on `client` will use, or `u64::MAX` for a null handle.
///
/// # Safety
/// `client` must be null or a valid handle.
#[no_mangle]
pub unsafe extern "C" fn cw_client_next_call_id(client: CwClientHandle) -> u64 {
    crate::ffi_boundary(u64::MAX, || {
        if client.is_null() {
            let _ = error::set_invalid_argument("client handle cannot be null");
            return u64::MAX;
        }
        // SAFETY: Pointer validity is guaranteed by the caller.
        let handle = unsafe { &*(client as *const ClientHandle) };
        handle.client.next_call_id()
    })
}
