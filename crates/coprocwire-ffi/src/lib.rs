//! coprocwire-ffi: C-ABI exports for the coprocessor client.
//!
//! Handles are opaque pointers. Every call clears and then possibly sets a
//! thread-local error string readable through [`cw_last_error`].

mod args;
mod client;
mod error;
mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;

pub use client::{
    cw_client_call_function, cw_client_connect, cw_client_evaluate, cw_client_free,
    cw_client_next_call_id, cw_client_run_program,
};
pub use types::{
    CwClientHandle, CwResult, CW_ERR_FRAME, CW_ERR_INTERNAL, CW_ERR_INVALID_ARGUMENT,
    CW_ERR_INVALID_CONFIG, CW_ERR_PROTOCOL, CW_ERR_REMOTE_FAILURE, CW_ERR_TIMEOUT,
    CW_ERR_TRANSPORT, CW_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

#[no_mangle]
pub extern "C" fn cw_init() -> CwResult {
    ffi_boundary(CwResult::Internal, || {
        error::clear_error_state();
        CwResult::Ok
    })
}

#[no_mangle]
pub extern "C" fn cw_cleanup() {
    ffi_boundary((), || {
        error::clear_error_state();
    });
}

#[no_mangle]
pub extern "C" fn cw_last_error() -> *const c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

/// Release a payload string returned by a `cw_client_*` call.
///
/// # Safety
/// `value` must be null or a pointer previously handed out by this library.
#[no_mangle]
pub unsafe extern "C" fn cw_string_free(value: *mut c_char) {
    ffi_boundary((), || {
        if value.is_null() {
            return;
        }
        // SAFETY: Caller guarantees `value` came from CString::into_raw.
        unsafe {
            drop(CString::from_raw(value));
        }
    });
}
