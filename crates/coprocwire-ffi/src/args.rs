use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error;
use crate::types::CwResult;

/// Convert a required C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg<'a>(value: *const c_char, name: &str) -> Option<&'a str> {
    if value.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null"));
        return None;
    }

    let as_cstr = {
        // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
        unsafe { CStr::from_ptr(value) }
    };

    match as_cstr.to_str() {
        Ok(v) => Some(v),
        Err(_) => {
            let _ = error::set_invalid_argument(format!("{name} must be valid UTF-8"));
            None
        }
    }
}

/// Like [`required_str_arg`], but null means the empty string.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn optional_str_arg<'a>(value: *const c_char, name: &str) -> Option<&'a str> {
    if value.is_null() {
        return Some("");
    }
    // SAFETY: Forwarded caller guarantee.
    unsafe { required_str_arg(value, name) }
}

/// Hand a payload string to the caller through `out`.
///
/// Any string already in `*out` is left alone; the caller owns it.
pub(crate) fn write_string_out(out: *mut *mut c_char, payload: String) -> CwResult {
    if out.is_null() {
        return error::set_invalid_argument("out_payload cannot be null");
    }
    let Ok(text) = CString::new(payload) else {
        error::set_error_message("payload contains a NUL byte");
        return CwResult::ProtocolError;
    };

    // SAFETY: `out` is non-null and points to caller-owned storage.
    unsafe {
        *out = text.into_raw();
    }
    CwResult::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_required_arg_sets_error() {
        // SAFETY: Null is an accepted input.
        let value = unsafe { required_str_arg(std::ptr::null(), "endpoint") };
        assert!(value.is_none());
    }

    #[test]
    fn null_optional_arg_is_empty() {
        // SAFETY: Null is an accepted input.
        let value = unsafe { optional_str_arg(std::ptr::null(), "arguments") };
        assert_eq!(value, Some(""));
    }

    #[test]
    fn payload_with_nul_is_refused() {
        let mut out: *mut c_char = std::ptr::null_mut();
        let result = write_string_out(&mut out, "a\0b".to_string());
        assert_eq!(result, CwResult::ProtocolError);
        assert!(out.is_null());
    }

    #[test]
    fn payload_is_written_out() {
        let mut out: *mut c_char = std::ptr::null_mut();
        assert_eq!(write_string_out(&mut out, "Alice".to_string()), CwResult::Ok);
        // SAFETY: `out` was populated by `write_string_out`.
        let text = unsafe { CStr::from_ptr(out) }.to_str().map(str::to_owned);
        assert_eq!(text.as_deref(), Ok("Alice"));
        // SAFETY: `out` came from CString::into_raw.
        unsafe { crate::cw_string_free(out) };
    }
}
