use std::ffi::c_void;

use coprocwire_client::DynClient;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwResult {
    Ok = 0,
    InvalidArgument = 1,
    TransportError = 2,
    FrameError = 3,
    Timeout = 4,
    ProtocolError = 5,
    RemoteFailure = 6,
    InvalidConfig = 7,
    Internal = 99,
}

#[allow(dead_code)]
pub const CW_OK: CwResult = CwResult::Ok;
#[allow(dead_code)]
pub const CW_ERR_INVALID_ARGUMENT: CwResult = CwResult::InvalidArgument;
#[allow(dead_code)]
pub const CW_ERR_TRANSPORT: CwResult = CwResult::TransportError;
#[allow(dead_code)]
pub const CW_ERR_FRAME: CwResult = CwResult::FrameError;
#[allow(dead_code)]
pub const CW_ERR_TIMEOUT: CwResult = CwResult::Timeout;
#[allow(dead_code)]
pub const CW_ERR_PROTOCOL: CwResult = CwResult::ProtocolError;
#[allow(dead_code)]
pub const CW_ERR_REMOTE_FAILURE: CwResult = CwResult::RemoteFailure;
#[allow(dead_code)]
pub const CW_ERR_INVALID_CONFIG: CwResult = CwResult::InvalidConfig;
#[allow(dead_code)]
pub const CW_ERR_INTERNAL: CwResult = CwResult::Internal;

pub type CwClientHandle = *mut c_void;

pub(crate) struct ClientHandle {
    pub(crate) client: DynClient,
}
