//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! `FfiExecutor` is opaque to C: it owns the worker pool and the executor
//! bound to it, so one pointer carries the whole lifecycle. `FfiOutcome` is
//! plain data with owned C strings; conversions from core results live here
//! to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use restbridge_core::{
    Config, ContextError, ExecutionContext, FailureKind, HttpResponse, RequestError,
    RequestExecutor,
};

/// Opaque handle to a worker pool plus the executor that uses it. C callers
/// receive a pointer to this and pass it back into every FFI function.
pub struct FfiExecutor {
    pub(crate) context: ExecutionContext,
    pub(crate) executor: RequestExecutor,
}

impl FfiExecutor {
    pub(crate) fn start(config: Config) -> Result<Self, ContextError> {
        let context = ExecutionContext::new(&config.pool)?;
        let executor = RequestExecutor::new(&context, config.executor);
        Ok(Self { context, executor })
    }
}

/// Why a request did not succeed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiFailureKind {
    None = 0,
    Timeout = 1,
    Transport = 2,
    ClientStatus = 3,
    ServerStatus = 4,
    InvalidInput = 5,
    Shutdown = 6,
    Panic = 7,
    NullArg = 8,
}

impl From<FailureKind> for FfiFailureKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Timeout => FfiFailureKind::Timeout,
            FailureKind::Transport => FfiFailureKind::Transport,
            FailureKind::ClientStatus => FfiFailureKind::ClientStatus,
            FailureKind::ServerStatus => FfiFailureKind::ServerStatus,
            FailureKind::InvalidInput => FfiFailureKind::InvalidInput,
            FailureKind::Shutdown => FfiFailureKind::Shutdown,
        }
    }
}

/// Result of `restbridge_execute_detailed`.
///
/// `success` is exactly the boolean `restbridge_execute` would return.
/// `http_status` is 0 when no response arrived. `body` holds the raw
/// response body whenever one arrived, success or not; `error_message` is
/// set only on failure. Either string may be null. Free with
/// `restbridge_free_outcome`.
#[repr(C)]
pub struct FfiOutcome {
    pub success: bool,
    pub failure: FfiFailureKind,
    pub http_status: u16,
    pub body: *mut c_char,
    pub error_message: *mut c_char,
}

impl FfiOutcome {
    pub(crate) fn from_result(result: Result<HttpResponse, RequestError>) -> *mut Self {
        let outcome = match result {
            Ok(response) => FfiOutcome {
                success: true,
                failure: FfiFailureKind::None,
                http_status: response.status,
                body: into_c_string(response.body),
                error_message: std::ptr::null_mut(),
            },
            Err(err) => {
                let message = into_c_string(err.to_string());
                let failure = err.kind().into();
                match err {
                    RequestError::Status { status, body, .. } => FfiOutcome {
                        success: false,
                        failure,
                        http_status: status,
                        body: into_c_string(body),
                        error_message: message,
                    },
                    _ => FfiOutcome {
                        success: false,
                        failure,
                        http_status: 0,
                        body: std::ptr::null_mut(),
                        error_message: message,
                    },
                }
            }
        };
        Box::into_raw(Box::new(outcome))
    }

    pub(crate) fn failed(failure: FfiFailureKind, message: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiOutcome {
            success: false,
            failure,
            http_status: 0,
            body: std::ptr::null_mut(),
            error_message: into_c_string(message.to_string()),
        }))
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failed(FfiFailureKind::NullArg, &format!("null argument: {name}"))
    }
}

/// Hand a string to C. Interior NULs cannot cross the boundary and are dropped.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let bytes: Vec<u8> = s.into_bytes().into_iter().filter(|b| *b != 0).collect();
    CString::new(bytes)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}
