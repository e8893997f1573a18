//! C-ABI wrapper around `restbridge-core`.
//!
//! # Overview
//! Lets any language with a C FFI issue authenticated JSON requests against
//! a Supabase-style gateway without linking to Rust's runtime directly. The
//! host creates one executor, calls `restbridge_execute` from any thread,
//! and shuts the executor down when it exits.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Null or non-UTF-8 arguments are reported as failures, never dereferenced.
//! - The C caller owns every returned pointer and releases it with the
//!   matching `restbridge_free_*` or `restbridge_executor_shutdown`.

pub mod types;

use std::ffi::CStr;
use std::str::Utf8Error;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use restbridge_core::{Config, RequestDescriptor};
use tracing::error;

use types::*;

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Borrow an optional C string. Null means absent; a non-null pointer to
/// invalid UTF-8 is an error, never silently treated as absent.
///
/// # Safety
/// Same as `c_str`.
unsafe fn optional_c_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, Utf8Error> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().map(Some)
}

// ---------------------------------------------------------------------------
// Executor lifecycle
// ---------------------------------------------------------------------------

/// Start an executor with default settings, overridden by any `RESTBRIDGE_*`
/// environment variables.
///
/// Returns null if the environment holds an invalid value or the pool cannot
/// start. Release with `restbridge_executor_shutdown`.
#[unsafe(no_mangle)]
pub extern "C" fn restbridge_executor_new() -> *mut FfiExecutor {
    catch_unwind(|| {
        let config = match Config::from_env() {
            Ok(config) => config,
            Err(err) => {
                error!("invalid executor configuration: {err}");
                return std::ptr::null_mut();
            }
        };
        start(config)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Start an executor from a JSON configuration document.
///
/// Absent keys take their defaults; durations are in milliseconds, e.g.
/// `{"executor":{"call_timeout_ms":5000},"pool":{"max_workers":8}}`.
/// Returns null if `config_json` is null or invalid.
#[unsafe(no_mangle)]
pub extern "C" fn restbridge_executor_new_with_config(config_json: *const c_char) -> *mut FfiExecutor {
    catch_unwind(|| {
        let Some(json) = (unsafe { c_str(config_json) }) else {
            return std::ptr::null_mut();
        };
        match Config::from_json(json) {
            Ok(config) => start(config),
            Err(err) => {
                error!("invalid executor configuration: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

fn start(config: Config) -> *mut FfiExecutor {
    match FfiExecutor::start(config) {
        Ok(executor) => Box::into_raw(Box::new(executor)),
        Err(err) => {
            error!("could not start executor: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Shut the executor down and free it.
///
/// Waits up to the configured grace period for in-flight requests. Calls
/// still blocked in `restbridge_execute` on other threads must have returned
/// first. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn restbridge_executor_shutdown(executor: *mut FfiExecutor) {
    if !executor.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let FfiExecutor { context, executor } = *unsafe { Box::from_raw(executor) };
            drop(executor);
            context.shutdown();
        }));
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Send one request and report whether the server answered with a 2xx status.
///
/// `json_body` may be null or empty to send no payload; a non-null body that
/// is not valid UTF-8 fails the call. Blocks for at most the configured
/// ceiling. Any failure, including null arguments, yields `false`.
#[unsafe(no_mangle)]
pub extern "C" fn restbridge_execute(
    executor: *const FfiExecutor,
    url: *const c_char,
    method: *const c_char,
    json_body: *const c_char,
    api_key: *const c_char,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if executor.is_null() {
            return false;
        }
        let executor = unsafe { &*executor };
        let (Some(url), Some(method), Some(api_key)) =
            (unsafe { c_str(url) }, unsafe { c_str(method) }, unsafe { c_str(api_key) })
        else {
            error!("restbridge_execute called with a null or non-UTF-8 argument");
            return false;
        };
        let body = match unsafe { optional_c_str(json_body) } {
            Ok(body) => body,
            Err(err) => {
                error!("restbridge_execute called with a non-UTF-8 body: {err}");
                return false;
            }
        };
        executor.executor.execute(url, method, body, api_key)
    }))
    .unwrap_or(false)
}

/// Like `restbridge_execute`, but reports status, raw body and failure kind.
///
/// Never returns null. Free the result with `restbridge_free_outcome`.
#[unsafe(no_mangle)]
pub extern "C" fn restbridge_execute_detailed(
    executor: *const FfiExecutor,
    url: *const c_char,
    method: *const c_char,
    json_body: *const c_char,
    api_key: *const c_char,
) -> *mut FfiOutcome {
    catch_unwind(AssertUnwindSafe(|| {
        if executor.is_null() {
            return FfiOutcome::null_arg("executor");
        }
        let executor = unsafe { &*executor };
        let Some(url) = (unsafe { c_str(url) }) else {
            return FfiOutcome::null_arg("url");
        };
        let Some(method) = (unsafe { c_str(method) }) else {
            return FfiOutcome::null_arg("method");
        };
        let Some(api_key) = (unsafe { c_str(api_key) }) else {
            return FfiOutcome::null_arg("api_key");
        };
        let body = match unsafe { optional_c_str(json_body) } {
            Ok(body) => body,
            Err(err) => {
                return FfiOutcome::failed(
                    FfiFailureKind::InvalidInput,
                    &format!("json_body is not valid UTF-8: {err}"),
                );
            }
        };
        let descriptor = RequestDescriptor::new(url, method, body, api_key);
        FfiOutcome::from_result(executor.executor.send(descriptor))
    }))
    .unwrap_or_else(|_| FfiOutcome::failed(FfiFailureKind::Panic, "internal panic"))
}

/// Free an outcome returned by `restbridge_execute_detailed`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn restbridge_free_outcome(outcome: *mut FfiOutcome) {
    if outcome.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let outcome = unsafe { Box::from_raw(outcome) };
        if !outcome.body.is_null() {
            drop(unsafe { std::ffi::CString::from_raw(outcome.body) });
        }
        if !outcome.error_message.is_null() {
            drop(unsafe { std::ffi::CString::from_raw(outcome.error_message) });
        }
    });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
