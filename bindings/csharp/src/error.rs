//! Error handling for FFI
//!
//! Lifecycle entry points (`litebridge_init`, log level) return error codes,
//! with detailed messages available via `litebridge_get_last_error()`.
//! Bridge operations called from managed code report failures as managed
//! exceptions instead; the last error is only set when no exception can be
//! raised (the bridge is not initialized).

use litebridge_core::BridgeError;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Error codes returned by FFI lifecycle functions
///
/// These map to LiteBridgeErrorCode enum in C#
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteBridgeErrorCode {
    /// Operation succeeded
    Success = 0,

    /// Null pointer passed to function
    NullPointer = -1,

    /// `litebridge_init` already succeeded in this process
    AlreadyInitialized = -2,

    /// No bridge yet; call `litebridge_init` first
    NotInitialized = -3,

    /// A managed class or method could not be resolved
    SymbolMissing = -4,

    /// Bad configuration JSON, log level or vtable
    InvalidConfig = -5,

    /// The loading thread could not be attached
    AttachFailed = -6,

    /// A Rust panic was caught at the boundary
    Panic = -98,

    /// Unknown/internal error
    Unknown = -99,
}

impl From<&BridgeError> for LiteBridgeErrorCode {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::SymbolMissing { .. } => LiteBridgeErrorCode::SymbolMissing,
            BridgeError::AlreadyInitialized => LiteBridgeErrorCode::AlreadyInitialized,
            BridgeError::NotInitialized => LiteBridgeErrorCode::NotInitialized,
            BridgeError::Config(_) => LiteBridgeErrorCode::InvalidConfig,
            BridgeError::AttachFailed(_) => LiteBridgeErrorCode::AttachFailed,
            _ => LiteBridgeErrorCode::Unknown,
        }
    }
}

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message (internal use)
pub(crate) fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Set error from BridgeError (internal use)
pub(crate) fn set_error(err: &BridgeError) -> LiteBridgeErrorCode {
    set_last_error(&err.to_string());
    LiteBridgeErrorCode::from(err)
}

/// Clear the last error message
pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Get the last error message
///
/// Returns a pointer to a null-terminated UTF-8 string.
/// The pointer is valid until the next FFI call on the same thread.
/// Returns null if no error has occurred.
///
/// # Safety
/// The returned pointer must not be freed by the caller.
#[no_mangle]
pub extern "C" fn litebridge_get_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clear the last error message
#[no_mangle]
pub extern "C" fn litebridge_clear_error() {
    clear_last_error();
}

/// Check if an error occurred
///
/// Returns 1 if there is an error message, 0 otherwise.
#[no_mangle]
pub extern "C" fn litebridge_has_error() -> i32 {
    LAST_ERROR.with(|e| if e.borrow().is_some() { 1 } else { 0 })
}

/// Helper to convert C string to Rust string
///
/// Returns None if the pointer is null or the string is not valid UTF-8
pub(crate) fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

/// Helper to convert Rust string to C string (caller must free with litebridge_free_string)
pub(crate) fn string_to_c_str(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
