//! Memory management FFI functions
//!
//! Functions for freeing memory allocated by the FFI layer

use std::ffi::CString;
use std::os::raw::c_char;

/// Free a string allocated by the FFI layer
///
/// This must be called for any string returned by `litebridge_*` functions
/// that return `*mut c_char` (except error messages from `litebridge_get_last_error()`).
///
/// # Safety
/// - The pointer must have been allocated by a `litebridge_*` function
/// - The pointer must not be used after this call
/// - It is safe to call with a null pointer (no-op)
///
/// # Example (C#)
/// ```csharp
/// IntPtr levelPtr = NativeMethods.litebridge_get_log_level();
/// try {
///     string level = Marshal.PtrToStringUTF8(levelPtr);
/// } finally {
///     NativeMethods.litebridge_free_string(levelPtr);
/// }
/// ```
#[no_mangle]
pub extern "C" fn litebridge_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            // Reconstruct the CString to properly free it
            let _ = CString::from_raw(ptr);
        }
    }
}

/// Get the version of the LiteBridge FFI library
///
/// # Returns
/// - Version string (caller must free with `litebridge_free_string()`)
#[no_mangle]
pub extern "C" fn litebridge_version() -> *mut c_char {
    crate::error::string_to_c_str(litebridge_core::VERSION)
}
