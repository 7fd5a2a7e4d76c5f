//! Logging FFI functions
//!
//! Level of the bridge's own diagnostics. The engine's log callback level is
//! a bridge operation (`litebridge_set_engine_log_level`).

use std::os::raw::c_char;

use crate::error::{c_str_to_string, clear_last_error, set_last_error, string_to_c_str, LiteBridgeErrorCode};

/// Set the global log level
///
/// # Parameters
/// - `level`: Log level string (one of: "ERROR", "WARN", "INFO", "DEBUG", "TRACE")
///
/// # Returns
/// - `LiteBridgeErrorCode::Success` (0) on success
/// - Error code on failure
///
/// # Example
/// ```c
/// litebridge_set_log_level("DEBUG");
/// ```
#[no_mangle]
pub extern "C" fn litebridge_set_log_level(level: *const c_char) -> i32 {
    clear_last_error();

    let level_str = match c_str_to_string(level) {
        Some(s) => s,
        None => {
            set_last_error("Level is null or invalid UTF-8");
            return LiteBridgeErrorCode::NullPointer as i32;
        }
    };

    let log_level = match litebridge_core::LogLevel::from_str(&level_str) {
        Some(l) => l,
        None => {
            set_last_error(&format!(
                "Invalid log level '{}'. Must be one of: ERROR, WARN, INFO, DEBUG, TRACE",
                level_str
            ));
            return LiteBridgeErrorCode::InvalidConfig as i32;
        }
    };

    litebridge_core::set_log_level(log_level);
    LiteBridgeErrorCode::Success as i32
}

/// Get the current global log level
///
/// # Returns
/// - Log level string (caller must free with `litebridge_free_string()`)
#[no_mangle]
pub extern "C" fn litebridge_get_log_level() -> *mut c_char {
    clear_last_error();

    let level = litebridge_core::get_log_level();
    string_to_c_str(level.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::litebridge_has_error;
    use std::ffi::CString;

    #[test]
    fn test_rejects_unknown_level() {
        let level = CString::new("LOUD").unwrap();
        assert_eq!(
            litebridge_set_log_level(level.as_ptr()),
            LiteBridgeErrorCode::InvalidConfig as i32
        );
        assert_eq!(litebridge_has_error(), 1);
        assert_eq!(
            litebridge_set_log_level(std::ptr::null()),
            LiteBridgeErrorCode::NullPointer as i32
        );
    }
}
