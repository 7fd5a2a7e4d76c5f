//! Process-wide bridge instance and load-time initialization
//!
//! The bridge is created once by `litebridge_init` (called from the host's
//! load hook) and lives for the rest of the process. Every exported entry
//! point goes through [`downward`] or [`upward`], which catch panics so none
//! unwinds into the host or the engine.

use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use litebridge_core::error::litecore_code;
use litebridge_core::{logging, Bridge, BridgeConfig, BridgeError, NativeError};

use crate::engine_vtable::{EngineVTable, HostEngine};
use crate::error::{
    c_str_to_string, clear_last_error, panic_message, set_error, set_last_error, string_to_c_str, LiteBridgeErrorCode,
};
use crate::vtable::{HostRuntime, HostRuntimeVTable};

pub(crate) type HostBridge = Bridge<HostRuntime>;

static BRIDGE: OnceLock<HostBridge> = OnceLock::new();

/// Initialize the bridge
///
/// # Parameters
/// - `runtime`: Host runtime function table (copied)
/// - `engine`: Engine function table (copied)
/// - `config_json`: Optional JSON configuration (UTF-8, null for defaults)
///
/// # Returns
/// - `LiteBridgeErrorCode::Success` (0) on success
/// - Error code on failure (check `litebridge_get_last_error()` for details)
///
/// # Safety
/// - `runtime` and `engine` must point to fully populated tables
/// - Must be called from a thread the host runtime can attach
#[no_mangle]
pub extern "C" fn litebridge_init(
    runtime: *const HostRuntimeVTable,
    engine: *const EngineVTable,
    config_json: *const c_char,
) -> i32 {
    clear_last_error();

    // Validate parameters
    if runtime.is_null() || engine.is_null() {
        set_last_error("runtime or engine vtable is null");
        return LiteBridgeErrorCode::NullPointer as i32;
    }
    let (runtime, engine) = unsafe { (*runtime, *engine) };

    let result = panic::catch_unwind(AssertUnwindSafe(|| init(runtime, engine, config_json)));
    match result {
        Ok(Ok(())) => LiteBridgeErrorCode::Success as i32,
        Ok(Err(e)) => set_error(&e) as i32,
        Err(payload) => {
            set_last_error(&format!("panic during init: {}", panic_message(payload.as_ref())));
            LiteBridgeErrorCode::Panic as i32
        }
    }
}

fn init(runtime: HostRuntimeVTable, engine: EngineVTable, config_json: *const c_char) -> Result<(), BridgeError> {
    let runtime = HostRuntime::new(runtime)?;
    let engine = HostEngine::new(engine)?;
    let config = if config_json.is_null() {
        BridgeConfig::default()
    } else {
        let json = c_str_to_string(config_json)
            .ok_or_else(|| BridgeError::Config("config is not valid UTF-8".into()))?;
        BridgeConfig::from_json(&json)?
    };

    if BRIDGE.get().is_some() {
        return Err(BridgeError::AlreadyInitialized);
    }
    let bridge = Bridge::init(runtime, Arc::new(engine), config)?;
    BRIDGE.set(bridge).map_err(|_| BridgeError::AlreadyInitialized)
}

/// Check whether the bridge is initialized
///
/// Returns 1 if `litebridge_init` has succeeded, 0 otherwise.
#[no_mangle]
pub extern "C" fn litebridge_is_initialized() -> i32 {
    if BRIDGE.get().is_some() {
        1
    } else {
        0
    }
}

/// Get the effective configuration as JSON
///
/// # Returns
/// - JSON string (caller must free with `litebridge_free_string()`)
/// - Null if the bridge is not initialized
#[no_mangle]
pub extern "C" fn litebridge_get_config() -> *mut c_char {
    clear_last_error();

    let bridge = match BRIDGE.get() {
        Some(b) => b,
        None => {
            set_last_error(&BridgeError::NotInitialized.to_string());
            return std::ptr::null_mut();
        }
    };
    match serde_json::to_string(bridge.config()) {
        Ok(json) => string_to_c_str(&json),
        Err(e) => {
            set_last_error(&format!("config serialization failed: {}", e));
            std::ptr::null_mut()
        }
    }
}

/// Run a managed-to-native operation.
///
/// Before init there is nowhere to throw, so the last error is set instead.
/// A panic becomes an UnexpectedError exception on the calling thread.
pub(crate) fn downward<T>(op: &str, default: T, f: impl FnOnce(&HostBridge) -> T) -> T {
    let bridge = match BRIDGE.get() {
        Some(b) => b,
        None => {
            set_last_error(&format!("{}: {}", op, BridgeError::NotInitialized));
            return default;
        }
    };
    match panic::catch_unwind(AssertUnwindSafe(|| f(bridge))) {
        Ok(v) => v,
        Err(payload) => {
            let message = format!("{} panicked: {}", op, panic_message(payload.as_ref()));
            litebridge_core::log_error!("{}", message);
            bridge.translate(NativeError::litecore(litecore_code::UNEXPECTED_ERROR), Some(&message));
            default
        }
    }
}

/// Run an engine-to-managed callback. Failures never reach the engine.
pub(crate) fn upward<T>(callback: &str, default: T, f: impl FnOnce(&HostBridge) -> T) -> T {
    let bridge = match BRIDGE.get() {
        Some(b) => b,
        None => {
            logging::fallback("litebridge::callbacks", &format!("{} before init; dropped", callback));
            return default;
        }
    };
    match panic::catch_unwind(AssertUnwindSafe(|| f(bridge))) {
        Ok(v) => v,
        Err(payload) => {
            logging::fallback(
                "litebridge::callbacks",
                &format!("{} panicked: {}", callback, panic_message(payload.as_ref())),
            );
            default
        }
    }
}
