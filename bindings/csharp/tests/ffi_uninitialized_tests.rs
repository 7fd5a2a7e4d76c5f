// ffi_uninitialized_tests.rs
// Entry points called before, or instead of, a successful litebridge_init
//
// Runs as its own process: nothing in this file ever initializes the bridge.

mod common;

use std::ffi::{CStr, CString};

use common::{engine_table, runtime_table};
use litebridge_core::engine::RawSlice;
use litebridge_csharp::*;

fn last_error() -> String {
    let ptr = litebridge_get_last_error();
    assert!(!ptr.is_null(), "expected an error message");
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

#[test]
fn test_downward_call_before_init_sets_last_error() {
    litebridge_clear_error();
    assert_eq!(litebridge_collection_get(0xdb00, 0, 0), 0);
    assert_eq!(litebridge_has_error(), 1);
    assert!(last_error().contains("not initialized"));
    assert!(!litebridge_dict_iterator_next(1));
}

#[test]
fn test_callbacks_before_init_take_safe_defaults() {
    litebridge_on_database_changed(1);
    litebridge_on_log(RawSlice::NULL, 2, RawSlice::NULL);
    assert!(!litebridge_on_http_auth(1, RawSlice::NULL));
    assert!(litebridge_on_predict(1, 0x10, 0x20).is_null());
    assert!(!litebridge_on_replication_filter(std::ptr::null()));
}

#[test]
fn test_init_rejects_null_tables() {
    let code = litebridge_init(std::ptr::null(), std::ptr::null(), std::ptr::null());
    assert_eq!(code, LiteBridgeErrorCode::NullPointer as i32);
    assert_eq!(litebridge_is_initialized(), 0);
}

#[test]
fn test_init_rejects_partial_tables() {
    let runtime = HostRuntimeVTable {
        delete_local_ref: None,
        ..runtime_table()
    };
    let engine = engine_table();
    let code = litebridge_init(&runtime, &engine, std::ptr::null());
    assert_eq!(code, LiteBridgeErrorCode::InvalidConfig as i32);
    assert!(last_error().contains("delete_local_ref"));

    let runtime = runtime_table();
    let engine = EngineVTable {
        free_slice: None,
        ..engine_table()
    };
    let code = litebridge_init(&runtime, &engine, std::ptr::null());
    assert_eq!(code, LiteBridgeErrorCode::InvalidConfig as i32);
    assert!(last_error().contains("free_slice"));
    assert_eq!(litebridge_is_initialized(), 0);
}

#[test]
fn test_init_rejects_bad_config() {
    let (runtime, engine) = (runtime_table(), engine_table());
    for json in [r#"{"log_level": "loud"}"#, r#"{"strict_symbols": false}"#, "not json"] {
        let config = CString::new(json).unwrap();
        let code = litebridge_init(&runtime, &engine, config.as_ptr());
        assert_eq!(code, LiteBridgeErrorCode::InvalidConfig as i32, "{}", json);
    }
    assert_eq!(litebridge_is_initialized(), 0);
}
