// common/mod.rs
// C function tables forwarding to the in-process fakes, standing in for the
// .NET host and the native engine

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use litebridge_core::engine::RawSlice;
use litebridge_core::error::litecore_code;
use litebridge_core::runtime::{ArgKind, ClassId, LocalRef, ManagedRuntime, MethodId, MethodSig, PinnedRegion, UnpinMode};
use litebridge_core::testing::{FakeEngine, FakeRuntime};
use litebridge_core::{CallbackContext, Engine, NativeError, NativeHandle, ObjectKind, ReplicatorStatus};
use litebridge_csharp::{CCreateRequest, COutcome, CPinned, CValue, EngineVTable, HostRuntimeVTable};

static RUNTIME: OnceLock<FakeRuntime> = OnceLock::new();
static ENGINE: OnceLock<Arc<FakeEngine>> = OnceLock::new();

pub fn rt() -> &'static FakeRuntime {
    RUNTIME.get_or_init(FakeRuntime::new)
}

pub fn engine() -> &'static Arc<FakeEngine> {
    ENGINE.get_or_init(|| Arc::new(FakeEngine::new()))
}

fn bytes<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }
}

fn text<'a>(ptr: *const u8, len: usize) -> &'a str {
    std::str::from_utf8(bytes(ptr, len)).expect("tables pass UTF-8 names")
}

fn arg_kind(raw: u8) -> ArgKind {
    match raw {
        1 => ArgKind::Bool,
        2 => ArgKind::Int,
        3 => ArgKind::Long,
        4 => ArgKind::Object,
        _ => ArgKind::Void,
    }
}

// ========== RUNTIME TABLE ==========

extern "C" fn rt_is_attached() -> bool {
    rt().attachment() == litebridge_core::runtime::Attachment::Attached
}

extern "C" fn rt_attach(name: *const u8, len: usize) -> bool {
    rt().attach_current_thread(text(name, len))
}

extern "C" fn rt_detach() {
    rt().detach_current_thread()
}

extern "C" fn rt_exception_pending() -> bool {
    rt().exception_pending()
}

extern "C" fn rt_describe() {
    rt().describe_and_clear_exception()
}

extern "C" fn rt_resolve_class(name: *const u8, len: usize) -> u64 {
    rt().resolve_class(text(name, len)).map(|c| c.0).unwrap_or(0)
}

extern "C" fn rt_resolve_method(
    class: u64,
    name: *const u8,
    len: usize,
    params: *const u8,
    count: usize,
    ret: u8,
    is_static: bool,
) -> u64 {
    let params: Vec<ArgKind> = bytes(params, count).iter().map(|k| arg_kind(*k)).collect();
    let sig = MethodSig::new(Box::leak(params.into_boxed_slice()), arg_kind(ret));
    rt().resolve_method(ClassId(class), text(name, len), &sig, is_static)
        .map(|m| m.0)
        .unwrap_or(0)
}

fn values(args: *const CValue, count: usize) -> Vec<litebridge_core::Value> {
    if args.is_null() || count == 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(args, count) }
        .iter()
        .map(|v| v.to_value())
        .collect()
}

extern "C" fn rt_call_static(class: u64, method: u64, args: *const CValue, count: usize) -> CValue {
    CValue::from(rt().call_static(ClassId(class), MethodId(method), &values(args, count)))
}

extern "C" fn rt_new_object(class: u64, ctor: u64, args: *const CValue, count: usize) -> u64 {
    litebridge_core::runtime::raw_ref(rt().new_object(ClassId(class), MethodId(ctor), &values(args, count)))
}

extern "C" fn rt_throw(exception: u64) -> bool {
    LocalRef::from_raw(exception).map(|e| rt().throw(e)).unwrap_or(false)
}

extern "C" fn rt_new_string(units: *const u16, len: usize) -> u64 {
    let units = if len == 0 { &[][..] } else { unsafe { std::slice::from_raw_parts(units, len) } };
    litebridge_core::runtime::raw_ref(rt().new_string_utf16(units))
}

extern "C" fn rt_string_length(string: u64) -> i64 {
    LocalRef::from_raw(string)
        .and_then(|s| rt().string_utf16(s))
        .map(|u| u.len() as i64)
        .unwrap_or(-1)
}

extern "C" fn rt_string_region(string: u64, out: *mut u16, len: usize) -> bool {
    match LocalRef::from_raw(string).and_then(|s| rt().string_utf16(s)) {
        Some(units) if units.len() == len => {
            if len > 0 {
                unsafe { std::ptr::copy_nonoverlapping(units.as_ptr(), out, len) };
            }
            true
        }
        _ => false,
    }
}

extern "C" fn rt_new_byte_array(ptr: *const u8, len: usize) -> u64 {
    litebridge_core::runtime::raw_ref(rt().new_byte_array(bytes(ptr, len)))
}

extern "C" fn rt_byte_array_length(array: u64) -> i64 {
    LocalRef::from_raw(array)
        .and_then(|a| rt().byte_array_len(a))
        .map(|n| n as i64)
        .unwrap_or(-1)
}

extern "C" fn rt_pin(array: u64, critical: bool) -> CPinned {
    match LocalRef::from_raw(array).and_then(|a| rt().pin_byte_array(a, critical)) {
        Some(region) => CPinned {
            ptr: region.ptr,
            len: region.len,
        },
        None => CPinned {
            ptr: std::ptr::null_mut(),
            len: 0,
        },
    }
}

extern "C" fn rt_unpin(array: u64, ptr: *mut u8, len: usize, critical: bool, mode: u8) {
    if let Some(array) = LocalRef::from_raw(array) {
        let mode = if mode == UnpinMode::Commit as u8 { UnpinMode::Commit } else { UnpinMode::Abort };
        rt().unpin_byte_array(array, PinnedRegion { ptr, len }, critical, mode);
    }
}

extern "C" fn rt_new_object_array(class: u64, len: usize) -> u64 {
    litebridge_core::runtime::raw_ref(rt().new_object_array(ClassId(class), len))
}

extern "C" fn rt_set_element(array: u64, index: usize, value: u64) -> bool {
    LocalRef::from_raw(array)
        .map(|a| rt().set_array_element(a, index, LocalRef::from_raw(value)))
        .unwrap_or(false)
}

extern "C" fn rt_delete_local_ref(r: u64) {
    if let Some(r) = LocalRef::from_raw(r) {
        rt().delete_local_ref(r);
    }
}

pub fn runtime_table() -> HostRuntimeVTable {
    HostRuntimeVTable {
        is_attached: Some(rt_is_attached),
        attach_current_thread: Some(rt_attach),
        detach_current_thread: Some(rt_detach),
        exception_pending: Some(rt_exception_pending),
        describe_and_clear_exception: Some(rt_describe),
        resolve_class: Some(rt_resolve_class),
        resolve_method: Some(rt_resolve_method),
        call_static: Some(rt_call_static),
        new_object: Some(rt_new_object),
        throw: Some(rt_throw),
        new_string_utf16: Some(rt_new_string),
        string_length: Some(rt_string_length),
        string_region: Some(rt_string_region),
        new_byte_array: Some(rt_new_byte_array),
        byte_array_length: Some(rt_byte_array_length),
        pin_byte_array: Some(rt_pin),
        unpin_byte_array: Some(rt_unpin),
        new_object_array: Some(rt_new_object_array),
        set_array_element: Some(rt_set_element),
        delete_local_ref: Some(rt_delete_local_ref),
    }
}

// ========== ENGINE TABLE ==========

fn kind(raw: i32) -> ObjectKind {
    ObjectKind::from_raw(raw).expect("engine called with a known kind")
}

fn with_error<T>(out: *mut NativeError, result: Result<T, NativeError>, fallback: T) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            unsafe { *out = e };
            fallback
        }
    }
}

extern "C" fn en_create(request: *const CCreateRequest) -> COutcome {
    let lifted = unsafe { request.as_ref().and_then(|r| r.lift()) };
    match lifted {
        Some(request) => {
            let outcome = engine().create(&request);
            COutcome {
                handle: outcome.handle.0,
                error: outcome.error,
            }
        }
        None => COutcome {
            handle: 0,
            error: NativeError::litecore(litecore_code::INVALID_PARAMETER),
        },
    }
}

extern "C" fn en_retain(k: i32, h: u64) {
    engine().retain(kind(k), NativeHandle(h))
}

extern "C" fn en_release(k: i32, h: u64) {
    engine().release(kind(k), NativeHandle(h))
}

extern "C" fn en_close(k: i32, h: u64) {
    engine().close(kind(k), NativeHandle(h))
}

extern "C" fn en_free(k: i32, h: u64) {
    engine().free(kind(k), NativeHandle(h))
}

extern "C" fn en_alloc_slice(buf: *const u8, size: usize) -> RawSlice {
    engine().alloc_slice(bytes(buf, size))
}

extern "C" fn en_free_slice(slice: RawSlice) {
    engine().free_slice(slice)
}

extern "C" fn en_error_message(error: NativeError) -> RawSlice {
    engine().error_message(error)
}

extern "C" fn en_set_log_callback(level: i32, enabled: bool) {
    engine().set_log_callback(level, enabled)
}

extern "C" fn en_query_explain(h: u64) -> RawSlice {
    engine().query_explain(NativeHandle(h))
}

extern "C" fn en_query_observer_enable(h: u64, enabled: bool) {
    engine().query_observer_enable(NativeHandle(h), enabled)
}

extern "C" fn en_blob_key_to_string(h: u64) -> RawSlice {
    engine().blob_key_to_string(NativeHandle(h))
}

extern "C" fn en_read(h: u64, buf: *mut u8, cap: usize, out: *mut NativeError) -> usize {
    let buf = if cap == 0 { &mut [][..] } else { unsafe { std::slice::from_raw_parts_mut(buf, cap) } };
    with_error(out, engine().read_stream_read(NativeHandle(h), buf), 0)
}

extern "C" fn en_write(h: u64, buf: *const u8, len: usize, out: *mut NativeError) {
    with_error(out, engine().write_stream_write(NativeHandle(h), bytes(buf, len)), ())
}

extern "C" fn en_replicator_start(h: u64, reset: bool) {
    engine().replicator_start(NativeHandle(h), reset)
}

extern "C" fn en_replicator_stop(h: u64) {
    engine().replicator_stop(NativeHandle(h))
}

extern "C" fn en_replicator_status(h: u64) -> ReplicatorStatus {
    engine().replicator_status(NativeHandle(h))
}

extern "C" fn en_register_socket_factory(context: i64) {
    engine().register_socket_factory(CallbackContext(context))
}

extern "C" fn en_socket_opened(h: u64) {
    engine().socket_opened(NativeHandle(h))
}

extern "C" fn en_socket_received(h: u64, buf: *const u8, len: usize) {
    engine().socket_received(NativeHandle(h), bytes(buf, len))
}

extern "C" fn en_socket_completed_write(h: u64, n: u64) {
    engine().socket_completed_write(NativeHandle(h), n)
}

extern "C" fn en_socket_close_requested(h: u64, status: i32, msg: *const u8, len: usize) {
    engine().socket_close_requested(NativeHandle(h), status, text(msg, len))
}

extern "C" fn en_socket_closed(h: u64, error: NativeError) {
    engine().socket_closed(NativeHandle(h), error)
}

extern "C" fn en_listener_port(h: u64) -> u16 {
    engine().listener_port(NativeHandle(h))
}

extern "C" fn en_index_updater_count(h: u64) -> u64 {
    engine().index_updater_count(NativeHandle(h))
}

extern "C" fn en_public_key(h: u64, out: *mut NativeError) -> RawSlice {
    with_error(out, engine().key_pair_public_key_data(NativeHandle(h)), RawSlice::NULL)
}

extern "C" fn en_encoder_write(h: u64, value: *const u8, len: usize) -> bool {
    engine().encoder_write_string(NativeHandle(h), text(value, len))
}

extern "C" fn en_encoder_finish(h: u64, out: *mut NativeError) -> RawSlice {
    with_error(out, engine().encoder_finish(NativeHandle(h)), RawSlice::NULL)
}

extern "C" fn en_dict_next(h: u64) -> bool {
    engine().dict_iterator_next(NativeHandle(h))
}

extern "C" fn en_dict_key(h: u64) -> RawSlice {
    engine().dict_iterator_key(NativeHandle(h))
}

extern "C" fn en_register_model(name: *const u8, len: usize, context: i64) -> bool {
    engine().register_predictive_model(text(name, len), CallbackContext(context))
}

extern "C" fn en_unregister_model(name: *const u8, len: usize) {
    engine().unregister_predictive_model(text(name, len))
}

pub fn engine_table() -> EngineVTable {
    EngineVTable {
        create: Some(en_create),
        retain: Some(en_retain),
        release: Some(en_release),
        close: Some(en_close),
        free: Some(en_free),
        alloc_slice: Some(en_alloc_slice),
        free_slice: Some(en_free_slice),
        error_message: Some(en_error_message),
        set_log_callback: Some(en_set_log_callback),
        query_explain: Some(en_query_explain),
        query_observer_enable: Some(en_query_observer_enable),
        blob_key_to_string: Some(en_blob_key_to_string),
        read_stream_read: Some(en_read),
        write_stream_write: Some(en_write),
        replicator_start: Some(en_replicator_start),
        replicator_stop: Some(en_replicator_stop),
        replicator_status: Some(en_replicator_status),
        register_socket_factory: Some(en_register_socket_factory),
        socket_opened: Some(en_socket_opened),
        socket_received: Some(en_socket_received),
        socket_completed_write: Some(en_socket_completed_write),
        socket_close_requested: Some(en_socket_close_requested),
        socket_closed: Some(en_socket_closed),
        listener_port: Some(en_listener_port),
        index_updater_count: Some(en_index_updater_count),
        key_pair_public_key_data: Some(en_public_key),
        encoder_write_string: Some(en_encoder_write),
        encoder_finish: Some(en_encoder_finish),
        dict_iterator_next: Some(en_dict_next),
        dict_iterator_key: Some(en_dict_key),
        register_predictive_model: Some(en_register_model),
        unregister_predictive_model: Some(en_unregister_model),
    }
}

// ========== HELPERS ==========

/// Managed string on the calling (attached) thread, as a raw reference
pub fn managed_str(value: &str) -> u64 {
    litebridge_core::runtime::raw_ref(litebridge_core::marshal::str_to_managed(rt(), value).expect("string"))
}

pub fn span(bytes: &[u8]) -> RawSlice {
    RawSlice {
        buf: bytes.as_ptr(),
        size: bytes.len(),
    }
}
