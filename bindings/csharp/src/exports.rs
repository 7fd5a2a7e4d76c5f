//! Managed-to-native operations
//!
//! Every function takes and returns managed references as `u64` (`0` is
//! null) and native handles as `i64`. Failures are raised as managed
//! exceptions on the calling thread and the function returns 0, null or
//! false. Callers must be on an attached thread.

use litebridge_core::engine::RawSlice;
use litebridge_core::runtime::{raw_ref, LocalRef};

use crate::global::downward;

#[inline]
fn arg(raw: u64) -> Option<LocalRef> {
    LocalRef::from_raw(raw)
}

#[inline]
fn out(r: Option<LocalRef>) -> u64 {
    raw_ref(r)
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Release a handle of kind `kind` (`ObjectKind` discriminant)
#[no_mangle]
pub extern "C" fn litebridge_release(kind: i32, handle: i64) {
    downward("release", (), |b| b.release(kind, handle))
}

/// Copy a slice result's bytes into a new managed byte array
#[no_mangle]
pub extern "C" fn litebridge_slice_result_bytes(buf: i64, size: i64) -> u64 {
    downward("slice_result_bytes", 0, |b| out(b.slice_result_bytes(buf, size)))
}

#[no_mangle]
pub extern "C" fn litebridge_slice_result_release(buf: i64, size: i64) {
    downward("slice_result_release", (), |b| b.slice_result_release(buf, size))
}

// ============================================================================
// COLLECTIONS, DOCUMENTS, VALUES
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_collection_get(db: i64, scope: u64, name: u64) -> i64 {
    downward("collection_get", 0, |b| b.collection_get(db, arg(scope), arg(name)))
}

#[no_mangle]
pub extern "C" fn litebridge_collection_create(db: i64, scope: u64, name: u64) -> i64 {
    downward("collection_create", 0, |b| b.collection_create(db, arg(scope), arg(name)))
}

#[no_mangle]
pub extern "C" fn litebridge_document_get(collection: i64, doc_id: u64, must_exist: bool) -> i64 {
    downward("document_get", 0, |b| b.document_get(collection, arg(doc_id), must_exist))
}

#[no_mangle]
pub extern "C" fn litebridge_document_properties(document: i64) -> i64 {
    downward("document_properties", 0, |b| b.document_properties(document))
}

#[no_mangle]
pub extern "C" fn litebridge_dict_get_array(dict: i64, key: u64) -> i64 {
    downward("dict_get_array", 0, |b| b.dict_get_array(dict, arg(key)))
}

#[no_mangle]
pub extern "C" fn litebridge_array_iterator_new(array: i64) -> i64 {
    downward("array_iterator_new", 0, |b| b.array_iterator_new(array))
}

#[no_mangle]
pub extern "C" fn litebridge_dict_iterator_new(dict: i64) -> i64 {
    downward("dict_iterator_new", 0, |b| b.dict_iterator_new(dict))
}

#[no_mangle]
pub extern "C" fn litebridge_dict_iterator_next(iterator: i64) -> bool {
    downward("dict_iterator_next", false, |b| b.dict_iterator_next(iterator))
}

#[no_mangle]
pub extern "C" fn litebridge_dict_iterator_key(iterator: i64) -> u64 {
    downward("dict_iterator_key", 0, |b| out(b.dict_iterator_key(iterator)))
}

#[no_mangle]
pub extern "C" fn litebridge_database_observer_new(db: i64, context: i64) -> i64 {
    downward("database_observer_new", 0, |b| b.database_observer_new(db, context))
}

#[no_mangle]
pub extern "C" fn litebridge_collection_observer_new(collection: i64, context: i64) -> i64 {
    downward("collection_observer_new", 0, |b| b.collection_observer_new(collection, context))
}

#[no_mangle]
pub extern "C" fn litebridge_document_observer_new(collection: i64, doc_id: u64, context: i64) -> i64 {
    downward("document_observer_new", 0, |b| {
        b.document_observer_new(collection, arg(doc_id), context)
    })
}

// ============================================================================
// QUERIES
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_query_new(db: i64, language: i32, expression: u64) -> i64 {
    downward("query_new", 0, |b| b.query_new(db, language, arg(expression)))
}

#[no_mangle]
pub extern "C" fn litebridge_query_run(query: i64, params: u64) -> i64 {
    downward("query_run", 0, |b| b.query_run(query, arg(params)))
}

#[no_mangle]
pub extern "C" fn litebridge_query_explain(query: i64) -> u64 {
    downward("query_explain", 0, |b| out(b.query_explain(query)))
}

#[no_mangle]
pub extern "C" fn litebridge_query_observer_new(query: i64, context: i64) -> i64 {
    downward("query_observer_new", 0, |b| b.query_observer_new(query, context))
}

#[no_mangle]
pub extern "C" fn litebridge_query_observer_enable(observer: i64, enabled: bool) {
    downward("query_observer_enable", (), |b| b.query_observer_enable(observer, enabled))
}

#[no_mangle]
pub extern "C" fn litebridge_query_observer_get_enumerator(observer: i64, forget: bool) -> i64 {
    downward("query_observer_get_enumerator", 0, |b| {
        b.query_observer_get_enumerator(observer, forget)
    })
}

// ============================================================================
// BLOBS
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_blob_store_get(db: i64) -> i64 {
    downward("blob_store_get", 0, |b| b.blob_store_get(db))
}

#[no_mangle]
pub extern "C" fn litebridge_blob_key_from_string(text: u64) -> i64 {
    downward("blob_key_from_string", 0, |b| b.blob_key_from_string(arg(text)))
}

#[no_mangle]
pub extern "C" fn litebridge_blob_key_to_string(key: i64) -> u64 {
    downward("blob_key_to_string", 0, |b| out(b.blob_key_to_string(key)))
}

#[no_mangle]
pub extern "C" fn litebridge_read_stream_open(store: i64, key: i64) -> i64 {
    downward("read_stream_open", 0, |b| b.read_stream_open(store, key))
}

/// Up to `max` bytes as a new byte array; empty at end of stream
#[no_mangle]
pub extern "C" fn litebridge_read_stream_read(stream: i64, max: i32) -> u64 {
    downward("read_stream_read", 0, |b| out(b.read_stream_read(stream, max)))
}

#[no_mangle]
pub extern "C" fn litebridge_write_stream_open(store: i64) -> i64 {
    downward("write_stream_open", 0, |b| b.write_stream_open(store))
}

#[no_mangle]
pub extern "C" fn litebridge_write_stream_write(stream: i64, data: u64) {
    downward("write_stream_write", (), |b| b.write_stream_write(stream, arg(data)))
}

// ============================================================================
// REPLICATION
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_replicator_new(db: i64, options: u64, context: i64) -> i64 {
    downward("replicator_new", 0, |b| b.replicator_new(db, arg(options), context))
}

#[no_mangle]
pub extern "C" fn litebridge_replicator_start(replicator: i64, reset: bool) {
    downward("replicator_start", (), |b| b.replicator_start(replicator, reset))
}

#[no_mangle]
pub extern "C" fn litebridge_replicator_stop(replicator: i64) {
    downward("replicator_stop", (), |b| b.replicator_stop(replicator))
}

#[no_mangle]
pub extern "C" fn litebridge_replicator_status(replicator: i64) -> u64 {
    downward("replicator_status", 0, |b| out(b.replicator_status(replicator)))
}

// ============================================================================
// SOCKETS
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_register_socket_factory(context: i64) {
    downward("register_socket_factory", (), |b| b.register_socket_factory(context))
}

#[no_mangle]
pub extern "C" fn litebridge_socket_from_native(
    context: i64,
    scheme: u64,
    host: u64,
    port: i32,
    path: u64,
    framing: i32,
) -> i64 {
    downward("socket_from_native", 0, |b| {
        b.socket_from_native(context, arg(scheme), arg(host), port, arg(path), framing)
    })
}

#[no_mangle]
pub extern "C" fn litebridge_socket_opened(socket: i64) {
    downward("socket_opened", (), |b| b.socket_opened(socket))
}

#[no_mangle]
pub extern "C" fn litebridge_socket_received(socket: i64, data: u64) {
    downward("socket_received", (), |b| b.socket_received(socket, arg(data)))
}

#[no_mangle]
pub extern "C" fn litebridge_socket_completed_write(socket: i64, byte_count: i64) {
    downward("socket_completed_write", (), |b| b.socket_completed_write(socket, byte_count))
}

#[no_mangle]
pub extern "C" fn litebridge_socket_close_requested(socket: i64, status: i32, message: u64) {
    downward("socket_close_requested", (), |b| {
        b.socket_close_requested(socket, status, arg(message))
    })
}

#[no_mangle]
pub extern "C" fn litebridge_socket_closed(socket: i64, domain: i32, code: i32, info: i32) {
    downward("socket_closed", (), |b| b.socket_closed(socket, domain, code, info))
}

// ============================================================================
// LISTENER AND INDEXES
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_listener_start(db: i64, config: u64, context: i64) -> i64 {
    downward("listener_start", 0, |b| b.listener_start(db, arg(config), context))
}

#[no_mangle]
pub extern "C" fn litebridge_listener_port(listener: i64) -> i32 {
    downward("listener_port", 0, |b| b.listener_port(listener))
}

#[no_mangle]
pub extern "C" fn litebridge_index_get(collection: i64, name: u64) -> i64 {
    downward("index_get", 0, |b| b.index_get(collection, arg(name)))
}

#[no_mangle]
pub extern "C" fn litebridge_index_begin_update(index: i64, limit: i64) -> i64 {
    downward("index_begin_update", 0, |b| b.index_begin_update(index, limit))
}

#[no_mangle]
pub extern "C" fn litebridge_index_updater_count(updater: i64) -> i64 {
    downward("index_updater_count", 0, |b| b.index_updater_count(updater))
}

// ============================================================================
// KEYS, ENCODING, PREDICTION, ENGINE LOGGING
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_key_pair_generate(algorithm: i32, key_bits: i32, persistent: bool, label: u64) -> i64 {
    downward("key_pair_generate", 0, |b| {
        b.key_pair_generate(algorithm, key_bits, persistent, arg(label))
    })
}

#[no_mangle]
pub extern "C" fn litebridge_key_pair_public_key_data(key_pair: i64) -> u64 {
    downward("key_pair_public_key_data", 0, |b| out(b.key_pair_public_key_data(key_pair)))
}

#[no_mangle]
pub extern "C" fn litebridge_encoder_new() -> i64 {
    downward("encoder_new", 0, |b| b.encoder_new())
}

#[no_mangle]
pub extern "C" fn litebridge_encoder_write_string(encoder: i64, value: u64) -> bool {
    downward("encoder_write_string", false, |b| b.encoder_write_string(encoder, arg(value)))
}

/// Encoded bytes as a slice result; pass `buf`/`size` to
/// `litebridge_slice_result_bytes` and `litebridge_slice_result_release`
#[no_mangle]
pub extern "C" fn litebridge_encoder_finish(encoder: i64) -> RawSlice {
    downward("encoder_finish", RawSlice::NULL, |b| b.encoder_finish(encoder))
}

#[no_mangle]
pub extern "C" fn litebridge_register_predictive_model(name: u64, context: i64) -> bool {
    downward("register_predictive_model", false, |b| {
        b.register_predictive_model(arg(name), context)
    })
}

#[no_mangle]
pub extern "C" fn litebridge_unregister_predictive_model(name: u64) {
    downward("unregister_predictive_model", (), |b| b.unregister_predictive_model(arg(name)))
}

/// Route engine log messages at or above `level` to the managed log sink
#[no_mangle]
pub extern "C" fn litebridge_set_engine_log_level(level: i32, enabled: bool) {
    downward("set_engine_log_level", (), |b| b.set_engine_log_level(level, enabled))
}
