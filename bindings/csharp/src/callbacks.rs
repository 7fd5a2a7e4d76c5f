//! Engine callback trampolines
//!
//! The engine binding registers these functions with the engine. Each one
//! rebuilds the event from its C arguments and hands it to the bridge
//! dispatcher. Borrowed spans (`RawSlice`) are only read during the call;
//! a null `buf` means an absent value. Nothing here ever unwinds into the
//! engine, and a call that arrives before `litebridge_init` is dropped with
//! a diagnostic.

use litebridge_core::engine::RawSlice;
use litebridge_core::{CallbackContext, DocumentEnded, FilterRequest, NativeError, NativeHandle, ReplicatorStatus, SocketOpen};

use crate::global::upward;

/// Per-document replication outcome in C layout
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CDocumentEnded {
    pub scope: RawSlice,
    pub collection: RawSlice,
    pub doc_id: RawSlice,
    pub rev_id: RawSlice,
    pub flags: i32,
    pub error: NativeError,
    pub error_is_transient: bool,
}

/// Filter request in C layout
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CFilterRequest {
    pub context: i64,
    pub pushing: bool,
    pub scope: RawSlice,
    pub collection: RawSlice,
    pub doc_id: RawSlice,
    pub rev_id: RawSlice,
    pub flags: i32,
    pub body: u64,
}

/// Socket open request in C layout
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CSocketOpen {
    pub context: i64,
    pub socket: u64,
    pub scheme: RawSlice,
    pub host: RawSlice,
    pub port: u16,
    pub path: RawSlice,
    pub options: RawSlice,
}

// spans are readable for the duration of the callback
fn bytes<'a>(span: RawSlice) -> &'a [u8] {
    unsafe { span.as_bytes() }
}

fn optional<'a>(span: RawSlice) -> Option<&'a [u8]> {
    if span.is_null() {
        None
    } else {
        Some(bytes(span))
    }
}

fn ctx(context: i64) -> CallbackContext {
    CallbackContext(context)
}

// ============================================================================
// LOGGING AND OBSERVERS
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_on_log(domain: RawSlice, level: i32, message: RawSlice) {
    upward("log", (), |b| b.on_log(bytes(domain), level, bytes(message)))
}

#[no_mangle]
pub extern "C" fn litebridge_on_database_changed(context: i64) {
    upward("databaseChanged", (), |b| b.on_database_changed(ctx(context)))
}

#[no_mangle]
pub extern "C" fn litebridge_on_collection_changed(context: i64) {
    upward("collectionChanged", (), |b| b.on_collection_changed(ctx(context)))
}

#[no_mangle]
pub extern "C" fn litebridge_on_document_changed(context: i64, doc_id: RawSlice, sequence: u64) {
    upward("documentChanged", (), |b| {
        b.on_document_changed(ctx(context), bytes(doc_id), sequence)
    })
}

#[no_mangle]
pub extern "C" fn litebridge_on_query_changed(context: i64) {
    upward("queryChanged", (), |b| b.on_query_changed(ctx(context)))
}

// ============================================================================
// REPLICATION
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_on_replicator_status(context: i64, status: *const ReplicatorStatus) {
    if status.is_null() {
        return;
    }
    let status = unsafe { *status };
    upward("statusChanged", (), |b| b.on_replicator_status(ctx(context), &status))
}

/// `docs` is an array of `count` pointers; null entries are delivered as
/// null elements
#[no_mangle]
pub extern "C" fn litebridge_on_documents_ended(
    context: i64,
    pushing: bool,
    docs: *const *const CDocumentEnded,
    count: usize,
) {
    upward("documentsEnded", (), |b| {
        let pointers: &[*const CDocumentEnded] = if docs.is_null() || count == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(docs, count) }
        };
        let batch: Vec<Option<DocumentEnded<'_>>> = pointers
            .iter()
            .map(|p| {
                unsafe { p.as_ref() }.map(|d| DocumentEnded {
                    scope: bytes(d.scope),
                    collection: bytes(d.collection),
                    doc_id: bytes(d.doc_id),
                    rev_id: bytes(d.rev_id),
                    flags: d.flags,
                    error: d.error,
                    error_is_transient: d.error_is_transient,
                })
            })
            .collect();
        b.on_documents_ended(ctx(context), pushing, &batch)
    })
}

/// Returns false (reject) when the filter cannot run
#[no_mangle]
pub extern "C" fn litebridge_on_replication_filter(request: *const CFilterRequest) -> bool {
    let request = match unsafe { request.as_ref() } {
        Some(r) => *r,
        None => return false,
    };
    upward("filter", false, |b| {
        b.on_replication_filter(&FilterRequest {
            context: ctx(request.context),
            pushing: request.pushing,
            scope: bytes(request.scope),
            collection: bytes(request.collection),
            doc_id: bytes(request.doc_id),
            rev_id: bytes(request.rev_id),
            flags: request.flags,
            body: NativeHandle(request.body),
        })
    })
}

// ============================================================================
// SOCKETS
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_on_socket_open(event: *const CSocketOpen) {
    let event = match unsafe { event.as_ref() } {
        Some(e) => *e,
        None => return,
    };
    upward("socketOpen", (), |b| {
        b.on_socket_open(&SocketOpen {
            context: ctx(event.context),
            socket: NativeHandle(event.socket),
            scheme: bytes(event.scheme),
            host: bytes(event.host),
            port: event.port,
            path: bytes(event.path),
            options: bytes(event.options),
        })
    })
}

/// Takes ownership of `data`; the bridge frees it exactly once
#[no_mangle]
pub extern "C" fn litebridge_on_socket_write(context: i64, socket: u64, data: RawSlice) {
    upward("socketWrite", (), |b| {
        b.on_socket_write(ctx(context), NativeHandle(socket), data)
    })
}

#[no_mangle]
pub extern "C" fn litebridge_on_socket_completed_receive(context: i64, socket: u64, byte_count: u64) {
    upward("socketCompletedReceive", (), |b| {
        b.on_socket_completed_receive(ctx(context), NativeHandle(socket), byte_count)
    })
}

#[no_mangle]
pub extern "C" fn litebridge_on_socket_request_close(context: i64, socket: u64, status: i32, message: RawSlice) {
    upward("socketRequestClose", (), |b| {
        b.on_socket_request_close(ctx(context), NativeHandle(socket), status, bytes(message))
    })
}

#[no_mangle]
pub extern "C" fn litebridge_on_socket_close(context: i64, socket: u64) {
    upward("socketClose", (), |b| b.on_socket_close(ctx(context), NativeHandle(socket)))
}

#[no_mangle]
pub extern "C" fn litebridge_on_socket_dispose(context: i64, socket: u64) {
    upward("socketDispose", (), |b| b.on_socket_dispose(ctx(context), NativeHandle(socket)))
}

// ============================================================================
// LISTENER, PREDICTION, PEERS
// ============================================================================

#[no_mangle]
pub extern "C" fn litebridge_on_http_auth(context: i64, auth_header: RawSlice) -> bool {
    upward("authenticateHttp", false, |b| b.on_http_auth(ctx(context), optional(auth_header)))
}

/// `chain` is `count` certificate spans, leaf first; a null span stays null
#[no_mangle]
pub extern "C" fn litebridge_on_cert_auth(context: i64, chain: *const RawSlice, count: usize) -> bool {
    upward("authenticateCertificate", false, |b| {
        let spans: &[RawSlice] = if chain.is_null() || count == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(chain, count) }
        };
        let certs: Vec<Option<&[u8]>> = spans.iter().map(|s| optional(*s)).collect();
        b.on_cert_auth(ctx(context), &certs)
    })
}

/// Returns an engine-allocated result the engine takes ownership of, or null
#[no_mangle]
pub extern "C" fn litebridge_on_predict(context: i64, input: u64, db: u64) -> RawSlice {
    upward("predict", RawSlice::NULL, |b| {
        b.on_predict(ctx(context), NativeHandle(input), NativeHandle(db))
    })
}

#[no_mangle]
pub extern "C" fn litebridge_on_peer_discovered(context: i64, peer_id: RawSlice, online: bool) {
    upward("peerDiscovered", (), |b| {
        b.on_peer_discovered(ctx(context), bytes(peer_id), online)
    })
}

#[no_mangle]
pub extern "C" fn litebridge_on_peer_authenticate(context: i64, peer_id: RawSlice, certificate: RawSlice) -> bool {
    upward("authenticatePeer", false, |b| {
        b.on_peer_authenticate(ctx(context), bytes(peer_id), bytes(certificate))
    })
}
