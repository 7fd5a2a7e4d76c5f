//! The native engine, as seen from the bridge
//!
//! The engine is an external collaborator. `Engine` captures what the bridge
//! consumes from it: creation calls returning a raw handle plus an error
//! triple, the per-kind lifecycle calls, slice allocation, and the per-kind
//! operations the managed side drives. Event callbacks are registered as part
//! of the creation requests that carry a `CallbackContext`; the concrete
//! engine binding supplies the function pointers.

use std::slice;

use crate::error::NativeError;
use crate::events::{CallbackContext, ReplicatorStatus};
use crate::handle::{NativeHandle, ObjectKind};

/// A (pointer, length) byte span owned by the engine
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSlice {
    pub buf: *const u8,
    pub size: usize,
}

impl RawSlice {
    pub const NULL: RawSlice = RawSlice {
        buf: std::ptr::null(),
        size: 0,
    };

    pub fn is_null(&self) -> bool {
        self.buf.is_null()
    }

    /// View the bytes.
    ///
    /// # Safety
    /// `buf` must point to `size` readable bytes for the whole of `'a`.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.buf.is_null() || self.size == 0 {
            &[]
        } else {
            slice::from_raw_parts(self.buf, self.size)
        }
    }
}

impl Default for RawSlice {
    fn default() -> Self {
        RawSlice::NULL
    }
}

// SAFETY: a RawSlice is a plain address/length pair; dereferencing is
// `unsafe` and governed by the engine's ownership rules.
unsafe impl Send for RawSlice {}
unsafe impl Sync for RawSlice {}

/// Result of a creation call: a handle, or null plus an error triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOutcome {
    pub handle: NativeHandle,
    pub error: NativeError,
}

impl RawOutcome {
    pub fn ok(handle: NativeHandle) -> Self {
        Self {
            handle,
            error: NativeError::NONE,
        }
    }

    pub fn err(error: NativeError) -> Self {
        Self {
            handle: NativeHandle::NULL,
            error,
        }
    }

    /// Null with no error
    pub fn absent() -> Self {
        Self::err(NativeError::NONE)
    }
}

/// Query languages understood by the engine
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLanguage {
    Json = 0,
    N1ql = 1,
}

impl QueryLanguage {
    pub fn from_raw(raw: i32) -> Option<QueryLanguage> {
        match raw {
            0 => Some(QueryLanguage::Json),
            1 => Some(QueryLanguage::N1ql),
            _ => None,
        }
    }
}

/// When a null creation result is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentPolicy {
    /// Null is always a failure
    Never,
    /// Null with no error means "nothing there"
    NullWithoutError,
    /// Null with no error, or a LiteCore NotFound, means "nothing there"
    Lookup,
}

impl AbsentPolicy {
    pub fn allows_null(&self) -> bool {
        !matches!(self, AbsentPolicy::Never)
    }

    pub fn allows_not_found(&self) -> bool {
        matches!(self, AbsentPolicy::Lookup)
    }
}

/// Every way the bridge asks the engine for a new object
#[derive(Debug, Clone, Copy)]
pub enum CreateRequest<'a> {
    Collection { db: NativeHandle, scope: &'a str, name: &'a str },
    CreateCollection { db: NativeHandle, scope: &'a str, name: &'a str },
    Document { collection: NativeHandle, doc_id: &'a str, must_exist: bool },
    DocumentProperties { document: NativeHandle },
    ArrayInDict { dict: NativeHandle, key: &'a str },
    Query { db: NativeHandle, language: QueryLanguage, expression: &'a str },
    QueryEnumerator { query: NativeHandle, params: &'a [u8] },
    QueryObserver { query: NativeHandle, context: CallbackContext },
    ObserverEnumerator { observer: NativeHandle, forget: bool },
    BlobStore { db: NativeHandle },
    BlobKey { text: &'a str },
    ReadStream { store: NativeHandle, key: NativeHandle },
    WriteStream { store: NativeHandle },
    Replicator { db: NativeHandle, options: &'a [u8], context: CallbackContext },
    Socket { context: CallbackContext, scheme: &'a str, host: &'a str, port: u16, path: &'a str, framing: i32 },
    Listener { db: NativeHandle, config: &'a [u8], context: CallbackContext },
    Index { collection: NativeHandle, name: &'a str },
    IndexUpdater { index: NativeHandle, limit: u64 },
    KeyPair { algorithm: i32, key_bits: u32, persistent: bool, label: &'a str },
    Encoder,
    ArrayIterator { array: NativeHandle },
    DictIterator { dict: NativeHandle },
    DatabaseObserver { db: NativeHandle, context: CallbackContext },
    CollectionObserver { collection: NativeHandle, context: CallbackContext },
    DocumentObserver { collection: NativeHandle, doc_id: &'a str, context: CallbackContext },
}

impl CreateRequest<'_> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            CreateRequest::Collection { .. } | CreateRequest::CreateCollection { .. } => ObjectKind::Collection,
            CreateRequest::Document { .. } => ObjectKind::Document,
            CreateRequest::DocumentProperties { .. } => ObjectKind::Dict,
            CreateRequest::ArrayInDict { .. } => ObjectKind::Array,
            CreateRequest::Query { .. } => ObjectKind::Query,
            CreateRequest::QueryEnumerator { .. } | CreateRequest::ObserverEnumerator { .. } => {
                ObjectKind::QueryEnumerator
            }
            CreateRequest::QueryObserver { .. } => ObjectKind::QueryObserver,
            CreateRequest::BlobStore { .. } => ObjectKind::BlobStore,
            CreateRequest::BlobKey { .. } => ObjectKind::BlobKey,
            CreateRequest::ReadStream { .. } => ObjectKind::ReadStream,
            CreateRequest::WriteStream { .. } => ObjectKind::WriteStream,
            CreateRequest::Replicator { .. } => ObjectKind::Replicator,
            CreateRequest::Socket { .. } => ObjectKind::Socket,
            CreateRequest::Listener { .. } => ObjectKind::Listener,
            CreateRequest::Index { .. } => ObjectKind::Index,
            CreateRequest::IndexUpdater { .. } => ObjectKind::IndexUpdater,
            CreateRequest::KeyPair { .. } => ObjectKind::KeyPair,
            CreateRequest::Encoder => ObjectKind::Encoder,
            CreateRequest::ArrayIterator { .. } => ObjectKind::ArrayIterator,
            CreateRequest::DictIterator { .. } => ObjectKind::DictIterator,
            CreateRequest::DatabaseObserver { .. } => ObjectKind::DatabaseObserver,
            CreateRequest::CollectionObserver { .. } => ObjectKind::CollectionObserver,
            CreateRequest::DocumentObserver { .. } => ObjectKind::DocumentObserver,
        }
    }

    pub fn absent_policy(&self) -> AbsentPolicy {
        match self {
            CreateRequest::Collection { .. } | CreateRequest::Document { .. } | CreateRequest::Index { .. } => {
                AbsentPolicy::Lookup
            }
            CreateRequest::DocumentProperties { .. }
            | CreateRequest::ArrayInDict { .. }
            | CreateRequest::ObserverEnumerator { .. }
            | CreateRequest::IndexUpdater { .. } => AbsentPolicy::NullWithoutError,
            _ => AbsentPolicy::Never,
        }
    }
}

/// Upward interface consumed from the native engine
///
/// Implementations must be callable from any thread. None of these calls
/// may be made while the caller holds an engine lock and is about to call
/// into managed code.
pub trait Engine: Send + Sync {
    fn create(&self, request: &CreateRequest<'_>) -> RawOutcome;

    fn retain(&self, kind: ObjectKind, handle: NativeHandle);
    fn release(&self, kind: ObjectKind, handle: NativeHandle);
    /// Close a stream; closing also frees it
    fn close(&self, kind: ObjectKind, handle: NativeHandle);
    fn free(&self, kind: ObjectKind, handle: NativeHandle);

    /// Allocate an engine-owned copy of `bytes`
    fn alloc_slice(&self, bytes: &[u8]) -> RawSlice;
    fn free_slice(&self, slice: RawSlice);

    /// Engine-formatted description of `error`; the caller frees it
    fn error_message(&self, error: NativeError) -> RawSlice;

    // -- logging
    fn set_log_callback(&self, level: i32, enabled: bool);

    // -- query
    fn query_explain(&self, query: NativeHandle) -> RawSlice;
    fn query_observer_enable(&self, observer: NativeHandle, enabled: bool);

    // -- blobs
    fn blob_key_to_string(&self, key: NativeHandle) -> RawSlice;
    fn read_stream_read(&self, stream: NativeHandle, buf: &mut [u8]) -> Result<usize, NativeError>;
    fn write_stream_write(&self, stream: NativeHandle, bytes: &[u8]) -> Result<(), NativeError>;

    // -- replication
    fn replicator_start(&self, replicator: NativeHandle, reset: bool);
    fn replicator_stop(&self, replicator: NativeHandle);
    fn replicator_status(&self, replicator: NativeHandle) -> ReplicatorStatus;

    // -- sockets (managed-implemented transport reporting back)
    fn register_socket_factory(&self, context: CallbackContext);
    fn socket_opened(&self, socket: NativeHandle);
    fn socket_received(&self, socket: NativeHandle, bytes: &[u8]);
    fn socket_completed_write(&self, socket: NativeHandle, byte_count: u64);
    fn socket_close_requested(&self, socket: NativeHandle, status: i32, message: &str);
    fn socket_closed(&self, socket: NativeHandle, error: NativeError);

    // -- listener / peers
    fn listener_port(&self, listener: NativeHandle) -> u16;

    // -- indexes
    fn index_updater_count(&self, updater: NativeHandle) -> u64;

    // -- keys
    fn key_pair_public_key_data(&self, key_pair: NativeHandle) -> Result<RawSlice, NativeError>;

    // -- encoding and values
    fn encoder_write_string(&self, encoder: NativeHandle, value: &str) -> bool;
    fn encoder_finish(&self, encoder: NativeHandle) -> Result<RawSlice, NativeError>;
    fn dict_iterator_next(&self, iterator: NativeHandle) -> bool;
    /// Borrowed from the iterator; valid until the next `next` or free
    fn dict_iterator_key(&self, iterator: NativeHandle) -> RawSlice;

    // -- prediction
    fn register_predictive_model(&self, name: &str, context: CallbackContext) -> bool;
    fn unregister_predictive_model(&self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_requests_tolerate_not_found() {
        let req = CreateRequest::Collection {
            db: NativeHandle(1),
            scope: "_default",
            name: "missing",
        };
        assert_eq!(req.kind(), ObjectKind::Collection);
        assert!(req.absent_policy().allows_not_found());

        let req = CreateRequest::CreateCollection {
            db: NativeHandle(1),
            scope: "_default",
            name: "new",
        };
        assert!(!req.absent_policy().allows_null());
    }

    #[test]
    fn test_index_updater_null_is_benign_but_not_found_is_not() {
        let req = CreateRequest::IndexUpdater {
            index: NativeHandle(1),
            limit: 10,
        };
        assert!(req.absent_policy().allows_null());
        assert!(!req.absent_policy().allows_not_found());
    }

    #[test]
    fn test_null_slice_views_as_empty() {
        assert!(RawSlice::NULL.is_null());
        assert!(unsafe { RawSlice::NULL.as_bytes() }.is_empty());
    }
}
