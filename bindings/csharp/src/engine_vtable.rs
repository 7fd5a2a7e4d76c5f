//! Native engine supplied as a table of C function pointers
//!
//! Creation requests are flattened into one [`CCreateRequest`] layout; the
//! `tag` says which fields are meaningful:
//!
//! | tag                 | parent     | other | text                 | bytes   | number    | extra    | flag       |
//! |---------------------|------------|-------|----------------------|---------|-----------|----------|------------|
//! | Collection(Create)  | db         |       | scope, name          |         |           |          |            |
//! | Document            | collection |       | doc_id               |         |           |          | must_exist |
//! | DocumentProperties  | document   |       |                      |         |           |          |            |
//! | ArrayInDict         | dict       |       | key                  |         |           |          |            |
//! | Query               | db         |       | expression           |         | language  |          |            |
//! | QueryEnumerator     | query      |       |                      | params  |           |          |            |
//! | QueryObserver       | query      |       |                      |         |           |          |            |
//! | ObserverEnumerator  | observer   |       |                      |         |           |          | forget     |
//! | BlobStore           | db         |       |                      |         |           |          |            |
//! | BlobKey             |            |       | text                 |         |           |          |            |
//! | ReadStream          | store      | key   |                      |         |           |          |            |
//! | WriteStream         | store      |       |                      |         |           |          |            |
//! | Replicator          | db         |       |                      | options |           |          |            |
//! | Socket              |            |       | scheme, host, path   |         | port      | framing  |            |
//! | Listener            | db         |       |                      | config  |           |          |            |
//! | Index               | collection |       | name                 |         |           |          |            |
//! | IndexUpdater        | index      |       |                      |         | limit     |          |            |
//! | KeyPair             |            |       | label                |         | algorithm | key_bits | persistent |
//! | ArrayIterator       | array      |       |                      |         |           |          |            |
//! | DictIterator        | dict       |       |                      |         |           |          |            |
//! | *Observer           | db/coll    |       | doc_id (documents)   |         |           |          |            |
//!
//! `context` carries the callback context wherever the request has one.

use litebridge_core::engine::{CreateRequest, QueryLanguage, RawOutcome, RawSlice};
use litebridge_core::error::litecore_code;
use litebridge_core::{BridgeError, CallbackContext, Engine, NativeError, NativeHandle, ObjectKind, ReplicatorStatus, Result};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTag {
    Collection = 0,
    CreateCollection = 1,
    Document = 2,
    DocumentProperties = 3,
    ArrayInDict = 4,
    Query = 5,
    QueryEnumerator = 6,
    QueryObserver = 7,
    ObserverEnumerator = 8,
    BlobStore = 9,
    BlobKey = 10,
    ReadStream = 11,
    WriteStream = 12,
    Replicator = 13,
    Socket = 14,
    Listener = 15,
    Index = 16,
    IndexUpdater = 17,
    KeyPair = 18,
    Encoder = 19,
    ArrayIterator = 20,
    DictIterator = 21,
    DatabaseObserver = 22,
    CollectionObserver = 23,
    DocumentObserver = 24,
}

impl RequestTag {
    const ALL: [RequestTag; 25] = [
        RequestTag::Collection,
        RequestTag::CreateCollection,
        RequestTag::Document,
        RequestTag::DocumentProperties,
        RequestTag::ArrayInDict,
        RequestTag::Query,
        RequestTag::QueryEnumerator,
        RequestTag::QueryObserver,
        RequestTag::ObserverEnumerator,
        RequestTag::BlobStore,
        RequestTag::BlobKey,
        RequestTag::ReadStream,
        RequestTag::WriteStream,
        RequestTag::Replicator,
        RequestTag::Socket,
        RequestTag::Listener,
        RequestTag::Index,
        RequestTag::IndexUpdater,
        RequestTag::KeyPair,
        RequestTag::Encoder,
        RequestTag::ArrayIterator,
        RequestTag::DictIterator,
        RequestTag::DatabaseObserver,
        RequestTag::CollectionObserver,
        RequestTag::DocumentObserver,
    ];

    pub fn from_raw(raw: i32) -> Option<RequestTag> {
        RequestTag::ALL.iter().copied().find(|t| *t as i32 == raw)
    }
}

/// A creation request in C layout. Spans borrow from the caller for the
/// duration of the `create` call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CCreateRequest {
    pub tag: i32,
    pub parent: u64,
    pub other: u64,
    pub context: i64,
    pub text: [RawSlice; 3],
    pub bytes: RawSlice,
    pub number: i64,
    pub extra: i64,
    pub flag: bool,
}

/// Result of `create`: a handle, or 0 plus an error triple
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct COutcome {
    pub handle: u64,
    pub error: NativeError,
}

fn span(bytes: &[u8]) -> RawSlice {
    RawSlice {
        buf: bytes.as_ptr(),
        size: bytes.len(),
    }
}

impl CCreateRequest {
    fn empty(tag: RequestTag) -> Self {
        CCreateRequest {
            tag: tag as i32,
            parent: 0,
            other: 0,
            context: 0,
            text: [RawSlice::NULL; 3],
            bytes: RawSlice::NULL,
            number: 0,
            extra: 0,
            flag: false,
        }
    }

    fn with_parent(tag: RequestTag, parent: NativeHandle) -> Self {
        CCreateRequest {
            parent: parent.0,
            ..Self::empty(tag)
        }
    }

    fn texts(mut self, texts: &[&str]) -> Self {
        for (slot, text) in self.text.iter_mut().zip(texts) {
            *slot = span(text.as_bytes());
        }
        self
    }

    fn context(mut self, context: CallbackContext) -> Self {
        self.context = context.0;
        self
    }

    /// Flatten a request for the engine
    pub fn lower(request: &CreateRequest<'_>) -> Self {
        use RequestTag as T;
        match *request {
            CreateRequest::Collection { db, scope, name } => Self::with_parent(T::Collection, db).texts(&[scope, name]),
            CreateRequest::CreateCollection { db, scope, name } => {
                Self::with_parent(T::CreateCollection, db).texts(&[scope, name])
            }
            CreateRequest::Document {
                collection,
                doc_id,
                must_exist,
            } => CCreateRequest {
                flag: must_exist,
                ..Self::with_parent(T::Document, collection).texts(&[doc_id])
            },
            CreateRequest::DocumentProperties { document } => Self::with_parent(T::DocumentProperties, document),
            CreateRequest::ArrayInDict { dict, key } => Self::with_parent(T::ArrayInDict, dict).texts(&[key]),
            CreateRequest::Query {
                db,
                language,
                expression,
            } => CCreateRequest {
                number: language as i64,
                ..Self::with_parent(T::Query, db).texts(&[expression])
            },
            CreateRequest::QueryEnumerator { query, params } => CCreateRequest {
                bytes: span(params),
                ..Self::with_parent(T::QueryEnumerator, query)
            },
            CreateRequest::QueryObserver { query, context } => {
                Self::with_parent(T::QueryObserver, query).context(context)
            }
            CreateRequest::ObserverEnumerator { observer, forget } => CCreateRequest {
                flag: forget,
                ..Self::with_parent(T::ObserverEnumerator, observer)
            },
            CreateRequest::BlobStore { db } => Self::with_parent(T::BlobStore, db),
            CreateRequest::BlobKey { text } => Self::empty(T::BlobKey).texts(&[text]),
            CreateRequest::ReadStream { store, key } => CCreateRequest {
                other: key.0,
                ..Self::with_parent(T::ReadStream, store)
            },
            CreateRequest::WriteStream { store } => Self::with_parent(T::WriteStream, store),
            CreateRequest::Replicator { db, options, context } => CCreateRequest {
                bytes: span(options),
                ..Self::with_parent(T::Replicator, db).context(context)
            },
            CreateRequest::Socket {
                context,
                scheme,
                host,
                port,
                path,
                framing,
            } => CCreateRequest {
                number: port as i64,
                extra: framing as i64,
                ..Self::empty(T::Socket).texts(&[scheme, host, path]).context(context)
            },
            CreateRequest::Listener { db, config, context } => CCreateRequest {
                bytes: span(config),
                ..Self::with_parent(T::Listener, db).context(context)
            },
            CreateRequest::Index { collection, name } => Self::with_parent(T::Index, collection).texts(&[name]),
            CreateRequest::IndexUpdater { index, limit } => CCreateRequest {
                number: limit as i64,
                ..Self::with_parent(T::IndexUpdater, index)
            },
            CreateRequest::KeyPair {
                algorithm,
                key_bits,
                persistent,
                label,
            } => CCreateRequest {
                number: algorithm as i64,
                extra: key_bits as i64,
                flag: persistent,
                ..Self::empty(T::KeyPair).texts(&[label])
            },
            CreateRequest::Encoder => Self::empty(T::Encoder),
            CreateRequest::ArrayIterator { array } => Self::with_parent(T::ArrayIterator, array),
            CreateRequest::DictIterator { dict } => Self::with_parent(T::DictIterator, dict),
            CreateRequest::DatabaseObserver { db, context } => {
                Self::with_parent(T::DatabaseObserver, db).context(context)
            }
            CreateRequest::CollectionObserver { collection, context } => {
                Self::with_parent(T::CollectionObserver, collection).context(context)
            }
            CreateRequest::DocumentObserver {
                collection,
                doc_id,
                context,
            } => Self::with_parent(T::DocumentObserver, collection)
                .texts(&[doc_id])
                .context(context),
        }
    }

    /// Rebuild the request on the engine side. `None` for an unknown tag,
    /// non-UTF-8 text or an out-of-range number.
    ///
    /// # Safety
    /// Every span the tag uses must point to readable memory for `'a`.
    pub unsafe fn lift<'a>(&self) -> Option<CreateRequest<'a>> {
        use RequestTag as T;
        let text = |i: usize| -> Option<&'a str> { std::str::from_utf8(self.text[i].as_bytes()).ok() };
        let parent = NativeHandle(self.parent);
        let context = CallbackContext(self.context);
        let request = match RequestTag::from_raw(self.tag)? {
            T::Collection => CreateRequest::Collection {
                db: parent,
                scope: text(0)?,
                name: text(1)?,
            },
            T::CreateCollection => CreateRequest::CreateCollection {
                db: parent,
                scope: text(0)?,
                name: text(1)?,
            },
            T::Document => CreateRequest::Document {
                collection: parent,
                doc_id: text(0)?,
                must_exist: self.flag,
            },
            T::DocumentProperties => CreateRequest::DocumentProperties { document: parent },
            T::ArrayInDict => CreateRequest::ArrayInDict {
                dict: parent,
                key: text(0)?,
            },
            T::Query => CreateRequest::Query {
                db: parent,
                language: QueryLanguage::from_raw(i32::try_from(self.number).ok()?)?,
                expression: text(0)?,
            },
            T::QueryEnumerator => CreateRequest::QueryEnumerator {
                query: parent,
                params: self.bytes.as_bytes(),
            },
            T::QueryObserver => CreateRequest::QueryObserver { query: parent, context },
            T::ObserverEnumerator => CreateRequest::ObserverEnumerator {
                observer: parent,
                forget: self.flag,
            },
            T::BlobStore => CreateRequest::BlobStore { db: parent },
            T::BlobKey => CreateRequest::BlobKey { text: text(0)? },
            T::ReadStream => CreateRequest::ReadStream {
                store: parent,
                key: NativeHandle(self.other),
            },
            T::WriteStream => CreateRequest::WriteStream { store: parent },
            T::Replicator => CreateRequest::Replicator {
                db: parent,
                options: self.bytes.as_bytes(),
                context,
            },
            T::Socket => CreateRequest::Socket {
                context,
                scheme: text(0)?,
                host: text(1)?,
                port: u16::try_from(self.number).ok()?,
                path: text(2)?,
                framing: i32::try_from(self.extra).ok()?,
            },
            T::Listener => CreateRequest::Listener {
                db: parent,
                config: self.bytes.as_bytes(),
                context,
            },
            T::Index => CreateRequest::Index {
                collection: parent,
                name: text(0)?,
            },
            T::IndexUpdater => CreateRequest::IndexUpdater {
                index: parent,
                limit: u64::try_from(self.number).ok()?,
            },
            T::KeyPair => CreateRequest::KeyPair {
                algorithm: i32::try_from(self.number).ok()?,
                key_bits: u32::try_from(self.extra).ok()?,
                persistent: self.flag,
                label: text(0)?,
            },
            T::Encoder => CreateRequest::Encoder,
            T::ArrayIterator => CreateRequest::ArrayIterator { array: parent },
            T::DictIterator => CreateRequest::DictIterator { dict: parent },
            T::DatabaseObserver => CreateRequest::DatabaseObserver { db: parent, context },
            T::CollectionObserver => CreateRequest::CollectionObserver {
                collection: parent,
                context,
            },
            T::DocumentObserver => CreateRequest::DocumentObserver {
                collection: parent,
                doc_id: text(0)?,
                context,
            },
        };
        Some(request)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineVTable {
    pub create: Option<extern "C" fn(request: *const CCreateRequest) -> COutcome>,
    pub retain: Option<extern "C" fn(kind: i32, handle: u64)>,
    pub release: Option<extern "C" fn(kind: i32, handle: u64)>,
    pub close: Option<extern "C" fn(kind: i32, handle: u64)>,
    pub free: Option<extern "C" fn(kind: i32, handle: u64)>,
    pub alloc_slice: Option<extern "C" fn(buf: *const u8, size: usize) -> RawSlice>,
    pub free_slice: Option<extern "C" fn(slice: RawSlice)>,
    pub error_message: Option<extern "C" fn(error: NativeError) -> RawSlice>,
    pub set_log_callback: Option<extern "C" fn(level: i32, enabled: bool)>,
    pub query_explain: Option<extern "C" fn(query: u64) -> RawSlice>,
    pub query_observer_enable: Option<extern "C" fn(observer: u64, enabled: bool)>,
    pub blob_key_to_string: Option<extern "C" fn(key: u64) -> RawSlice>,
    pub read_stream_read: Option<extern "C" fn(stream: u64, buf: *mut u8, cap: usize, out_error: *mut NativeError) -> usize>,
    pub write_stream_write: Option<extern "C" fn(stream: u64, buf: *const u8, len: usize, out_error: *mut NativeError)>,
    pub replicator_start: Option<extern "C" fn(replicator: u64, reset: bool)>,
    pub replicator_stop: Option<extern "C" fn(replicator: u64)>,
    pub replicator_status: Option<extern "C" fn(replicator: u64) -> ReplicatorStatus>,
    pub register_socket_factory: Option<extern "C" fn(context: i64)>,
    pub socket_opened: Option<extern "C" fn(socket: u64)>,
    pub socket_received: Option<extern "C" fn(socket: u64, buf: *const u8, len: usize)>,
    pub socket_completed_write: Option<extern "C" fn(socket: u64, byte_count: u64)>,
    pub socket_close_requested: Option<extern "C" fn(socket: u64, status: i32, message: *const u8, message_len: usize)>,
    pub socket_closed: Option<extern "C" fn(socket: u64, error: NativeError)>,
    pub listener_port: Option<extern "C" fn(listener: u64) -> u16>,
    pub index_updater_count: Option<extern "C" fn(updater: u64) -> u64>,
    pub key_pair_public_key_data: Option<extern "C" fn(key_pair: u64, out_error: *mut NativeError) -> RawSlice>,
    pub encoder_write_string: Option<extern "C" fn(encoder: u64, value: *const u8, len: usize) -> bool>,
    pub encoder_finish: Option<extern "C" fn(encoder: u64, out_error: *mut NativeError) -> RawSlice>,
    pub dict_iterator_next: Option<extern "C" fn(iterator: u64) -> bool>,
    pub dict_iterator_key: Option<extern "C" fn(iterator: u64) -> RawSlice>,
    pub register_predictive_model: Option<extern "C" fn(name: *const u8, name_len: usize, context: i64) -> bool>,
    pub unregister_predictive_model: Option<extern "C" fn(name: *const u8, name_len: usize)>,
}

macro_rules! missing_entries {
    ($table:expr; $($field:ident),* $(,)?) => {{
        let mut missing = Vec::new();
        $(if $table.$field.is_none() { missing.push(stringify!($field)); })*
        missing
    }};
}

impl EngineVTable {
    fn missing(&self) -> Vec<&'static str> {
        missing_entries!(self;
            create, retain, release, close, free, alloc_slice, free_slice, error_message,
            set_log_callback, query_explain, query_observer_enable, blob_key_to_string,
            read_stream_read, write_stream_write, replicator_start, replicator_stop,
            replicator_status, register_socket_factory, socket_opened, socket_received,
            socket_completed_write, socket_close_requested, socket_closed, listener_port,
            index_updater_count, key_pair_public_key_data, encoder_write_string, encoder_finish,
            dict_iterator_next, dict_iterator_key, register_predictive_model,
            unregister_predictive_model,
        )
    }
}

macro_rules! engine {
    ($self:ident.$entry:ident($($arg:expr),*) else $fallback:expr) => {
        match $self.table.$entry {
            Some(f) => f($($arg),*),
            None => $fallback,
        }
    };
}

const UNAVAILABLE: NativeError = NativeError::litecore(litecore_code::UNEXPECTED_ERROR);

/// [`Engine`] over an engine-supplied vtable
pub struct HostEngine {
    table: EngineVTable,
}

impl HostEngine {
    pub fn new(table: EngineVTable) -> Result<Self> {
        let missing = table.missing();
        if !missing.is_empty() {
            return Err(BridgeError::Config(format!(
                "engine vtable is missing: {}",
                missing.join(", ")
            )));
        }
        Ok(Self { table })
    }
}

/// Turn an out-parameter error into a `Result`
fn checked<T>(value: T, error: NativeError) -> std::result::Result<T, NativeError> {
    if error.is_error() {
        Err(error)
    } else {
        Ok(value)
    }
}

impl Engine for HostEngine {
    fn create(&self, request: &CreateRequest<'_>) -> RawOutcome {
        let lowered = CCreateRequest::lower(request);
        let outcome = engine!(self.create(&lowered) else COutcome {
            handle: 0,
            error: UNAVAILABLE,
        });
        RawOutcome {
            handle: NativeHandle(outcome.handle),
            error: outcome.error,
        }
    }

    fn retain(&self, kind: ObjectKind, handle: NativeHandle) {
        engine!(self.retain(kind as i32, handle.0) else ())
    }

    fn release(&self, kind: ObjectKind, handle: NativeHandle) {
        engine!(self.release(kind as i32, handle.0) else ())
    }

    fn close(&self, kind: ObjectKind, handle: NativeHandle) {
        engine!(self.close(kind as i32, handle.0) else ())
    }

    fn free(&self, kind: ObjectKind, handle: NativeHandle) {
        engine!(self.free(kind as i32, handle.0) else ())
    }

    fn alloc_slice(&self, bytes: &[u8]) -> RawSlice {
        engine!(self.alloc_slice(bytes.as_ptr(), bytes.len()) else RawSlice::NULL)
    }

    fn free_slice(&self, slice: RawSlice) {
        engine!(self.free_slice(slice) else ())
    }

    fn error_message(&self, error: NativeError) -> RawSlice {
        engine!(self.error_message(error) else RawSlice::NULL)
    }

    fn set_log_callback(&self, level: i32, enabled: bool) {
        engine!(self.set_log_callback(level, enabled) else ())
    }

    fn query_explain(&self, query: NativeHandle) -> RawSlice {
        engine!(self.query_explain(query.0) else RawSlice::NULL)
    }

    fn query_observer_enable(&self, observer: NativeHandle, enabled: bool) {
        engine!(self.query_observer_enable(observer.0, enabled) else ())
    }

    fn blob_key_to_string(&self, key: NativeHandle) -> RawSlice {
        engine!(self.blob_key_to_string(key.0) else RawSlice::NULL)
    }

    fn read_stream_read(&self, stream: NativeHandle, buf: &mut [u8]) -> std::result::Result<usize, NativeError> {
        let mut error = NativeError::NONE;
        let n = engine!(self.read_stream_read(stream.0, buf.as_mut_ptr(), buf.len(), &mut error) else {
            error = UNAVAILABLE;
            0
        });
        // never trust a count past the buffer
        checked(n.min(buf.len()), error)
    }

    fn write_stream_write(&self, stream: NativeHandle, bytes: &[u8]) -> std::result::Result<(), NativeError> {
        let mut error = NativeError::NONE;
        engine!(self.write_stream_write(stream.0, bytes.as_ptr(), bytes.len(), &mut error) else {
            error = UNAVAILABLE;
        });
        checked((), error)
    }

    fn replicator_start(&self, replicator: NativeHandle, reset: bool) {
        engine!(self.replicator_start(replicator.0, reset) else ())
    }

    fn replicator_stop(&self, replicator: NativeHandle) {
        engine!(self.replicator_stop(replicator.0) else ())
    }

    fn replicator_status(&self, replicator: NativeHandle) -> ReplicatorStatus {
        engine!(self.replicator_status(replicator.0) else ReplicatorStatus::stopped())
    }

    fn register_socket_factory(&self, context: CallbackContext) {
        engine!(self.register_socket_factory(context.0) else ())
    }

    fn socket_opened(&self, socket: NativeHandle) {
        engine!(self.socket_opened(socket.0) else ())
    }

    fn socket_received(&self, socket: NativeHandle, bytes: &[u8]) {
        engine!(self.socket_received(socket.0, bytes.as_ptr(), bytes.len()) else ())
    }

    fn socket_completed_write(&self, socket: NativeHandle, byte_count: u64) {
        engine!(self.socket_completed_write(socket.0, byte_count) else ())
    }

    fn socket_close_requested(&self, socket: NativeHandle, status: i32, message: &str) {
        engine!(self.socket_close_requested(socket.0, status, message.as_ptr(), message.len()) else ())
    }

    fn socket_closed(&self, socket: NativeHandle, error: NativeError) {
        engine!(self.socket_closed(socket.0, error) else ())
    }

    fn listener_port(&self, listener: NativeHandle) -> u16 {
        engine!(self.listener_port(listener.0) else 0)
    }

    fn index_updater_count(&self, updater: NativeHandle) -> u64 {
        engine!(self.index_updater_count(updater.0) else 0)
    }

    fn key_pair_public_key_data(&self, key_pair: NativeHandle) -> std::result::Result<RawSlice, NativeError> {
        let mut error = NativeError::NONE;
        let data = engine!(self.key_pair_public_key_data(key_pair.0, &mut error) else {
            error = UNAVAILABLE;
            RawSlice::NULL
        });
        checked(data, error)
    }

    fn encoder_write_string(&self, encoder: NativeHandle, value: &str) -> bool {
        engine!(self.encoder_write_string(encoder.0, value.as_ptr(), value.len()) else false)
    }

    fn encoder_finish(&self, encoder: NativeHandle) -> std::result::Result<RawSlice, NativeError> {
        let mut error = NativeError::NONE;
        let data = engine!(self.encoder_finish(encoder.0, &mut error) else {
            error = UNAVAILABLE;
            RawSlice::NULL
        });
        checked(data, error)
    }

    fn dict_iterator_next(&self, iterator: NativeHandle) -> bool {
        engine!(self.dict_iterator_next(iterator.0) else false)
    }

    fn dict_iterator_key(&self, iterator: NativeHandle) -> RawSlice {
        engine!(self.dict_iterator_key(iterator.0) else RawSlice::NULL)
    }

    fn register_predictive_model(&self, name: &str, context: CallbackContext) -> bool {
        engine!(self.register_predictive_model(name.as_ptr(), name.len(), context.0) else false)
    }

    fn unregister_predictive_model(&self, name: &str) {
        engine!(self.unregister_predictive_model(name.as_ptr(), name.len()) else ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_cover_every_request() {
        for (i, tag) in RequestTag::ALL.iter().enumerate() {
            assert_eq!(*tag as i32, i as i32);
            assert_eq!(RequestTag::from_raw(i as i32), Some(*tag));
        }
        assert_eq!(RequestTag::from_raw(25), None);
    }

    #[test]
    fn test_lower_then_lift_preserves_fields() {
        let requests = [
            CreateRequest::Collection {
                db: NativeHandle(0xdb),
                scope: "_default",
                name: "users",
            },
            CreateRequest::Socket {
                context: CallbackContext(5),
                scheme: "wss",
                host: "peer.local",
                port: 4984,
                path: "/db",
                framing: 2,
            },
            CreateRequest::KeyPair {
                algorithm: 0,
                key_bits: 2048,
                persistent: true,
                label: "node",
            },
            CreateRequest::ReadStream {
                store: NativeHandle(0x10),
                key: NativeHandle(0x20),
            },
            CreateRequest::QueryEnumerator {
                query: NativeHandle(0x30),
                params: b"{\"a\":1}",
            },
        ];
        for request in requests {
            let lowered = CCreateRequest::lower(&request);
            let lifted = unsafe { lowered.lift() }.expect("lift");
            assert_eq!(format!("{:?}", lifted), format!("{:?}", request));
        }
    }

    #[test]
    fn test_lift_rejects_out_of_range_values() {
        let mut lowered = CCreateRequest::lower(&CreateRequest::Socket {
            context: CallbackContext(1),
            scheme: "ws",
            host: "h",
            port: 1,
            path: "/",
            framing: 0,
        });
        lowered.number = 70_000;
        assert!(unsafe { lowered.lift() }.is_none());

        let mut lowered = CCreateRequest::lower(&CreateRequest::Encoder);
        lowered.tag = 99;
        assert!(unsafe { lowered.lift() }.is_none());
    }

    #[test]
    fn test_partial_engine_table_is_rejected() {
        let err = HostEngine::new(EngineVTable::default()).err().unwrap();
        assert!(err.to_string().contains("create"));
    }
}
