use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::engine::{CreateRequest, Engine, RawOutcome, RawSlice};
use crate::error::{litecore_code, ErrorDomain, NativeError};
use crate::events::{ActivityLevel, CallbackContext, ReplicatorStatus};
use crate::handle::{CreationContract, NativeHandle, ObjectKind};

/// Keys every fake dict iterates over, in order
pub const DICT_KEYS: [&str; 2] = ["name", "type"];

/// Port every fake listener reports
pub const LISTENER_PORT: u16 = 4984;

#[derive(Debug)]
struct FakeObject {
    kind: ObjectKind,
    refs: i64,
    freed: bool,
    text: String,
    data: Vec<u8>,
    cursor: usize,
    count: u64,
}

impl FakeObject {
    fn new(kind: ObjectKind) -> Self {
        let refs = if kind.contract() == CreationContract::Unretained { 0 } else { 1 };
        Self {
            kind,
            refs,
            freed: false,
            text: String::new(),
            data: Vec::new(),
            cursor: 0,
            count: 0,
        }
    }

    fn alive(&self) -> bool {
        !self.freed && self.refs > 0
    }
}

/// State of a stream object, for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub data: Vec<u8>,
    pub closed: bool,
}

/// Native engine double
///
/// Creation requests always succeed except for lookups of names added with
/// [`FakeEngine::add_missing`], blob keys that do not start with `sha1-`,
/// read streams for keys with no stored blob, and requests made after
/// [`FakeEngine::fail_next`].
///
/// With [`FakeEngine::share_lookups`] on, named lookups behave like the real
/// engine's caches: a repeated lookup of a live object returns the same
/// address with one more reference.
pub struct FakeEngine {
    next_handle: AtomicU64,
    objects: Mutex<HashMap<u64, FakeObject>>,
    shared_lookups: AtomicBool,
    cached: Mutex<HashMap<(ObjectKind, String), u64>>,
    slices: Mutex<HashMap<usize, Box<[u8]>>>,
    slices_freed: AtomicUsize,
    double_frees: AtomicUsize,
    missing: Mutex<HashSet<String>>,
    fail_next: Mutex<Option<NativeError>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    log_level: Mutex<Option<(i32, bool)>>,
    socket_events: Mutex<Vec<String>>,
    models: Mutex<HashMap<String, CallbackContext>>,
    socket_factory: Mutex<Option<CallbackContext>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(0x1000),
            objects: Mutex::new(HashMap::new()),
            shared_lookups: AtomicBool::new(false),
            cached: Mutex::new(HashMap::new()),
            slices: Mutex::new(HashMap::new()),
            slices_freed: AtomicUsize::new(0),
            double_frees: AtomicUsize::new(0),
            missing: Mutex::new(HashSet::new()),
            fail_next: Mutex::new(None),
            blobs: Mutex::new(HashMap::new()),
            log_level: Mutex::new(None),
            socket_events: Mutex::new(Vec::new()),
            models: Mutex::new(HashMap::new()),
            socket_factory: Mutex::new(None),
        }
    }

    // -- configuration

    /// Lookups of `name` (collection, document id or index) report NotFound
    pub fn add_missing(&self, name: &str) {
        self.missing.lock().insert(name.to_string());
    }

    /// The next creation request fails with `error`
    pub fn fail_next(&self, error: NativeError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Repeated lookups of the same collection, document or index return
    /// the cached object, retained again
    pub fn share_lookups(&self, enabled: bool) {
        self.shared_lookups.store(enabled, Ordering::SeqCst);
    }

    pub fn put_blob(&self, key: &str, bytes: &[u8]) {
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
    }

    // -- inspection

    /// Current reference count; `None` for unknown handles
    pub fn refcount(&self, handle: NativeHandle) -> Option<i64> {
        self.objects.lock().get(&handle.0).map(|o| o.refs)
    }

    pub fn kind_of(&self, handle: NativeHandle) -> Option<ObjectKind> {
        self.objects.lock().get(&handle.0).map(|o| o.kind)
    }

    /// Whether the object's reference has been given up (released to zero,
    /// closed or freed)
    pub fn is_released(&self, handle: NativeHandle) -> bool {
        self.objects.lock().get(&handle.0).map(|o| !o.alive()).unwrap_or(false)
    }

    /// Objects still holding a reference, borrowed blob stores excluded
    pub fn live_objects(&self) -> usize {
        self.objects
            .lock()
            .values()
            .filter(|o| o.kind != ObjectKind::BlobStore && o.alive())
            .count()
    }

    /// Objects whose count went below zero or that were freed twice
    pub fn over_released(&self) -> usize {
        self.objects.lock().values().filter(|o| o.refs < 0).count() + self.double_frees.load(Ordering::SeqCst)
    }

    pub fn stream(&self, handle: NativeHandle) -> Option<StreamSnapshot> {
        self.objects.lock().get(&handle.0).map(|o| StreamSnapshot {
            data: o.data.clone(),
            closed: o.freed,
        })
    }

    pub fn slices_freed(&self) -> usize {
        self.slices_freed.load(Ordering::SeqCst)
    }

    pub fn live_slices(&self) -> usize {
        self.slices.lock().len()
    }

    pub fn log_callback(&self) -> Option<(i32, bool)> {
        *self.log_level.lock()
    }

    pub fn socket_events(&self) -> Vec<String> {
        self.socket_events.lock().clone()
    }

    pub fn socket_factory(&self) -> Option<CallbackContext> {
        *self.socket_factory.lock()
    }

    pub fn model(&self, name: &str) -> Option<CallbackContext> {
        self.models.lock().get(name).copied()
    }

    // -- internals

    fn insert(&self, object: FakeObject) -> NativeHandle {
        let id = self.next_handle.fetch_add(0x10, Ordering::SeqCst);
        self.objects.lock().insert(id, object);
        NativeHandle(id)
    }

    fn with<T>(&self, handle: NativeHandle, f: impl FnOnce(&mut FakeObject) -> T) -> Option<T> {
        self.objects.lock().get_mut(&handle.0).map(f)
    }

    fn text_of(&self, handle: NativeHandle) -> String {
        self.with(handle, |o| o.text.clone()).unwrap_or_default()
    }

    fn lookup(&self, kind: ObjectKind, name: &str) -> RawOutcome {
        if self.missing.lock().contains(name) {
            return RawOutcome::err(NativeError::litecore(litecore_code::NOT_FOUND));
        }
        let mut object = FakeObject::new(kind);
        object.text = name.to_string();
        if name.is_empty() || !self.shared_lookups.load(Ordering::SeqCst) {
            return RawOutcome::ok(self.insert(object));
        }

        let mut cached = self.cached.lock();
        let key = (kind, name.to_string());
        if let Some(&id) = cached.get(&key) {
            let hit = self.with(NativeHandle(id), |o| {
                if o.alive() {
                    o.refs += 1;
                }
                o.alive()
            });
            if hit == Some(true) {
                return RawOutcome::ok(NativeHandle(id));
            }
        }
        let handle = self.insert(object);
        cached.insert(key, handle.0);
        RawOutcome::ok(handle)
    }

    fn event(&self, line: String) {
        self.socket_events.lock().push(line);
    }
}

impl Engine for FakeEngine {
    fn create(&self, request: &CreateRequest<'_>) -> RawOutcome {
        if let Some(error) = self.fail_next.lock().take() {
            return RawOutcome::err(error);
        }
        let kind = request.kind();
        match *request {
            CreateRequest::Collection { name, .. } => self.lookup(kind, name),
            CreateRequest::Document { doc_id, must_exist, .. } => {
                if must_exist && self.missing.lock().contains(doc_id) {
                    return RawOutcome::err(NativeError::litecore(litecore_code::NOT_FOUND));
                }
                self.lookup(kind, if must_exist { doc_id } else { "" })
            }
            CreateRequest::Index { name, .. } => self.lookup(kind, name),
            CreateRequest::ArrayInDict { key, .. } => {
                if self.missing.lock().contains(key) {
                    RawOutcome::absent()
                } else {
                    RawOutcome::ok(self.insert(FakeObject::new(kind)))
                }
            }
            CreateRequest::BlobKey { text } => {
                if !text.starts_with("sha1-") {
                    return RawOutcome::err(NativeError::litecore(litecore_code::INVALID_PARAMETER));
                }
                let mut object = FakeObject::new(kind);
                object.text = text.to_string();
                RawOutcome::ok(self.insert(object))
            }
            CreateRequest::ReadStream { key, .. } => {
                let key = self.text_of(key);
                match self.blobs.lock().get(&key) {
                    Some(bytes) => {
                        let mut object = FakeObject::new(kind);
                        object.data = bytes.clone();
                        RawOutcome::ok(self.insert(object))
                    }
                    None => RawOutcome::err(NativeError::litecore(litecore_code::NOT_FOUND)),
                }
            }
            CreateRequest::IndexUpdater { limit, .. } => {
                if limit == 0 {
                    return RawOutcome::absent();
                }
                let mut object = FakeObject::new(kind);
                object.count = limit;
                RawOutcome::ok(self.insert(object))
            }
            CreateRequest::KeyPair { label, .. } => {
                let mut object = FakeObject::new(kind);
                object.text = label.to_string();
                RawOutcome::ok(self.insert(object))
            }
            CreateRequest::Query { expression, .. } => {
                if expression.trim().is_empty() {
                    return RawOutcome::err(NativeError::litecore(litecore_code::INVALID_PARAMETER));
                }
                let mut object = FakeObject::new(kind);
                object.text = expression.to_string();
                RawOutcome::ok(self.insert(object))
            }
            CreateRequest::Replicator { .. } => {
                let mut object = FakeObject::new(kind);
                object.count = ActivityLevel::Stopped as u64;
                RawOutcome::ok(self.insert(object))
            }
            _ => RawOutcome::ok(self.insert(FakeObject::new(kind))),
        }
    }

    fn retain(&self, _kind: ObjectKind, handle: NativeHandle) {
        self.with(handle, |o| o.refs += 1);
    }

    fn release(&self, _kind: ObjectKind, handle: NativeHandle) {
        self.with(handle, |o| o.refs -= 1);
    }

    fn close(&self, kind: ObjectKind, handle: NativeHandle) {
        self.free(kind, handle);
    }

    fn free(&self, _kind: ObjectKind, handle: NativeHandle) {
        let twice = self
            .with(handle, |o| {
                let twice = o.freed;
                o.freed = true;
                o.refs = 0;
                twice
            })
            .unwrap_or(false);
        if twice {
            self.double_frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn alloc_slice(&self, bytes: &[u8]) -> RawSlice {
        let mut buf: Box<[u8]> = bytes.into();
        // zero-length allocations still need a distinct non-null address
        if buf.is_empty() {
            buf = vec![0u8; 1].into_boxed_slice();
        }
        let raw = RawSlice {
            buf: buf.as_ptr(),
            size: bytes.len(),
        };
        self.slices.lock().insert(raw.buf as usize, buf);
        raw
    }

    fn free_slice(&self, slice: RawSlice) {
        if slice.is_null() {
            return;
        }
        if self.slices.lock().remove(&(slice.buf as usize)).is_some() {
            self.slices_freed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.double_frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn error_message(&self, error: NativeError) -> RawSlice {
        self.alloc_slice(error.to_string().as_bytes())
    }

    fn set_log_callback(&self, level: i32, enabled: bool) {
        *self.log_level.lock() = Some((level, enabled));
    }

    fn query_explain(&self, query: NativeHandle) -> RawSlice {
        let text = format!("SCAN {}", self.text_of(query));
        self.alloc_slice(text.as_bytes())
    }

    fn query_observer_enable(&self, observer: NativeHandle, enabled: bool) {
        self.with(observer, |o| o.count = enabled as u64);
    }

    fn blob_key_to_string(&self, key: NativeHandle) -> RawSlice {
        let text = self.text_of(key);
        self.alloc_slice(text.as_bytes())
    }

    fn read_stream_read(&self, stream: NativeHandle, buf: &mut [u8]) -> Result<usize, NativeError> {
        self.with(stream, |o| {
            if o.freed {
                return Err(NativeError::new(ErrorDomain::Posix as i32, 9, 0));
            }
            let n = buf.len().min(o.data.len() - o.cursor);
            buf[..n].copy_from_slice(&o.data[o.cursor..o.cursor + n]);
            o.cursor += n;
            Ok(n)
        })
        .unwrap_or_else(|| Err(NativeError::litecore(litecore_code::INVALID_PARAMETER)))
    }

    fn write_stream_write(&self, stream: NativeHandle, bytes: &[u8]) -> Result<(), NativeError> {
        self.with(stream, |o| {
            if o.freed {
                return Err(NativeError::new(ErrorDomain::Posix as i32, 9, 0));
            }
            o.data.extend_from_slice(bytes);
            Ok(())
        })
        .unwrap_or_else(|| Err(NativeError::litecore(litecore_code::INVALID_PARAMETER)))
    }

    fn replicator_start(&self, replicator: NativeHandle, _reset: bool) {
        self.with(replicator, |o| o.count = ActivityLevel::Busy as u64);
    }

    fn replicator_stop(&self, replicator: NativeHandle) {
        self.with(replicator, |o| o.count = ActivityLevel::Stopped as u64);
    }

    fn replicator_status(&self, replicator: NativeHandle) -> ReplicatorStatus {
        let level = self.with(replicator, |o| o.count as i32).unwrap_or(0);
        ReplicatorStatus {
            level,
            ..ReplicatorStatus::stopped()
        }
    }

    fn register_socket_factory(&self, context: CallbackContext) {
        *self.socket_factory.lock() = Some(context);
    }

    fn socket_opened(&self, socket: NativeHandle) {
        self.event(format!("opened {}", socket));
    }

    fn socket_received(&self, socket: NativeHandle, bytes: &[u8]) {
        self.event(format!("received {} {}", socket, bytes.len()));
    }

    fn socket_completed_write(&self, socket: NativeHandle, byte_count: u64) {
        self.event(format!("completed {} {}", socket, byte_count));
    }

    fn socket_close_requested(&self, socket: NativeHandle, status: i32, message: &str) {
        self.event(format!("close-requested {} {} {}", socket, status, message));
    }

    fn socket_closed(&self, socket: NativeHandle, error: NativeError) {
        self.event(format!("closed {} {}", socket, error));
    }

    fn listener_port(&self, _listener: NativeHandle) -> u16 {
        LISTENER_PORT
    }

    fn index_updater_count(&self, updater: NativeHandle) -> u64 {
        self.with(updater, |o| o.count).unwrap_or(0)
    }

    fn key_pair_public_key_data(&self, key_pair: NativeHandle) -> Result<RawSlice, NativeError> {
        let label = self.text_of(key_pair);
        Ok(self.alloc_slice(format!("pub:{}", label).as_bytes()))
    }

    fn encoder_write_string(&self, encoder: NativeHandle, value: &str) -> bool {
        self.with(encoder, |o| {
            if o.freed {
                return false;
            }
            o.data.extend_from_slice(value.as_bytes());
            true
        })
        .unwrap_or(false)
    }

    fn encoder_finish(&self, encoder: NativeHandle) -> Result<RawSlice, NativeError> {
        let data = self
            .with(encoder, |o| std::mem::take(&mut o.data))
            .ok_or(NativeError::litecore(litecore_code::INVALID_PARAMETER))?;
        if data.is_empty() {
            return Err(NativeError::new(ErrorDomain::Fleece as i32, 3, 0));
        }
        Ok(self.alloc_slice(&data))
    }

    fn dict_iterator_next(&self, iterator: NativeHandle) -> bool {
        self.with(iterator, |o| {
            if o.cursor < DICT_KEYS.len() {
                o.cursor += 1;
            }
            o.cursor < DICT_KEYS.len()
        })
        .unwrap_or(false)
    }

    fn dict_iterator_key(&self, iterator: NativeHandle) -> RawSlice {
        match self.with(iterator, |o| o.cursor) {
            Some(i) if i < DICT_KEYS.len() => RawSlice {
                buf: DICT_KEYS[i].as_ptr(),
                size: DICT_KEYS[i].len(),
            },
            _ => RawSlice::NULL,
        }
    }

    fn register_predictive_model(&self, name: &str, context: CallbackContext) -> bool {
        let mut models = self.models.lock();
        if models.contains_key(name) {
            return false;
        }
        models.insert(name.to_string(), context);
        true
    }

    fn unregister_predictive_model(&self, name: &str) {
        self.models.lock().remove(name);
    }
}
