//! Callback dispatch: engine events into managed calls
//!
//! Each event source has one dispatcher with the same shape:
//!
//! 1. attach the calling thread if needed (`attach::enter`)
//! 2. refuse to run if an exception is already pending
//! 3. marshal the payload into arguments, context first
//! 4. call the cached managed method
//! 5. delete every local reference created for the call
//! 6. detach if this call attached
//!
//! Nothing here returns an error to the engine. Failures are reported on
//! the fallback channel and the callback is dropped; callbacks that must
//! answer (filters, authenticators, prediction) answer with a fixed
//! default.

use crate::attach;
use crate::engine::RawSlice;
use crate::error::{BridgeError, Result};
use crate::events::{CallbackContext, DocumentEnded, FilterRequest, ReplicatorStatus, SocketOpen};
use crate::handle::NativeHandle;
use crate::logging;
use crate::marshal;
use crate::runtime::{LocalRef, ManagedRuntime, Value};
use crate::symbols::{CallbackKind, ValueClass};
use crate::Bridge;

/// Local references created while marshaling one call
pub struct LocalFrame<'r, R: ManagedRuntime + ?Sized> {
    runtime: &'r R,
    refs: Vec<LocalRef>,
}

impl<'r, R: ManagedRuntime + ?Sized> LocalFrame<'r, R> {
    pub fn new(runtime: &'r R) -> Self {
        Self {
            runtime,
            refs: Vec::new(),
        }
    }

    pub fn track(&mut self, r: Option<LocalRef>) -> Option<LocalRef> {
        if let Some(r) = r {
            self.refs.push(r);
        }
        r
    }

    pub fn string(&mut self, bytes: &[u8]) -> Result<Value> {
        let r = marshal::to_managed_string(self.runtime, Some(bytes))?;
        Ok(Value::Object(self.track(r)))
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> Result<Value> {
        let r = marshal::to_managed_bytes(self.runtime, Some(bytes))?;
        Ok(Value::Object(self.track(r)))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl<R: ManagedRuntime + ?Sized> Drop for LocalFrame<'_, R> {
    fn drop(&mut self) {
        for r in self.refs.drain(..) {
            self.runtime.delete_local_ref(r);
        }
    }
}

fn ctx(context: CallbackContext) -> Value {
    Value::Long(context.0)
}

fn handle(h: NativeHandle) -> Value {
    Value::Long(h.to_managed())
}

impl<R: ManagedRuntime> Bridge<R> {
    /// Common path for every dispatcher. `None` means the managed method was
    /// not invoked or did not complete normally.
    fn deliver<T, M, C>(&self, kind: CallbackKind, marshal_args: M, convert: C) -> Option<T>
    where
        M: FnOnce(&mut LocalFrame<'_, R>) -> Result<Vec<Value>>,
        C: FnOnce(&mut LocalFrame<'_, R>, Value) -> Result<T>,
    {
        let guard = match attach::enter(&self.runtime, &self.config.thread_name(label(kind))) {
            Ok(g) => g,
            Err(e) => {
                logging::fallback("litebridge::dispatch", &format!("{:?} dropped: {}", kind, e));
                return None;
            }
        };
        if let Err(e) = guard.ensure_no_pending_exception() {
            logging::fallback("litebridge::dispatch", &format!("{:?} dropped: {}", kind, e));
            return None;
        }

        let target = self.symbols.method(kind);
        let mut frame = LocalFrame::new(&self.runtime);
        let args = match marshal_args(&mut frame) {
            Ok(args) => args,
            Err(e) => {
                crate::log_warn!("{:?} dropped while marshaling: {}", kind, e);
                if self.runtime.exception_pending() {
                    self.runtime.describe_and_clear_exception();
                }
                return None;
            }
        };
        debug_assert!(target.sig.accepts(&args), "{:?} argument mismatch", kind);

        let ret = self.runtime.call_static(target.class, target.method, &args);
        if self.runtime.exception_pending() {
            crate::log_warn!("{:?} handler raised an exception", kind);
            self.runtime.describe_and_clear_exception();
            if let Some(r) = ret.as_object() {
                frame.track(Some(r));
            }
            return None;
        }
        if let Some(r) = ret.as_object() {
            frame.track(Some(r));
        }
        match convert(&mut frame, ret) {
            Ok(v) => Some(v),
            Err(e) => {
                crate::log_warn!("{:?} result unusable: {}", kind, e);
                None
            }
        }
    }

    fn deliver_void<M>(&self, kind: CallbackKind, marshal_args: M)
    where
        M: FnOnce(&mut LocalFrame<'_, R>) -> Result<Vec<Value>>,
    {
        let _ = self.deliver(kind, marshal_args, |_, _| Ok(()));
    }

    fn deliver_bool<M>(&self, kind: CallbackKind, marshal_args: M) -> bool
    where
        M: FnOnce(&mut LocalFrame<'_, R>) -> Result<Vec<Value>>,
    {
        self.deliver(kind, marshal_args, |_, ret| {
            ret.as_bool()
                .ok_or_else(|| BridgeError::Marshal(format!("expected bool, got {:?}", ret.kind())))
        })
        .unwrap_or(false)
    }

    // ---------------------------------------------------------------------
    // Logging
    // ---------------------------------------------------------------------

    /// Engine log line
    pub fn on_log(&self, domain: &[u8], level: i32, message: &[u8]) {
        self.deliver_void(CallbackKind::Log, |f| {
            Ok(vec![f.string(domain)?, Value::Int(level), f.string(message)?])
        });
    }

    // ---------------------------------------------------------------------
    // Observers
    // ---------------------------------------------------------------------

    pub fn on_database_changed(&self, context: CallbackContext) {
        self.deliver_void(CallbackKind::DatabaseChanged, |_| Ok(vec![ctx(context)]));
    }

    pub fn on_collection_changed(&self, context: CallbackContext) {
        self.deliver_void(CallbackKind::CollectionChanged, |_| Ok(vec![ctx(context)]));
    }

    pub fn on_document_changed(&self, context: CallbackContext, doc_id: &[u8], sequence: u64) {
        self.deliver_void(CallbackKind::DocumentChanged, |f| {
            Ok(vec![ctx(context), f.string(doc_id)?, Value::Long(sequence as i64)])
        });
    }

    pub fn on_query_changed(&self, context: CallbackContext) {
        self.deliver_void(CallbackKind::QueryChanged, |_| Ok(vec![ctx(context)]));
    }

    // ---------------------------------------------------------------------
    // Replicator
    // ---------------------------------------------------------------------

    pub fn on_replicator_status(&self, context: CallbackContext, status: &ReplicatorStatus) {
        self.deliver_void(CallbackKind::ReplicatorStatus, |f| {
            let obj = self.new_status_object(status)?;
            Ok(vec![ctx(context), Value::Object(f.track(Some(obj)))])
        });
    }

    /// Build a managed `ReplicatorStatus`; the caller owns the local ref
    pub(crate) fn new_status_object(&self, status: &ReplicatorStatus) -> Result<LocalRef> {
        let class = self.symbols.class(ValueClass::ReplicatorStatus);
        let ctor = class
            .ctor
            .ok_or_else(|| BridgeError::Marshal("ReplicatorStatus has no constructor".into()))?;
        self.runtime
            .new_object(
                class.class,
                ctor,
                &[
                    Value::Int(status.level),
                    Value::Long(status.progress.units_completed as i64),
                    Value::Long(status.progress.units_total as i64),
                    Value::Long(status.progress.document_count as i64),
                    Value::Int(status.error.domain),
                    Value::Int(status.error.code),
                    Value::Int(status.error.internal_info),
                    Value::Int(status.flags),
                ],
            )
            .ok_or_else(|| BridgeError::Marshal("could not construct ReplicatorStatus".into()))
    }

    /// A batch of per-document outcomes. `None` entries (null engine
    /// pointers) and entries that fail to convert stay null in the managed
    /// array; the batch is always delivered with one slot per entry.
    pub fn on_documents_ended(&self, context: CallbackContext, pushing: bool, docs: &[Option<DocumentEnded<'_>>]) {
        self.deliver_void(CallbackKind::DocumentsEnded, |f| {
            let class = self.symbols.class(ValueClass::DocumentEnded);
            let ctor = class
                .ctor
                .ok_or_else(|| BridgeError::Marshal("DocumentEnded has no constructor".into()))?;
            let array = self
                .runtime
                .new_object_array(class.class, docs.len())
                .ok_or_else(|| BridgeError::Marshal("could not allocate DocumentEnded[]".into()))?;
            f.track(Some(array));

            for (i, doc) in docs.iter().enumerate() {
                let doc = match doc {
                    Some(d) => d,
                    None => {
                        crate::log_warn!("documents-ended slot {} has no document; left null", i);
                        continue;
                    }
                };
                // one frame per element keeps large batches from piling up refs
                let mut item = LocalFrame::new(&self.runtime);
                let built = (|| -> Result<LocalRef> {
                    let args = [
                        item.string(doc.scope)?,
                        item.string(doc.collection)?,
                        item.string(doc.doc_id)?,
                        item.string(doc.rev_id)?,
                        Value::Int(doc.flags),
                        Value::Int(doc.error.domain),
                        Value::Int(doc.error.code),
                        Value::Int(doc.error.internal_info),
                        Value::Bool(doc.error_is_transient),
                    ];
                    self.runtime
                        .new_object(class.class, ctor, &args)
                        .ok_or_else(|| BridgeError::Marshal("could not construct DocumentEnded".into()))
                })();
                match built {
                    Ok(obj) => {
                        item.track(Some(obj));
                        if !self.runtime.set_array_element(array, i, Some(obj)) {
                            crate::log_warn!("documents-ended slot {} could not be stored", i);
                        }
                    }
                    Err(e) => crate::log_warn!("documents-ended slot {} skipped: {}", i, e),
                }
            }
            Ok(vec![ctx(context), Value::Bool(pushing), Value::Object(Some(array))])
        });
    }

    /// Push/pull filter. Unreachable managed side means "reject".
    pub fn on_replication_filter(&self, request: &FilterRequest<'_>) -> bool {
        self.deliver_bool(CallbackKind::ReplicationFilter, |f| {
            Ok(vec![
                ctx(request.context),
                Value::Bool(request.pushing),
                f.string(request.scope)?,
                f.string(request.collection)?,
                f.string(request.doc_id)?,
                f.string(request.rev_id)?,
                Value::Int(request.flags),
                handle(request.body),
            ])
        })
    }

    // ---------------------------------------------------------------------
    // Socket factory
    // ---------------------------------------------------------------------

    pub fn on_socket_open(&self, event: &SocketOpen<'_>) {
        self.deliver_void(CallbackKind::SocketOpen, |f| {
            Ok(vec![
                ctx(event.context),
                handle(event.socket),
                f.string(event.scheme)?,
                f.string(event.host)?,
                Value::Int(event.port as i32),
                f.string(event.path)?,
                f.bytes(event.options)?,
            ])
        });
    }

    /// Outgoing data. The bridge owns `data` from here on and frees it
    /// exactly once, as soon as it has been copied.
    pub fn on_socket_write(&self, context: CallbackContext, socket: NativeHandle, data: RawSlice) {
        let mut owned = self.handles.adopt_slice(data);
        self.deliver_void(CallbackKind::SocketWrite, |f| {
            let bytes = f.bytes(owned.bytes()?)?;
            owned.release()?;
            Ok(vec![ctx(context), handle(socket), bytes])
        });
        // attach or marshal failure: `owned` is still bound and drops here
    }

    pub fn on_socket_completed_receive(&self, context: CallbackContext, socket: NativeHandle, byte_count: u64) {
        self.deliver_void(CallbackKind::SocketCompletedReceive, |_| {
            Ok(vec![ctx(context), handle(socket), Value::Long(byte_count as i64)])
        });
    }

    pub fn on_socket_request_close(&self, context: CallbackContext, socket: NativeHandle, status: i32, message: &[u8]) {
        self.deliver_void(CallbackKind::SocketRequestClose, |f| {
            Ok(vec![ctx(context), handle(socket), Value::Int(status), f.string(message)?])
        });
    }

    pub fn on_socket_close(&self, context: CallbackContext, socket: NativeHandle) {
        self.deliver_void(CallbackKind::SocketClose, |_| Ok(vec![ctx(context), handle(socket)]));
    }

    pub fn on_socket_dispose(&self, context: CallbackContext, socket: NativeHandle) {
        self.deliver_void(CallbackKind::SocketDispose, |_| Ok(vec![ctx(context), handle(socket)]));
    }

    // ---------------------------------------------------------------------
    // Listener
    // ---------------------------------------------------------------------

    pub fn on_http_auth(&self, context: CallbackContext, auth_header: Option<&[u8]>) -> bool {
        self.deliver_bool(CallbackKind::HttpAuth, |f| {
            let header = match auth_header {
                Some(h) => f.string(h)?,
                None => Value::Object(None),
            };
            Ok(vec![ctx(context), header])
        })
    }

    /// TLS client certificate chain, leaf first. Null entries stay null.
    pub fn on_cert_auth(&self, context: CallbackContext, chain: &[Option<&[u8]>]) -> bool {
        self.deliver_bool(CallbackKind::CertAuth, |f| {
            let element = self.symbols.class(ValueClass::ByteArray).class;
            let array = self
                .runtime
                .new_object_array(element, chain.len())
                .ok_or_else(|| BridgeError::Marshal("could not allocate certificate array".into()))?;
            f.track(Some(array));
            for (i, cert) in chain.iter().enumerate() {
                let cert = match *cert {
                    Some(c) => c,
                    None => continue,
                };
                match marshal::to_managed_bytes(&self.runtime, Some(cert)) {
                    Ok(Some(bytes)) => {
                        let stored = self.runtime.set_array_element(array, i, Some(bytes));
                        self.runtime.delete_local_ref(bytes);
                        if !stored {
                            return Err(BridgeError::Marshal(format!("certificate {} could not be stored", i)));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => crate::log_warn!("certificate {} skipped: {}", i, e),
                }
            }
            Ok(vec![ctx(context), Value::Object(Some(array))])
        })
    }

    // ---------------------------------------------------------------------
    // Prediction
    // ---------------------------------------------------------------------

    /// Run a managed predictive model. The returned buffer is allocated by
    /// the engine and owned by it; null means "no prediction".
    pub fn on_predict(&self, context: CallbackContext, input: NativeHandle, db: NativeHandle) -> RawSlice {
        let result = self.deliver(
            CallbackKind::Predict,
            |_| Ok(vec![ctx(context), handle(input), handle(db)]),
            |_, ret| marshal::from_managed_bytes(&self.runtime, ret.as_object()),
        );
        match result.flatten() {
            Some(bytes) => self.engine().alloc_slice(&bytes),
            None => RawSlice::NULL,
        }
    }

    // ---------------------------------------------------------------------
    // Peer sync
    // ---------------------------------------------------------------------

    pub fn on_peer_discovered(&self, context: CallbackContext, peer_id: &[u8], online: bool) {
        self.deliver_void(CallbackKind::PeerDiscovered, |f| {
            Ok(vec![ctx(context), f.bytes(peer_id)?, Value::Bool(online)])
        });
    }

    pub fn on_peer_authenticate(&self, context: CallbackContext, peer_id: &[u8], certificate: &[u8]) -> bool {
        self.deliver_bool(CallbackKind::PeerAuthenticate, |f| {
            Ok(vec![ctx(context), f.bytes(peer_id)?, f.bytes(certificate)?])
        })
    }
}

/// Thread-name suffix for threads attached to deliver `kind`
fn label(kind: CallbackKind) -> &'static str {
    use crate::symbols::Subsystem;
    match kind.entry().subsystem {
        Subsystem::Exceptions => "exc",
        Subsystem::Logging => "log",
        Subsystem::Observers => "observer",
        Subsystem::Replicator => "repl",
        Subsystem::Socket => "socket",
        Subsystem::Listener => "listener",
        Subsystem::Prediction => "predict",
        Subsystem::PeerSync => "peer",
    }
}
