use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::runtime::{
    ArgKind, Attachment, ClassId, LocalRef, ManagedRuntime, MethodId, MethodSig, PinnedRegion, UnpinMode, Value,
};

const EXCEPTION_CLASS: &str = "LiteBridge.LiteCoreException";

#[derive(Debug)]
enum Object {
    Str(Vec<u16>),
    Bytes(Vec<u8>),
    Array { slots: Vec<Option<u64>> },
    Instance { class: ClassId, args: Vec<Value> },
}

#[derive(Debug, Default)]
struct ThreadState {
    attached: bool,
    name: String,
    pending: bool,
    critical: bool,
}

#[derive(Debug, Clone)]
struct Method {
    class: ClassId,
    name: String,
    sig: MethodSig,
}

/// A managed value captured at call time, with references resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Void,
    Bool(bool),
    Int(i32),
    Long(i64),
    Null,
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Observed>),
    Object { class: String, fields: Vec<Observed> },
}

impl Observed {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Observed::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Observed::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Observed::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Observed::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Observed]> {
        match self {
            Observed::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// One call of a managed static method
#[derive(Debug, Clone)]
pub struct Invocation {
    pub class: String,
    pub method: String,
    pub args: Vec<Observed>,
    pub thread: ThreadId,
    pub thread_name: String,
}

/// An exception thrown by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown {
    pub domain: i32,
    pub code: i32,
    pub info: i32,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
enum Reply {
    Bool(bool),
    Bytes(Option<Vec<u8>>),
    Throw,
}

/// Managed runtime double
///
/// Classes and methods resolve on demand unless omitted with
/// [`FakeRuntime::omit_symbol`]. Every runtime call made from a thread that
/// is not attached panics, as does any call made while a critical pin is
/// held.
#[derive(Default)]
pub struct FakeRuntime {
    threads: Mutex<HashMap<ThreadId, ThreadState>>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    fail_attach: AtomicBool,
    fail_array_stores: AtomicBool,
    omitted: Mutex<HashSet<String>>,
    classes: Mutex<Vec<String>>,
    methods: Mutex<Vec<Method>>,
    next_ref: AtomicU64,
    objects: Mutex<HashMap<u64, Object>>,
    live: Mutex<HashSet<u64>>,
    pinned: AtomicUsize,
    calls: Mutex<Vec<Invocation>>,
    replies: Mutex<HashMap<String, Reply>>,
    thrown: Mutex<Vec<Thrown>>,
    described: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            next_ref: AtomicU64::new(1),
            ..Self::default()
        }
    }

    // -- configuration

    /// Make `name` ("Class" or "Class.method") unresolvable
    pub fn omit_symbol(&self, name: &str) {
        self.omitted.lock().insert(name.to_string());
    }

    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    /// Make every object-array element store fail
    pub fn fail_array_stores(&self, fail: bool) {
        self.fail_array_stores.store(fail, Ordering::SeqCst);
    }

    /// Force the pending-exception flag of the calling thread
    pub fn set_pending_exception(&self, pending: bool) {
        self.threads.lock().entry(thread::current().id()).or_default().pending = pending;
    }

    /// Boolean result for managed method `method`
    pub fn reply_bool(&self, method: &str, value: bool) {
        self.replies.lock().insert(method.to_string(), Reply::Bool(value));
    }

    /// Byte-array result (or null) for managed method `method`
    pub fn reply_bytes(&self, method: &str, value: Option<Vec<u8>>) {
        self.replies.lock().insert(method.to_string(), Reply::Bytes(value));
    }

    /// Make managed method `method` raise instead of returning
    pub fn reply_throw(&self, method: &str) {
        self.replies.lock().insert(method.to_string(), Reply::Throw);
    }

    // -- inspection

    pub fn attach_count(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    pub fn pinned_count(&self) -> usize {
        self.pinned.load(Ordering::SeqCst)
    }

    pub fn in_critical(&self) -> bool {
        self.threads
            .lock()
            .get(&thread::current().id())
            .map(|t| t.critical)
            .unwrap_or(false)
    }

    pub fn live_local_refs(&self) -> usize {
        self.live.lock().len()
    }

    /// Exceptions reported through `describe_and_clear_exception`
    pub fn described_count(&self) -> usize {
        self.described.load(Ordering::SeqCst)
    }

    pub fn string_value(&self, r: LocalRef) -> Option<String> {
        match self.objects.lock().get(&r.as_raw()) {
            Some(Object::Str(units)) => String::from_utf16(units).ok(),
            _ => None,
        }
    }

    pub fn bytes_value(&self, r: LocalRef) -> Option<Vec<u8>> {
        match self.objects.lock().get(&r.as_raw()) {
            Some(Object::Bytes(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Snapshot of a managed object and everything it references
    pub fn snapshot(&self, r: LocalRef) -> Observed {
        self.observe(&Value::Object(Some(r)))
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    /// Calls of the managed method named `method`
    pub fn calls_to(&self, method: &str) -> Vec<Invocation> {
        self.calls.lock().iter().filter(|c| c.method == method).cloned().collect()
    }

    /// Drain thrown exceptions and clear the calling thread's pending flag
    pub fn take_thrown(&self) -> Vec<Thrown> {
        if let Some(t) = self.threads.lock().get_mut(&thread::current().id()) {
            t.pending = false;
        }
        std::mem::take(&mut *self.thrown.lock())
    }

    // -- internals

    fn require_attached(&self, op: &str) {
        let threads = self.threads.lock();
        match threads.get(&thread::current().id()) {
            Some(t) if t.attached => {
                if t.critical {
                    panic!("{} called inside a critical region", op);
                }
            }
            _ => panic!("{} called from a thread that is not attached", op),
        }
    }

    fn alloc(&self, object: Object) -> LocalRef {
        let id = self.next_ref.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(id, object);
        self.live.lock().insert(id);
        LocalRef::from_raw(id).expect("ids start at 1")
    }

    fn class_name(&self, class: ClassId) -> String {
        self.classes
            .lock()
            .get(class.0 as usize - 1)
            .cloned()
            .unwrap_or_default()
    }

    fn observe(&self, value: &Value) -> Observed {
        match value {
            Value::Void => Observed::Void,
            Value::Bool(b) => Observed::Bool(*b),
            Value::Int(v) => Observed::Int(*v),
            Value::Long(v) => Observed::Long(*v),
            Value::Object(None) => Observed::Null,
            Value::Object(Some(r)) => self.observe_ref(r.as_raw()),
        }
    }

    fn observe_ref(&self, id: u64) -> Observed {
        enum Shape {
            Done(Observed),
            Array(Vec<Option<u64>>),
            Instance(ClassId, Vec<Value>),
        }
        let shape = match self.objects.lock().get(&id) {
            None => Shape::Done(Observed::Null),
            Some(Object::Str(units)) => Shape::Done(Observed::Str(String::from_utf16_lossy(units))),
            Some(Object::Bytes(b)) => Shape::Done(Observed::Bytes(b.clone())),
            Some(Object::Array { slots }) => Shape::Array(slots.clone()),
            Some(Object::Instance { class, args }) => Shape::Instance(*class, args.clone()),
        };
        match shape {
            Shape::Done(o) => o,
            Shape::Array(slots) => Observed::Array(
                slots
                    .into_iter()
                    .map(|s| s.map(|id| self.observe_ref(id)).unwrap_or(Observed::Null))
                    .collect(),
            ),
            Shape::Instance(class, args) => Observed::Object {
                class: self.class_name(class),
                fields: args.iter().map(|a| self.observe(a)).collect(),
            },
        }
    }
}

impl ManagedRuntime for FakeRuntime {
    fn attachment(&self) -> Attachment {
        match self.threads.lock().get(&thread::current().id()) {
            Some(t) if t.attached => Attachment::Attached,
            _ => Attachment::Detached,
        }
    }

    fn attach_current_thread(&self, thread_name: &str) -> bool {
        if self.fail_attach.load(Ordering::SeqCst) {
            return false;
        }
        let mut threads = self.threads.lock();
        let state = threads.entry(thread::current().id()).or_default();
        if !state.attached {
            state.attached = true;
            state.name = thread_name.to_string();
            self.attaches.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    fn detach_current_thread(&self) {
        if let Some(state) = self.threads.lock().get_mut(&thread::current().id()) {
            if state.attached {
                state.attached = false;
                state.pending = false;
                self.detaches.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn exception_pending(&self) -> bool {
        self.threads
            .lock()
            .get(&thread::current().id())
            .map(|t| t.pending)
            .unwrap_or(false)
    }

    fn describe_and_clear_exception(&self) {
        self.described.fetch_add(1, Ordering::SeqCst);
        if let Some(t) = self.threads.lock().get_mut(&thread::current().id()) {
            t.pending = false;
        }
    }

    fn resolve_class(&self, name: &str) -> Option<ClassId> {
        self.require_attached("resolve_class");
        if self.omitted.lock().contains(name) {
            return None;
        }
        let mut classes = self.classes.lock();
        if let Some(i) = classes.iter().position(|c| c == name) {
            return Some(ClassId(i as u64 + 1));
        }
        classes.push(name.to_string());
        Some(ClassId(classes.len() as u64))
    }

    fn resolve_method(&self, class: ClassId, name: &str, sig: &MethodSig, _is_static: bool) -> Option<MethodId> {
        self.require_attached("resolve_method");
        let qualified = format!("{}.{}", self.class_name(class), name);
        if self.omitted.lock().contains(&qualified) {
            return None;
        }
        let mut methods = self.methods.lock();
        methods.push(Method {
            class,
            name: name.to_string(),
            sig: *sig,
        });
        Some(MethodId(methods.len() as u64))
    }

    fn call_static(&self, class: ClassId, method: MethodId, args: &[Value]) -> Value {
        self.require_attached("call_static");
        let target = self.methods.lock()[method.0 as usize - 1].clone();
        assert_eq!(target.class, class, "method called on the wrong class");
        assert!(target.sig.accepts(args), "{} called with {:?}", target.name, args);

        let observed = args.iter().map(|a| self.observe(a)).collect();
        let thread_name = self
            .threads
            .lock()
            .get(&thread::current().id())
            .map(|t| t.name.clone())
            .unwrap_or_default();
        self.calls.lock().push(Invocation {
            class: self.class_name(class),
            method: target.name.clone(),
            args: observed,
            thread: thread::current().id(),
            thread_name,
        });

        let reply = self.replies.lock().get(&target.name).cloned();
        match (reply, target.sig.ret) {
            (Some(Reply::Throw), _) => {
                self.set_pending_exception(true);
                match target.sig.ret {
                    ArgKind::Bool => Value::Bool(false),
                    ArgKind::Object => Value::Object(None),
                    _ => Value::Void,
                }
            }
            (Some(Reply::Bool(b)), ArgKind::Bool) => Value::Bool(b),
            (Some(Reply::Bytes(Some(bytes))), ArgKind::Object) => Value::Object(Some(self.alloc(Object::Bytes(bytes)))),
            (_, ArgKind::Bool) => Value::Bool(false),
            (_, ArgKind::Object) => Value::Object(None),
            (_, ArgKind::Int) => Value::Int(0),
            (_, ArgKind::Long) => Value::Long(0),
            (_, ArgKind::Void) => Value::Void,
        }
    }

    fn new_object(&self, class: ClassId, ctor: MethodId, args: &[Value]) -> Option<LocalRef> {
        self.require_attached("new_object");
        let target = self.methods.lock()[ctor.0 as usize - 1].clone();
        assert_eq!(target.name, "<init>");
        assert!(target.sig.accepts(args), "constructor called with {:?}", args);
        Some(self.alloc(Object::Instance {
            class,
            args: args.to_vec(),
        }))
    }

    fn throw(&self, exception: LocalRef) -> bool {
        self.require_attached("throw");
        let (class, args) = match self.objects.lock().get(&exception.as_raw()) {
            Some(Object::Instance { class, args }) => (*class, args.clone()),
            _ => return false,
        };
        if self.class_name(class) != EXCEPTION_CLASS {
            return false;
        }
        let int = |i: usize| match args.get(i) {
            Some(Value::Int(v)) => *v,
            _ => 0,
        };
        let message = args
            .get(3)
            .and_then(|v| v.as_object())
            .and_then(|r| self.string_value(r));
        self.thrown.lock().push(Thrown {
            domain: int(0),
            code: int(1),
            info: int(2),
            message,
        });
        self.set_pending_exception(true);
        true
    }

    fn new_string_utf16(&self, units: &[u16]) -> Option<LocalRef> {
        self.require_attached("new_string_utf16");
        Some(self.alloc(Object::Str(units.to_vec())))
    }

    fn string_utf16(&self, string: LocalRef) -> Option<Vec<u16>> {
        self.require_attached("string_utf16");
        match self.objects.lock().get(&string.as_raw()) {
            Some(Object::Str(units)) => Some(units.clone()),
            _ => None,
        }
    }

    fn new_byte_array(&self, bytes: &[u8]) -> Option<LocalRef> {
        self.require_attached("new_byte_array");
        Some(self.alloc(Object::Bytes(bytes.to_vec())))
    }

    fn byte_array_len(&self, array: LocalRef) -> Option<usize> {
        self.require_attached("byte_array_len");
        match self.objects.lock().get(&array.as_raw()) {
            Some(Object::Bytes(b)) => Some(b.len()),
            _ => None,
        }
    }

    fn pin_byte_array(&self, array: LocalRef, critical: bool) -> Option<PinnedRegion> {
        self.require_attached("pin_byte_array");
        let region = match self.objects.lock().get_mut(&array.as_raw()) {
            // the Vec's heap buffer does not move while the map entry exists
            Some(Object::Bytes(b)) => PinnedRegion {
                ptr: b.as_mut_ptr(),
                len: b.len(),
            },
            _ => return None,
        };
        self.pinned.fetch_add(1, Ordering::SeqCst);
        if critical {
            if let Some(t) = self.threads.lock().get_mut(&thread::current().id()) {
                t.critical = true;
            }
        }
        Some(region)
    }

    fn unpin_byte_array(&self, _array: LocalRef, _region: PinnedRegion, critical: bool, _mode: UnpinMode) {
        self.pinned.fetch_sub(1, Ordering::SeqCst);
        if critical {
            if let Some(t) = self.threads.lock().get_mut(&thread::current().id()) {
                t.critical = false;
            }
        }
    }

    fn new_object_array(&self, _element_class: ClassId, len: usize) -> Option<LocalRef> {
        self.require_attached("new_object_array");
        Some(self.alloc(Object::Array { slots: vec![None; len] }))
    }

    fn set_array_element(&self, array: LocalRef, index: usize, value: Option<LocalRef>) -> bool {
        self.require_attached("set_array_element");
        if self.fail_array_stores.load(Ordering::SeqCst) {
            return false;
        }
        match self.objects.lock().get_mut(&array.as_raw()) {
            Some(Object::Array { slots }) if index < slots.len() => {
                slots[index] = value.map(|v| v.as_raw());
                true
            }
            _ => false,
        }
    }

    fn delete_local_ref(&self, r: LocalRef) {
        self.live.lock().remove(&r.as_raw());
    }
}
