//! The managed runtime, as seen from native code
//!
//! `ManagedRuntime` is the minimal surface the bridge needs from the host:
//! thread attachment, exception state, one-time symbol resolution, and the
//! handful of object operations used to marshal callback arguments.
//! Implementations must be callable from any thread; every method except
//! `attachment` and `attach_current_thread` requires the calling thread to
//! be attached.

/// Reference to a managed object, valid until deleted or until the current
/// native frame returns to the runtime
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalRef(u64);

impl LocalRef {
    /// `0` is the managed null
    #[inline]
    pub fn from_raw(raw: u64) -> Option<LocalRef> {
        if raw == 0 {
            None
        } else {
            Some(LocalRef(raw))
        }
    }

    #[inline]
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Raw value of an optional reference (`0` for null)
#[inline]
pub fn raw_ref(r: Option<LocalRef>) -> u64 {
    r.map(|r| r.as_raw()).unwrap_or(0)
}

/// Process-lifetime (pinned) reference to a managed class
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u64);

/// Process-lifetime identifier of a managed method or constructor
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u64);

/// Argument and return kinds understood by the bridge
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Void = 0,
    Bool = 1,
    Int = 2,
    Long = 3,
    Object = 4,
}

/// A typed method signature, checked by the runtime at resolution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub params: &'static [ArgKind],
    pub ret: ArgKind,
}

impl MethodSig {
    pub const fn new(params: &'static [ArgKind], ret: ArgKind) -> Self {
        Self { params, ret }
    }

    /// Whether `args` lines up with the declared parameter kinds
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len() && self.params.iter().zip(args).all(|(k, v)| *k == v.kind())
    }
}

/// Argument or return value crossing into the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i32),
    Long(i64),
    Object(Option<LocalRef>),
}

impl Value {
    pub fn kind(&self) -> ArgKind {
        match self {
            Value::Void => ArgKind::Void,
            Value::Bool(_) => ArgKind::Bool,
            Value::Int(_) => ArgKind::Int,
            Value::Long(_) => ArgKind::Long,
            Value::Object(_) => ArgKind::Object,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<LocalRef> {
        match self {
            Value::Object(r) => *r,
            _ => None,
        }
    }
}

/// Attachment status of the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Attached,
    Detached,
}

/// A pinned view of a managed byte array's storage
#[derive(Debug, Clone, Copy)]
pub struct PinnedRegion {
    pub ptr: *mut u8,
    pub len: usize,
}

/// What to do with a pinned region's contents on unpin
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpinMode {
    /// Copy changes back (if the runtime handed out a copy)
    Commit = 0,
    /// Discard; the view was read-only
    Abort = 1,
}

pub trait ManagedRuntime: Send + Sync {
    /// Whether the calling thread is attached. Safe on any thread.
    fn attachment(&self) -> Attachment;

    /// Attach the calling thread under `thread_name`. May block while the
    /// runtime finishes a stop-the-world phase.
    fn attach_current_thread(&self, thread_name: &str) -> bool;

    fn detach_current_thread(&self);

    fn exception_pending(&self) -> bool;

    /// Report (to the runtime's own error output) and clear the pending
    /// exception
    fn describe_and_clear_exception(&self);

    /// Resolve and pin a class for the life of the process
    fn resolve_class(&self, name: &str) -> Option<ClassId>;

    /// Resolve a method (`is_static`) or constructor (`name == "<init>"`)
    fn resolve_method(&self, class: ClassId, name: &str, sig: &MethodSig, is_static: bool) -> Option<MethodId>;

    /// Invoke a static method. Exceptions are reported through
    /// `exception_pending`, not through the return value.
    fn call_static(&self, class: ClassId, method: MethodId, args: &[Value]) -> Value;

    fn new_object(&self, class: ClassId, ctor: MethodId, args: &[Value]) -> Option<LocalRef>;

    /// Raise `exception` on the calling thread. Returns false if the runtime
    /// refused.
    fn throw(&self, exception: LocalRef) -> bool;

    /// Construct a string from UTF-16 code units, bypassing the runtime's
    /// own UTF-8 decoder
    fn new_string_utf16(&self, units: &[u16]) -> Option<LocalRef>;

    fn string_utf16(&self, string: LocalRef) -> Option<Vec<u16>>;

    /// New byte array holding a copy of `bytes`
    fn new_byte_array(&self, bytes: &[u8]) -> Option<LocalRef>;

    fn byte_array_len(&self, array: LocalRef) -> Option<usize>;

    /// Pin (or copy) the array's storage. With `critical`, no other runtime
    /// call may be made until the matching unpin.
    fn pin_byte_array(&self, array: LocalRef, critical: bool) -> Option<PinnedRegion>;

    fn unpin_byte_array(&self, array: LocalRef, region: PinnedRegion, critical: bool, mode: UnpinMode);

    fn new_object_array(&self, element_class: ClassId, len: usize) -> Option<LocalRef>;

    fn set_array_element(&self, array: LocalRef, index: usize, value: Option<LocalRef>) -> bool;

    fn delete_local_ref(&self, r: LocalRef);
}
