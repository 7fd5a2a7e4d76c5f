//! Opaque handles and per-kind ownership
//!
//! Every native object crosses the boundary as a 64-bit integer that is
//! bit-identical to the engine's pointer. The engine owns the referent; the
//! holder of a handle owns only the obligation to release it exactly once.
//!
//! How that obligation arises differs per kind: some creation calls return
//! an object that already carries a reference for the caller, others return
//! one the bridge must retain before handing it out. `ObjectKind::contract`
//! is the single source of truth for that table.
//!
//! On the Rust side ownership is expressed with two guard types:
//!
//! - [`Owned`] releases on drop, exactly once, using the kind's release
//!   method. `into_raw` hands the obligation to the managed side instead.
//! - [`Borrowed`] never releases.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use crate::engine::{CreateRequest, Engine, RawOutcome};
use crate::error::{litecore_code, BridgeError, NativeError, Result};
use crate::ledger::HandleLedger;

/// Opaque integer standing in for a native pointer
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        NativeHandle(ptr as usize as u64)
    }

    #[inline]
    pub fn as_ptr<T>(&self) -> *mut T {
        self.0 as usize as *mut T
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The value handed to managed code
    #[inline]
    pub fn to_managed(&self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn from_managed(raw: i64) -> Self {
        NativeHandle(raw as u64)
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// What a creation call leaves behind for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationContract {
    /// Returned with a reference already owned by the caller
    Retained,
    /// Returned without a reference; the bridge retains before handing out
    Unretained,
    /// Lifetime tied to a parent object; never released
    Borrowed,
    /// Plain allocation owned by the caller
    Allocated,
}

/// How a handle's obligation is discharged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMethod {
    Release,
    Close,
    Free,
    SliceFree,
    Nothing,
}

/// Kinds of native object that can cross the boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Collection = 1,
    Document = 2,
    Query = 3,
    QueryEnumerator = 4,
    QueryObserver = 5,
    BlobStore = 6,
    BlobKey = 7,
    ReadStream = 8,
    WriteStream = 9,
    Replicator = 10,
    Socket = 11,
    Listener = 12,
    Index = 13,
    IndexUpdater = 14,
    KeyPair = 15,
    Encoder = 16,
    Array = 17,
    Dict = 18,
    ArrayIterator = 19,
    DictIterator = 20,
    SliceResult = 21,
    DatabaseObserver = 22,
    CollectionObserver = 23,
    DocumentObserver = 24,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 24] = [
        ObjectKind::Collection,
        ObjectKind::Document,
        ObjectKind::Query,
        ObjectKind::QueryEnumerator,
        ObjectKind::QueryObserver,
        ObjectKind::BlobStore,
        ObjectKind::BlobKey,
        ObjectKind::ReadStream,
        ObjectKind::WriteStream,
        ObjectKind::Replicator,
        ObjectKind::Socket,
        ObjectKind::Listener,
        ObjectKind::Index,
        ObjectKind::IndexUpdater,
        ObjectKind::KeyPair,
        ObjectKind::Encoder,
        ObjectKind::Array,
        ObjectKind::Dict,
        ObjectKind::ArrayIterator,
        ObjectKind::DictIterator,
        ObjectKind::SliceResult,
        ObjectKind::DatabaseObserver,
        ObjectKind::CollectionObserver,
        ObjectKind::DocumentObserver,
    ];

    pub fn from_raw(raw: i32) -> Option<ObjectKind> {
        ObjectKind::ALL.iter().copied().find(|k| *k as i32 == raw)
    }

    /// Reference state of a freshly created object of this kind
    pub fn contract(&self) -> CreationContract {
        use ObjectKind::*;
        match self {
            Collection | Document | Query | QueryEnumerator | QueryObserver | ReadStream | WriteStream
            | Replicator | Listener | Index | IndexUpdater | KeyPair | DatabaseObserver
            | CollectionObserver | DocumentObserver => CreationContract::Retained,
            // sockets from the native factory and values borrowed from their
            // container arrive with no reference of their own
            Socket | Array | Dict => CreationContract::Unretained,
            BlobStore => CreationContract::Borrowed,
            BlobKey | Encoder | ArrayIterator | DictIterator | SliceResult => CreationContract::Allocated,
        }
    }

    pub fn release_method(&self) -> ReleaseMethod {
        use ObjectKind::*;
        match self {
            Collection | Document | Query | QueryEnumerator | Replicator | Socket | Index | IndexUpdater
            | KeyPair | Array | Dict => ReleaseMethod::Release,
            ReadStream | WriteStream => ReleaseMethod::Close,
            QueryObserver | BlobKey | Listener | Encoder | ArrayIterator | DictIterator | DatabaseObserver
            | CollectionObserver | DocumentObserver => ReleaseMethod::Free,
            SliceResult => ReleaseMethod::SliceFree,
            BlobStore => ReleaseMethod::Nothing,
        }
    }
}

/// Compile-time tag for a handle's object kind
pub trait Kind: 'static {
    const KIND: ObjectKind;
}

macro_rules! define_kinds {
    ($($name:ident),* $(,)?) => {
        /// Marker types for [`Owned`] and [`Borrowed`]
        pub mod kinds {
            $(
                #[derive(Debug)]
                pub enum $name {}

                impl super::Kind for $name {
                    const KIND: super::ObjectKind = super::ObjectKind::$name;
                }
            )*
        }
    };
}

define_kinds!(
    Collection,
    Document,
    Query,
    QueryEnumerator,
    QueryObserver,
    BlobStore,
    BlobKey,
    ReadStream,
    WriteStream,
    Replicator,
    Socket,
    Listener,
    Index,
    IndexUpdater,
    KeyPair,
    Encoder,
    Array,
    Dict,
    ArrayIterator,
    DictIterator,
    DatabaseObserver,
    CollectionObserver,
    DocumentObserver,
);

/// Decodes handles from managed code and discharges their obligations
pub struct HandleRegistry {
    engine: Arc<dyn Engine>,
    ledger: HandleLedger,
}

impl HandleRegistry {
    pub fn new(engine: Arc<dyn Engine>, poison: bool) -> Self {
        Self {
            engine,
            ledger: HandleLedger::new(poison),
        }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }

    /// Run a creation request and wrap the result according to its kind's
    /// contract.
    ///
    /// `Ok(None)` is the benign "absent" outcome (lookup miss, nothing to
    /// update); it never carries an error.
    pub fn create<K: Kind>(&self, request: &CreateRequest<'_>) -> Result<Option<Owned<'_, K>>> {
        if request.kind() != K::KIND {
            return Err(BridgeError::KindMismatch {
                handle: NativeHandle::NULL,
                expected: K::KIND,
                actual: request.kind(),
            });
        }
        let outcome = self.engine.create(request);
        match classify(request, outcome)? {
            Some(handle) => Ok(Some(self.adopt_created(handle))),
            None => Ok(None),
        }
    }

    /// Take ownership of a just-created object, retaining it if its kind
    /// arrives without a reference.
    pub fn adopt_created<K: Kind>(&self, handle: NativeHandle) -> Owned<'_, K> {
        if K::KIND.contract() == CreationContract::Unretained {
            self.engine.retain(K::KIND, handle);
        }
        crate::log_trace!("created {:?} {}", K::KIND, handle);
        Owned {
            handle,
            registry: self,
            _kind: PhantomData,
        }
    }

    /// Reclaim a handle the managed side is giving back for release. The
    /// managed owner is given up here; dropping the result releases the
    /// engine reference.
    pub fn reclaim<K: Kind>(&self, handle: NativeHandle) -> Result<Owned<'_, K>> {
        if handle.is_null() {
            return Err(BridgeError::InvalidHandle { kind: K::KIND, handle });
        }
        self.ledger.release(K::KIND, handle)?;
        Ok(Owned {
            handle,
            registry: self,
            _kind: PhantomData,
        })
    }

    /// Non-owning access to a handle passed in by the managed side
    pub fn borrow<K: Kind>(&self, handle: NativeHandle) -> Result<Borrowed<'_, K>> {
        if handle.is_null() {
            return Err(BridgeError::InvalidHandle { kind: K::KIND, handle });
        }
        self.ledger.check_usable(K::KIND, handle)?;
        Ok(Borrowed {
            handle,
            _registry: PhantomData,
            _kind: PhantomData,
        })
    }

    /// Kind-erased release, driven by the kind table
    pub fn release_raw(&self, kind: ObjectKind, handle: NativeHandle) -> Result<()> {
        if handle.is_null() {
            return Ok(());
        }
        self.ledger.release(kind, handle)?;
        self.discharge(kind, handle);
        Ok(())
    }

    fn discharge(&self, kind: ObjectKind, handle: NativeHandle) {
        match kind.release_method() {
            ReleaseMethod::Release => self.engine.release(kind, handle),
            ReleaseMethod::Close => self.engine.close(kind, handle),
            ReleaseMethod::Free => self.engine.free(kind, handle),
            // slice results are (base, size) pairs; see slice.rs
            ReleaseMethod::SliceFree => {
                crate::log_warn!("slice result {} released through the kind table; size unknown", handle);
            }
            ReleaseMethod::Nothing => {}
        }
        crate::log_trace!("released {:?} {}", kind, handle);
    }
}

/// Map a raw creation outcome onto handle / absent / error
fn classify(request: &CreateRequest<'_>, outcome: RawOutcome) -> Result<Option<NativeHandle>> {
    if !outcome.handle.is_null() {
        return Ok(Some(outcome.handle));
    }
    let absent = request.absent_policy();
    if !outcome.error.is_error() {
        if absent.allows_null() {
            return Ok(None);
        }
        return Err(BridgeError::Native(NativeError::litecore(litecore_code::UNEXPECTED_ERROR)));
    }
    if outcome.error.is_not_found() && absent.allows_not_found() {
        return Ok(None);
    }
    Err(BridgeError::Native(outcome.error))
}

/// An owned handle: releases exactly once on drop unless passed on with
/// `into_raw`
pub struct Owned<'r, K: Kind> {
    handle: NativeHandle,
    registry: &'r HandleRegistry,
    _kind: PhantomData<K>,
}

impl<'r, K: Kind> Owned<'r, K> {
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn borrow(&self) -> Borrowed<'_, K> {
        Borrowed {
            handle: self.handle,
            _registry: PhantomData,
            _kind: PhantomData,
        }
    }

    /// Transfer the release obligation to the managed side
    pub fn into_raw(self) -> NativeHandle {
        let handle = self.handle;
        self.registry.ledger.register(K::KIND, handle);
        mem::forget(self);
        handle
    }
}

impl<K: Kind> Drop for Owned<'_, K> {
    fn drop(&mut self) {
        self.registry.discharge(K::KIND, self.handle);
    }
}

impl<K: Kind> fmt::Debug for Owned<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owned<{:?}>({})", K::KIND, self.handle)
    }
}

/// A handle the holder must not release
pub struct Borrowed<'r, K: Kind> {
    handle: NativeHandle,
    _registry: PhantomData<&'r HandleRegistry>,
    _kind: PhantomData<K>,
}

impl<K: Kind> Clone for Borrowed<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: Kind> Copy for Borrowed<'_, K> {}

impl<K: Kind> Borrowed<'_, K> {
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }
}

impl<K: Kind> fmt::Debug for Borrowed<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Borrowed<{:?}>({})", K::KIND, self.handle)
    }
}
