//! Global symbol cache
//!
//! Every managed class, method and constructor the bridge calls is declared
//! here, in one table keyed by event kind. `Symbols::resolve` walks the
//! subsystems in a fixed order and resolves each one completely or fails;
//! there is no partially usable subsystem. The result is immutable and is
//! shared read-only by all dispatchers.
//!
//! Resolved classes are pinned by the runtime for the life of the process.
//! Nothing here is ever torn down: the references are abandoned at exit.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};
use crate::runtime::{ArgKind, ClassId, ManagedRuntime, MethodId, MethodSig};

/// Groups of symbols initialized together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Exceptions,
    Logging,
    Observers,
    Replicator,
    Socket,
    Listener,
    Prediction,
    PeerSync,
}

impl Subsystem {
    /// Load-time initialization order
    pub const INIT_ORDER: [Subsystem; 8] = [
        Subsystem::Exceptions,
        Subsystem::Logging,
        Subsystem::Observers,
        Subsystem::Replicator,
        Subsystem::Socket,
        Subsystem::Listener,
        Subsystem::Prediction,
        Subsystem::PeerSync,
    ];
}

/// Asynchronous event sources, one managed entry point each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Log = 0,
    DatabaseChanged,
    CollectionChanged,
    DocumentChanged,
    QueryChanged,
    ReplicatorStatus,
    DocumentsEnded,
    ReplicationFilter,
    SocketOpen,
    SocketWrite,
    SocketCompletedReceive,
    SocketRequestClose,
    SocketClose,
    SocketDispose,
    HttpAuth,
    CertAuth,
    Predict,
    PeerDiscovered,
    PeerAuthenticate,
}

/// Where a callback lands on the managed side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub subsystem: Subsystem,
    pub class: &'static str,
    pub method: &'static str,
    pub sig: MethodSig,
}

const LOG_SINK: &str = "LiteBridge.Interop.LogSink";
const CHANGE_NOTIFIER: &str = "LiteBridge.Interop.ChangeNotifier";
const REPLICATOR_BRIDGE: &str = "LiteBridge.Interop.ReplicatorBridge";
const SOCKET_FACTORY: &str = "LiteBridge.Interop.SocketFactory";
const LISTENER_BRIDGE: &str = "LiteBridge.Interop.ListenerBridge";
const PREDICTION_BRIDGE: &str = "LiteBridge.Interop.PredictiveModelBridge";
const PEER_SYNC_BRIDGE: &str = "LiteBridge.Interop.PeerSyncBridge";

use ArgKind::{Bool as Z, Int as I, Long as J, Object as L, Void as V};

impl CallbackKind {
    pub const COUNT: usize = 19;

    pub const ALL: [CallbackKind; CallbackKind::COUNT] = [
        CallbackKind::Log,
        CallbackKind::DatabaseChanged,
        CallbackKind::CollectionChanged,
        CallbackKind::DocumentChanged,
        CallbackKind::QueryChanged,
        CallbackKind::ReplicatorStatus,
        CallbackKind::DocumentsEnded,
        CallbackKind::ReplicationFilter,
        CallbackKind::SocketOpen,
        CallbackKind::SocketWrite,
        CallbackKind::SocketCompletedReceive,
        CallbackKind::SocketRequestClose,
        CallbackKind::SocketClose,
        CallbackKind::SocketDispose,
        CallbackKind::HttpAuth,
        CallbackKind::CertAuth,
        CallbackKind::Predict,
        CallbackKind::PeerDiscovered,
        CallbackKind::PeerAuthenticate,
    ];

    pub fn entry(&self) -> EntryPoint {
        let (subsystem, class, method, params, ret): (_, _, _, &'static [ArgKind], _) = match self {
            CallbackKind::Log => (Subsystem::Logging, LOG_SINK, "log", &[L, I, L], V),
            CallbackKind::DatabaseChanged => (Subsystem::Observers, CHANGE_NOTIFIER, "databaseChanged", &[J], V),
            CallbackKind::CollectionChanged => (Subsystem::Observers, CHANGE_NOTIFIER, "collectionChanged", &[J], V),
            CallbackKind::DocumentChanged => {
                (Subsystem::Observers, CHANGE_NOTIFIER, "documentChanged", &[J, L, J], V)
            }
            CallbackKind::QueryChanged => (Subsystem::Observers, CHANGE_NOTIFIER, "queryChanged", &[J], V),
            CallbackKind::ReplicatorStatus => (Subsystem::Replicator, REPLICATOR_BRIDGE, "statusChanged", &[J, L], V),
            CallbackKind::DocumentsEnded => {
                (Subsystem::Replicator, REPLICATOR_BRIDGE, "documentsEnded", &[J, Z, L], V)
            }
            CallbackKind::ReplicationFilter => (
                Subsystem::Replicator,
                REPLICATOR_BRIDGE,
                "filter",
                &[J, Z, L, L, L, L, I, J],
                Z,
            ),
            CallbackKind::SocketOpen => (Subsystem::Socket, SOCKET_FACTORY, "open", &[J, J, L, L, I, L, L], V),
            CallbackKind::SocketWrite => (Subsystem::Socket, SOCKET_FACTORY, "write", &[J, J, L], V),
            CallbackKind::SocketCompletedReceive => {
                (Subsystem::Socket, SOCKET_FACTORY, "completedReceive", &[J, J, J], V)
            }
            CallbackKind::SocketRequestClose => {
                (Subsystem::Socket, SOCKET_FACTORY, "requestClose", &[J, J, I, L], V)
            }
            CallbackKind::SocketClose => (Subsystem::Socket, SOCKET_FACTORY, "close", &[J, J], V),
            CallbackKind::SocketDispose => (Subsystem::Socket, SOCKET_FACTORY, "dispose", &[J, J], V),
            CallbackKind::HttpAuth => (Subsystem::Listener, LISTENER_BRIDGE, "authenticateHttp", &[J, L], Z),
            CallbackKind::CertAuth => (Subsystem::Listener, LISTENER_BRIDGE, "authenticateCertificate", &[J, L], Z),
            CallbackKind::Predict => (Subsystem::Prediction, PREDICTION_BRIDGE, "predict", &[J, J, J], L),
            CallbackKind::PeerDiscovered => (Subsystem::PeerSync, PEER_SYNC_BRIDGE, "peerDiscovered", &[J, L, Z], V),
            CallbackKind::PeerAuthenticate => {
                (Subsystem::PeerSync, PEER_SYNC_BRIDGE, "authenticatePeer", &[J, L, L], Z)
            }
        };
        EntryPoint {
            subsystem,
            class,
            method,
            sig: MethodSig::new(params, ret),
        }
    }
}

/// Managed classes the bridge instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Exception = 0,
    ReplicatorStatus,
    DocumentEnded,
    ByteArray,
}

/// A value class and, if the bridge constructs it, its constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub subsystem: Subsystem,
    pub class: &'static str,
    pub ctor: Option<MethodSig>,
}

impl ValueClass {
    pub const COUNT: usize = 4;

    pub const ALL: [ValueClass; ValueClass::COUNT] = [
        ValueClass::Exception,
        ValueClass::ReplicatorStatus,
        ValueClass::DocumentEnded,
        ValueClass::ByteArray,
    ];

    pub fn descriptor(&self) -> ClassDescriptor {
        match self {
            // (domain, code, info, message)
            ValueClass::Exception => ClassDescriptor {
                subsystem: Subsystem::Exceptions,
                class: "LiteBridge.LiteCoreException",
                ctor: Some(MethodSig::new(&[I, I, I, L], V)),
            },
            // (activity, completed, total, docCount, domain, code, info, flags)
            ValueClass::ReplicatorStatus => ClassDescriptor {
                subsystem: Subsystem::Replicator,
                class: "LiteBridge.Interop.ReplicatorStatus",
                ctor: Some(MethodSig::new(&[I, J, J, J, I, I, I, I], V)),
            },
            // (scope, collection, docId, revId, flags, domain, code, info, transient)
            ValueClass::DocumentEnded => ClassDescriptor {
                subsystem: Subsystem::Replicator,
                class: "LiteBridge.Interop.DocumentEnded",
                ctor: Some(MethodSig::new(&[L, L, L, L, I, I, I, I, Z], V)),
            },
            ValueClass::ByteArray => ClassDescriptor {
                subsystem: Subsystem::Listener,
                class: "System.Byte[]",
                ctor: None,
            },
        }
    }
}

/// A resolved callback target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMethod {
    pub class: ClassId,
    pub method: MethodId,
    pub sig: MethodSig,
}

/// A resolved value class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedClass {
    pub class: ClassId,
    pub ctor: Option<MethodId>,
}

/// Resolution in progress; committed one subsystem at a time
#[derive(Default)]
pub struct SymbolBuilder {
    methods: [Option<ResolvedMethod>; CallbackKind::COUNT],
    classes: [Option<ResolvedClass>; ValueClass::COUNT],
    class_cache: HashMap<&'static str, ClassId>,
    done: Vec<Subsystem>,
}

impl SymbolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every symbol belonging to `subsystem`.
    ///
    /// Either all of them are committed or none are.
    pub fn resolve_subsystem<R: ManagedRuntime + ?Sized>(&mut self, runtime: &R, subsystem: Subsystem) -> Result<()> {
        let mut methods = Vec::new();
        let mut classes = Vec::new();
        let mut new_classes = Vec::new();

        for vc in ValueClass::ALL {
            let desc = vc.descriptor();
            if desc.subsystem != subsystem {
                continue;
            }
            let class = self.class(runtime, subsystem, desc.class, &mut new_classes)?;
            let ctor = match desc.ctor {
                Some(sig) => Some(runtime.resolve_method(class, "<init>", &sig, false).ok_or_else(|| {
                    BridgeError::SymbolMissing {
                        subsystem,
                        symbol: format!("{}.<init>", desc.class),
                    }
                })?),
                None => None,
            };
            classes.push((vc, ResolvedClass { class, ctor }));
        }

        for kind in CallbackKind::ALL {
            let entry = kind.entry();
            if entry.subsystem != subsystem {
                continue;
            }
            let class = self.class(runtime, subsystem, entry.class, &mut new_classes)?;
            let method = runtime
                .resolve_method(class, entry.method, &entry.sig, true)
                .ok_or_else(|| BridgeError::SymbolMissing {
                    subsystem,
                    symbol: format!("{}.{}", entry.class, entry.method),
                })?;
            methods.push((
                kind,
                ResolvedMethod {
                    class,
                    method,
                    sig: entry.sig,
                },
            ));
        }

        for (name, id) in new_classes {
            self.class_cache.insert(name, id);
        }
        for (kind, m) in methods {
            self.methods[kind as usize] = Some(m);
        }
        for (vc, c) in classes {
            self.classes[vc as usize] = Some(c);
        }
        self.done.push(subsystem);
        crate::log_debug!("resolved managed symbols for {:?}", subsystem);
        Ok(())
    }

    fn class<R: ManagedRuntime + ?Sized>(
        &self,
        runtime: &R,
        subsystem: Subsystem,
        name: &'static str,
        pending: &mut Vec<(&'static str, ClassId)>,
    ) -> Result<ClassId> {
        if let Some(id) = self.class_cache.get(name) {
            return Ok(*id);
        }
        if let Some((_, id)) = pending.iter().find(|(n, _)| *n == name) {
            return Ok(*id);
        }
        let id = runtime.resolve_class(name).ok_or_else(|| BridgeError::SymbolMissing {
            subsystem,
            symbol: name.to_string(),
        })?;
        pending.push((name, id));
        Ok(id)
    }

    pub fn resolved(&self) -> &[Subsystem] {
        &self.done
    }

    /// Freeze the table; every declared kind and class must be present
    pub fn finish(self) -> Result<Symbols> {
        let mut methods = Vec::with_capacity(CallbackKind::COUNT);
        for kind in CallbackKind::ALL {
            let m = self.methods[kind as usize].ok_or_else(|| BridgeError::SymbolMissing {
                subsystem: kind.entry().subsystem,
                symbol: format!("{:?}", kind),
            })?;
            methods.push(m);
        }
        let mut classes = Vec::with_capacity(ValueClass::COUNT);
        for vc in ValueClass::ALL {
            let c = self.classes[vc as usize].ok_or_else(|| BridgeError::SymbolMissing {
                subsystem: vc.descriptor().subsystem,
                symbol: vc.descriptor().class.to_string(),
            })?;
            classes.push(c);
        }
        Ok(Symbols {
            methods: methods.into_boxed_slice(),
            classes: classes.into_boxed_slice(),
        })
    }
}

/// The immutable, fully resolved symbol table
#[derive(Debug)]
pub struct Symbols {
    methods: Box<[ResolvedMethod]>,
    classes: Box<[ResolvedClass]>,
}

impl Symbols {
    /// Resolve every subsystem in load order
    pub fn resolve<R: ManagedRuntime + ?Sized>(runtime: &R) -> Result<Symbols> {
        let mut builder = SymbolBuilder::new();
        for subsystem in Subsystem::INIT_ORDER {
            builder.resolve_subsystem(runtime, subsystem)?;
        }
        builder.finish()
    }

    #[inline]
    pub fn method(&self, kind: CallbackKind) -> &ResolvedMethod {
        &self.methods[kind as usize]
    }

    #[inline]
    pub fn class(&self, class: ValueClass) -> &ResolvedClass {
        &self.classes[class as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in CallbackKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
        for (i, vc) in ValueClass::ALL.iter().enumerate() {
            assert_eq!(*vc as usize, i);
        }
    }

    #[test]
    fn test_every_kind_belongs_to_an_initialized_subsystem() {
        for kind in CallbackKind::ALL {
            assert!(Subsystem::INIT_ORDER.contains(&kind.entry().subsystem), "{:?}", kind);
        }
        for vc in ValueClass::ALL {
            assert!(Subsystem::INIT_ORDER.contains(&vc.descriptor().subsystem), "{:?}", vc);
        }
    }

    #[test]
    fn test_exceptions_resolve_first() {
        assert_eq!(Subsystem::INIT_ORDER[0], Subsystem::Exceptions);
        assert_eq!(ValueClass::Exception.descriptor().subsystem, Subsystem::Exceptions);
    }

    #[test]
    fn test_context_is_first_argument() {
        // Log is the one source with no registration and hence no context
        for kind in CallbackKind::ALL {
            let sig = kind.entry().sig;
            if kind == CallbackKind::Log {
                assert_eq!(sig.params, &[ArgKind::Object, ArgKind::Int, ArgKind::Object]);
            } else {
                assert_eq!(sig.params[0], ArgKind::Long, "{:?}", kind);
            }
        }
    }

    #[test]
    fn test_entry_points_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for kind in CallbackKind::ALL {
            let e = kind.entry();
            assert!(seen.insert((e.class, e.method)), "duplicate entry for {:?}", kind);
        }
    }
}
