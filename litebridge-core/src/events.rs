//! Event payloads delivered by the engine
//!
//! These are safe views built by the engine binding from the engine's raw
//! callback arguments. Borrowed fields are valid only for the duration of
//! the callback that carries them.

use crate::error::NativeError;
use crate::handle::NativeHandle;

/// Correlation token supplied by the managed side at registration and
/// passed back unchanged on every invocation. Never interpreted natively.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallbackContext(pub i64);

impl CallbackContext {
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        CallbackContext(ptr as usize as i64)
    }

    pub fn as_ptr<T>(&self) -> *mut T {
        self.0 as usize as *mut T
    }
}

/// Replicator activity levels
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Stopped = 0,
    Offline = 1,
    Connecting = 2,
    Idle = 3,
    Busy = 4,
    Stopping = 5,
}

impl ActivityLevel {
    pub fn from_raw(raw: i32) -> Option<ActivityLevel> {
        match raw {
            0 => Some(ActivityLevel::Stopped),
            1 => Some(ActivityLevel::Offline),
            2 => Some(ActivityLevel::Connecting),
            3 => Some(ActivityLevel::Idle),
            4 => Some(ActivityLevel::Busy),
            5 => Some(ActivityLevel::Stopping),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub units_completed: u64,
    pub units_total: u64,
    pub document_count: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicatorStatus {
    pub level: i32,
    pub progress: Progress,
    pub error: NativeError,
    pub flags: i32,
}

impl ReplicatorStatus {
    pub fn stopped() -> Self {
        Self {
            level: ActivityLevel::Stopped as i32,
            progress: Progress::default(),
            error: NativeError::NONE,
            flags: 0,
        }
    }
}

/// Per-document replication outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentEnded<'a> {
    pub scope: &'a [u8],
    pub collection: &'a [u8],
    pub doc_id: &'a [u8],
    pub rev_id: &'a [u8],
    pub flags: i32,
    pub error: NativeError,
    pub error_is_transient: bool,
}

/// A document offered to a push or pull filter
#[derive(Debug, Clone, Copy)]
pub struct FilterRequest<'a> {
    pub context: CallbackContext,
    pub pushing: bool,
    pub scope: &'a [u8],
    pub collection: &'a [u8],
    pub doc_id: &'a [u8],
    pub rev_id: &'a [u8],
    pub flags: i32,
    /// Document body, borrowed for the call
    pub body: NativeHandle,
}

/// A connection request from the engine's socket factory
#[derive(Debug, Clone, Copy)]
pub struct SocketOpen<'a> {
    pub context: CallbackContext,
    pub socket: NativeHandle,
    pub scheme: &'a [u8],
    pub host: &'a [u8],
    pub port: u16,
    pub path: &'a [u8],
    /// Encoded connection options
    pub options: &'a [u8],
}
