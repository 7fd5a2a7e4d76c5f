// litebridge-core/src/lib.rs
// Pure Rust bridge core - no FFI, no concrete runtime or engine

#[macro_use]
pub mod logging;

pub mod attach;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod ledger;
pub mod marshal;
pub mod runtime;
pub mod slice;
pub mod symbols;

mod ops;
mod translate;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Public exports
pub use attach::{AttachGuard, AttachmentState};
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use dispatch::LocalFrame;
pub use engine::{CreateRequest, Engine, QueryLanguage, RawOutcome, RawSlice};
pub use error::{BridgeError, ErrorDomain, NativeError, Result};
pub use events::{ActivityLevel, CallbackContext, DocumentEnded, FilterRequest, Progress, ReplicatorStatus, SocketOpen};
pub use handle::{kinds, Borrowed, HandleRegistry, NativeHandle, ObjectKind, Owned};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use ops::{engine_log_level, MAX_READ_CHUNK};
pub use runtime::{LocalRef, ManagedRuntime, Value};
pub use slice::SliceResult;
pub use symbols::{CallbackKind, Subsystem, Symbols};

/// Crate version, reported through the C ABI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
