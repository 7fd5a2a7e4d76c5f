//! LiteBridge C FFI Layer for C# Integration
//!
//! This crate adapts the bridge core to a C ABI consumed by C# via P/Invoke:
//! the host runtime and the native engine are supplied as function tables,
//! engine callbacks land in the `litebridge_on_*` trampolines, and managed
//! code calls the `litebridge_*` operations. The csbindgen build script
//! generates the C# NativeMethods.g.cs file.

mod callbacks;
mod engine_vtable;
mod error;
mod exports;
mod global;
mod logging;
mod memory;
mod vtable;

// Re-export all public FFI functions
pub use callbacks::*;
pub use engine_vtable::*;
pub use error::*;
pub use exports::*;
pub use global::*;
pub use logging::*;
pub use memory::*;
pub use vtable::*;
