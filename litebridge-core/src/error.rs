//! Error types for the bridge
//!
//! Two families live here: the engine's own `(domain, code, info)` triple,
//! and `BridgeError` for failures that originate on the Rust side of the
//! boundary.

use std::fmt;

use thiserror::Error;

use crate::handle::{NativeHandle, ObjectKind};
use crate::symbols::Subsystem;

/// Error domains used by the native engine
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    LiteCore = 1,
    Posix = 2,
    Sqlite = 3,
    Fleece = 4,
    Network = 5,
    WebSocket = 6,
    MbedTls = 7,
}

impl ErrorDomain {
    pub fn from_raw(raw: i32) -> Option<ErrorDomain> {
        match raw {
            1 => Some(ErrorDomain::LiteCore),
            2 => Some(ErrorDomain::Posix),
            3 => Some(ErrorDomain::Sqlite),
            4 => Some(ErrorDomain::Fleece),
            5 => Some(ErrorDomain::Network),
            6 => Some(ErrorDomain::WebSocket),
            7 => Some(ErrorDomain::MbedTls),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorDomain::LiteCore => "LiteCore",
            ErrorDomain::Posix => "POSIX",
            ErrorDomain::Sqlite => "SQLite",
            ErrorDomain::Fleece => "Fleece",
            ErrorDomain::Network => "Network",
            ErrorDomain::WebSocket => "WebSocket",
            ErrorDomain::MbedTls => "MbedTLS",
        }
    }
}

/// LiteCore-domain codes the bridge produces or inspects
pub mod litecore_code {
    pub const NOT_FOUND: i32 = 7;
    pub const INVALID_PARAMETER: i32 = 9;
    pub const UNEXPECTED_ERROR: i32 = 10;
}

/// The engine's three-field error representation
///
/// `code == 0` means "no error"; such a value must never be translated into
/// a managed exception.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct NativeError {
    pub domain: i32,
    pub code: i32,
    pub internal_info: i32,
}

impl NativeError {
    pub const NONE: NativeError = NativeError {
        domain: 0,
        code: 0,
        internal_info: 0,
    };

    pub const fn new(domain: i32, code: i32, internal_info: i32) -> Self {
        Self {
            domain,
            code,
            internal_info,
        }
    }

    pub const fn litecore(code: i32) -> Self {
        Self::new(ErrorDomain::LiteCore as i32, code, 0)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.code != 0
    }

    /// Engine "not found" in the LiteCore domain
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.domain == ErrorDomain::LiteCore as i32 && self.code == litecore_code::NOT_FOUND
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ErrorDomain::from_raw(self.domain) {
            Some(d) => write!(f, "{}/{}", d.as_str(), self.code)?,
            None => write!(f, "domain {}/{}", self.domain, self.code)?,
        }
        if self.internal_info != 0 {
            write!(f, " (info {})", self.internal_info)?;
        }
        Ok(())
    }
}

/// Failures raised by the bridge itself
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{subsystem:?}: managed symbol '{symbol}' could not be resolved")]
    SymbolMissing { subsystem: Subsystem, symbol: String },

    #[error("bridge is already initialized")]
    AlreadyInitialized,

    #[error("bridge is not initialized")]
    NotInitialized,

    #[error("native error {0}")]
    Native(NativeError),

    #[error("invalid {kind:?} handle {handle}")]
    InvalidHandle { kind: ObjectKind, handle: NativeHandle },

    #[error("{kind:?} handle {handle} used after release")]
    UseAfterRelease { kind: ObjectKind, handle: NativeHandle },

    #[error("handle {handle} is a {actual:?}, expected {expected:?}")]
    KindMismatch {
        handle: NativeHandle,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("slice result already released")]
    Unbound,

    #[error("marshaling failed: {0}")]
    Marshal(String),

    #[error("could not attach thread '{0}' to the managed runtime")]
    AttachFailed(String),

    #[error("a managed exception is already pending")]
    PendingException,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Triple used when a bridge-side failure has to surface as a managed
    /// exception.
    pub fn as_native(&self) -> NativeError {
        match self {
            BridgeError::Native(err) => *err,
            BridgeError::AttachFailed(_)
            | BridgeError::NotInitialized
            | BridgeError::AlreadyInitialized
            | BridgeError::SymbolMissing { .. } => NativeError::litecore(litecore_code::UNEXPECTED_ERROR),
            _ => NativeError::litecore(litecore_code::INVALID_PARAMETER),
        }
    }
}

impl From<NativeError> for BridgeError {
    fn from(err: NativeError) -> Self {
        BridgeError::Native(err)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_code_is_not_an_error() {
        assert!(!NativeError::NONE.is_error());
        assert!(!NativeError::new(1, 0, 42).is_error());
        assert!(NativeError::new(1, 404, 0).is_error());
    }

    #[test]
    fn test_not_found_only_in_litecore_domain() {
        assert!(NativeError::litecore(litecore_code::NOT_FOUND).is_not_found());
        assert!(!NativeError::new(ErrorDomain::Posix as i32, 7, 0).is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(NativeError::new(6, 1001, 0).to_string(), "WebSocket/1001");
        assert_eq!(NativeError::new(99, 3, 5).to_string(), "domain 99/3 (info 5)");
    }

    #[test]
    fn test_bridge_errors_map_to_invalid_parameter() {
        let err = BridgeError::Unbound;
        assert_eq!(err.as_native(), NativeError::litecore(litecore_code::INVALID_PARAMETER));
        let err = BridgeError::Native(NativeError::new(2, 13, 0));
        assert_eq!(err.as_native(), NativeError::new(2, 13, 0));
    }
}
