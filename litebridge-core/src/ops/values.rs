//! Key pairs, encoders, predictive models and engine logging

use crate::engine::{CreateRequest, RawSlice};
use crate::error::BridgeError;
use crate::events::CallbackContext;
use crate::handle::{kinds, NativeHandle};
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

/// Engine log levels, passed through verbatim
pub mod engine_log_level {
    pub const DEBUG: i32 = 0;
    pub const VERBOSE: i32 = 1;
    pub const INFO: i32 = 2;
    pub const WARNING: i32 = 3;
    pub const ERROR: i32 = 4;
    pub const NONE: i32 = 5;
}

impl<R: ManagedRuntime> Bridge<R> {
    pub fn key_pair_generate(&self, algorithm: i32, key_bits: i32, persistent: bool, label: Option<LocalRef>) -> i64 {
        self.guarded("key_pair_generate", || {
            let key_bits =
                u32::try_from(key_bits).map_err(|_| BridgeError::Marshal(format!("invalid key size {}", key_bits)))?;
            let label = self.arg_string(label, "label")?;
            self.create_raw::<kinds::KeyPair>(&CreateRequest::KeyPair {
                algorithm,
                key_bits,
                persistent,
                label: &label,
            })
        })
    }

    pub fn key_pair_public_key_data(&self, key_pair: i64) -> Option<LocalRef> {
        self.guarded("key_pair_public_key_data", || {
            let key_pair = self.handles.borrow::<kinds::KeyPair>(NativeHandle::from_managed(key_pair))?;
            let raw = self.engine().key_pair_public_key_data(key_pair.handle())?;
            self.slice_to_bytes(raw)
        })
    }

    pub fn encoder_new(&self) -> i64 {
        self.guarded("encoder_new", || self.create_raw::<kinds::Encoder>(&CreateRequest::Encoder))
    }

    pub fn encoder_write_string(&self, encoder: i64, value: Option<LocalRef>) -> bool {
        self.guarded("encoder_write_string", || {
            let encoder = self.handles.borrow::<kinds::Encoder>(NativeHandle::from_managed(encoder))?;
            let value = self.arg_string(value, "value")?;
            Ok(self.engine().encoder_write_string(encoder.handle(), &value))
        })
    }

    /// Finish encoding. The result is a slice result: the managed side
    /// reads it with `slice_result_bytes` and frees it with
    /// `slice_result_release`.
    pub fn encoder_finish(&self, encoder: i64) -> RawSlice {
        self.guarded("encoder_finish", || {
            let encoder = self.handles.borrow::<kinds::Encoder>(NativeHandle::from_managed(encoder))?;
            let raw = self.engine().encoder_finish(encoder.handle())?;
            Ok(self.handles.adopt_slice(raw).into_raw())
        })
    }

    /// Expose a managed model under `name`; false if the name is taken
    pub fn register_predictive_model(&self, name: Option<LocalRef>, context: i64) -> bool {
        self.guarded("register_predictive_model", || {
            let name = self.arg_string(name, "model name")?;
            Ok(self
                .engine()
                .register_predictive_model(&name, CallbackContext(context)))
        })
    }

    pub fn unregister_predictive_model(&self, name: Option<LocalRef>) {
        self.guarded("unregister_predictive_model", || {
            let name = self.arg_string(name, "model name")?;
            self.engine().unregister_predictive_model(&name);
            Ok(())
        })
    }

    /// Forward engine log lines at or above `level` to the managed sink
    pub fn set_engine_log_level(&self, level: i32, enabled: bool) {
        self.guarded("set_engine_log_level", || {
            if !(engine_log_level::DEBUG..=engine_log_level::NONE).contains(&level) {
                return Err(BridgeError::Marshal(format!("unknown engine log level {}", level)));
            }
            self.engine().set_log_callback(level, enabled);
            Ok(())
        })
    }
}
