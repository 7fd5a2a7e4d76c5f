//! Native error triples to managed exceptions

use crate::engine::RawSlice;
use crate::error::{BridgeError, NativeError};
use crate::marshal;
use crate::runtime::{ManagedRuntime, Value};
use crate::symbols::ValueClass;
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    /// Throw a managed exception carrying `error` and an optional message.
    ///
    /// Does nothing if an exception is already pending on this thread.
    /// `message` is borrowed; callers that fetched an engine-formatted
    /// message own and free that buffer themselves.
    pub fn translate(&self, error: NativeError, message: Option<&str>) {
        if !error.is_error() {
            crate::log_warn!("refusing to throw for a non-error triple ({})", error);
            return;
        }
        if self.runtime.exception_pending() {
            crate::log_debug!("exception already pending; dropping {}", error);
            return;
        }

        let class = self.symbols.class(ValueClass::Exception);
        let ctor = match class.ctor {
            Some(ctor) => ctor,
            None => return,
        };
        let msg = match message.map(|m| marshal::str_to_managed(&self.runtime, m)) {
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                crate::log_warn!("exception message dropped: {}", e);
                None
            }
            None => None,
        };
        let exception = self.runtime.new_object(
            class.class,
            ctor,
            &[
                Value::Int(error.domain),
                Value::Int(error.code),
                Value::Int(error.internal_info),
                Value::Object(msg),
            ],
        );
        if let Some(m) = msg {
            self.runtime.delete_local_ref(m);
        }

        match exception {
            Some(ex) => {
                if !self.runtime.throw(ex) {
                    crate::logging::fallback("litebridge::translate", &format!("runtime refused to throw {}", error));
                }
                self.runtime.delete_local_ref(ex);
            }
            None => {
                // constructing the exception may itself have raised one
                if !self.runtime.exception_pending() {
                    crate::logging::fallback(
                        "litebridge::translate",
                        &format!("could not construct exception for {}", error),
                    );
                }
            }
        }
    }

    /// Throw for an engine failure, using the engine's own description
    pub fn throw_native(&self, error: NativeError) {
        if !error.is_error() || self.runtime.exception_pending() {
            return;
        }
        let raw: RawSlice = self.engine().error_message(error);
        let message = self.handles.adopt_slice(raw).into_vec().ok().and_then(|bytes| {
            if bytes.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
        });
        self.translate(error, message.as_deref());
    }

    /// Throw for any bridge failure
    pub fn throw_error(&self, error: &BridgeError) {
        match error {
            BridgeError::Native(native) => self.throw_native(*native),
            // the pending one stays in charge
            BridgeError::PendingException => {}
            other => self.translate(other.as_native(), Some(&other.to_string())),
        }
    }
}
