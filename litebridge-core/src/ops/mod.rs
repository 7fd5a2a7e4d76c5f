//! Downward calls: managed code driving the engine
//!
//! Every operation here is synchronous and runs on a thread the managed
//! runtime already owns. Arguments arrive as managed handles (`i64`), local
//! references and primitives; results leave the same way. A failure is thrown
//! as a managed exception on the calling thread and the operation returns a
//! neutral value (0, `false`, null) that the managed side must ignore.
//!
//! Handles returned from here carry the release obligation to the managed
//! side. Handles passed in are borrowed for the call unless the operation
//! says it consumes them.

mod blob;
mod collection;
mod listener;
mod query;
mod replication;
mod socket;
mod values;

pub use blob::MAX_READ_CHUNK;
pub use values::engine_log_level;

use crate::engine::{CreateRequest, RawSlice};
use crate::error::{BridgeError, Result};
use crate::handle::{Kind, NativeHandle, ObjectKind};
use crate::marshal;
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    /// Run `f`; on failure throw and return the neutral value
    pub(crate) fn guarded<T: Default>(&self, op: &str, f: impl FnOnce() -> Result<T>) -> T {
        match f() {
            Ok(v) => v,
            Err(e) => {
                crate::log_debug!("{} failed: {}", op, e);
                self.throw_error(&e);
                T::default()
            }
        }
    }

    /// Create an object and hand it to managed code; absent becomes 0
    pub(crate) fn create_raw<K: Kind>(&self, request: &CreateRequest<'_>) -> Result<i64> {
        Ok(self
            .handles
            .create::<K>(request)?
            .map(|owned| owned.into_raw().to_managed())
            .unwrap_or(0))
    }

    /// Decode a parent object the bridge does not track (databases and the
    /// like, owned by the managed wrapper that passed them)
    pub(crate) fn parent(&self, raw: i64, what: &str) -> Result<NativeHandle> {
        let handle = NativeHandle::from_managed(raw);
        if handle.is_null() {
            return Err(BridgeError::Marshal(format!("{} handle must not be 0", what)));
        }
        Ok(handle)
    }

    pub(crate) fn arg_string(&self, string: Option<LocalRef>, what: &str) -> Result<String> {
        marshal::required_string(&self.runtime, string, what)
    }

    pub(crate) fn arg_bytes(&self, array: Option<LocalRef>) -> Result<Vec<u8>> {
        Ok(marshal::from_managed_bytes(&self.runtime, array)?.unwrap_or_default())
    }

    /// Copy an engine-owned result into a managed string and free it
    pub(crate) fn slice_to_string(&self, raw: RawSlice) -> Result<Option<LocalRef>> {
        let slice = self.handles.adopt_slice(raw);
        if slice.is_null() {
            return Ok(None);
        }
        let string = marshal::to_managed_string(&self.runtime, Some(slice.bytes()?));
        drop(slice);
        string
    }

    /// Copy an engine-owned result into a managed byte array and free it
    pub(crate) fn slice_to_bytes(&self, raw: RawSlice) -> Result<Option<LocalRef>> {
        let slice = self.handles.adopt_slice(raw);
        if slice.is_null() {
            return Ok(None);
        }
        let bytes = marshal::to_managed_bytes(&self.runtime, Some(slice.bytes()?));
        drop(slice);
        bytes
    }

    /// Release any handle through the kind table.
    ///
    /// The handle is consumed: the managed side must not pass it again.
    pub fn release(&self, kind: i32, handle: i64) {
        self.guarded("release", || {
            let kind = ObjectKind::from_raw(kind).ok_or_else(|| BridgeError::Marshal(format!("unknown kind {}", kind)))?;
            if kind == ObjectKind::SliceResult {
                return Err(BridgeError::Marshal(
                    "slice results are released with their size".into(),
                ));
            }
            self.handles.release_raw(kind, NativeHandle::from_managed(handle))
        })
    }

    /// Copy of a slice result still held by managed code
    pub fn slice_result_bytes(&self, buf: i64, size: i64) -> Option<LocalRef> {
        self.guarded("slice_result_bytes", || {
            let raw = raw_slice(buf, size)?;
            let bytes = self.handles.view_slice(raw)?;
            marshal::to_managed_bytes(&self.runtime, Some(bytes))
        })
    }

    /// Free a slice result held by managed code. Afterwards the value is
    /// unbound; a second release is reported, not repeated.
    pub fn slice_result_release(&self, buf: i64, size: i64) {
        self.guarded("slice_result_release", || {
            let raw = raw_slice(buf, size)?;
            self.handles.reclaim_slice(raw)?.release()
        })
    }
}

fn raw_slice(buf: i64, size: i64) -> Result<RawSlice> {
    let size = usize::try_from(size).map_err(|_| BridgeError::Marshal(format!("negative slice size {}", size)))?;
    Ok(RawSlice {
        buf: NativeHandle::from_managed(buf).as_ptr::<u8>() as *const u8,
        size,
    })
}

#[cfg(test)]
mod tests {
    use crate::runtime::ManagedRuntime;
    use std::sync::Arc;

    use crate::config::BridgeConfig;
    use crate::engine::Engine;
    use crate::error::litecore_code;
    use crate::handle::ObjectKind;
    use crate::testing::{FakeEngine, FakeRuntime};
    use crate::Bridge;

    fn bridge() -> (Bridge<FakeRuntime>, Arc<FakeEngine>) {
        let engine = Arc::new(FakeEngine::new());
        let config = BridgeConfig {
            poison_handles: true,
            ..BridgeConfig::default()
        };
        let bridge = Bridge::init(FakeRuntime::new(), engine.clone(), config).unwrap();
        bridge.runtime().attach_current_thread("test");
        (bridge, engine)
    }

    #[test]
    fn test_release_unknown_kind_throws() {
        let (bridge, _) = bridge();
        bridge.release(99, 0x1000);
        let thrown = bridge.runtime().take_thrown();
        assert_eq!(thrown.len(), 1);
        assert_eq!(thrown[0].code, litecore_code::INVALID_PARAMETER);
    }

    #[test]
    fn test_release_null_is_a_no_op() {
        let (bridge, _) = bridge();
        bridge.release(ObjectKind::Document as i32, 0);
        assert!(bridge.runtime().take_thrown().is_empty());
    }

    #[test]
    fn test_slice_result_lifecycle() {
        let (bridge, engine) = bridge();
        let raw = bridge.handles().adopt_slice(engine.alloc_slice(b"fleece")).into_raw();
        let (buf, size) = (raw.buf as usize as i64, raw.size as i64);

        let copy = bridge.slice_result_bytes(buf, size).unwrap();
        assert_eq!(bridge.runtime().bytes_value(copy), Some(b"fleece".to_vec()));

        bridge.slice_result_release(buf, size);
        assert_eq!(engine.slices_freed(), 1);
        assert!(bridge.runtime().take_thrown().is_empty());

        // unbound now: both calls are reported, nothing is freed twice
        assert!(bridge.slice_result_bytes(buf, size).is_none());
        bridge.slice_result_release(buf, size);
        assert_eq!(bridge.runtime().take_thrown().len(), 1);
        assert_eq!(engine.slices_freed(), 1);
        assert_eq!(engine.over_released(), 0);
    }
}
