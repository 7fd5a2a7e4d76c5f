//! Blob store, keys and streams

use crate::engine::CreateRequest;
use crate::error::BridgeError;
use crate::handle::{kinds, NativeHandle};
use crate::marshal;
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

/// Largest read a single `read_stream_read` call performs
pub const MAX_READ_CHUNK: usize = 64 * 1024;

impl<R: ManagedRuntime> Bridge<R> {
    /// The database's blob store. Borrowed from the database: releasing it
    /// does nothing.
    pub fn blob_store_get(&self, db: i64) -> i64 {
        self.guarded("blob_store_get", || {
            let db = self.parent(db, "database")?;
            self.create_raw::<kinds::BlobStore>(&CreateRequest::BlobStore { db })
        })
    }

    pub fn blob_key_from_string(&self, text: Option<LocalRef>) -> i64 {
        self.guarded("blob_key_from_string", || {
            let text = self.arg_string(text, "blob key")?;
            self.create_raw::<kinds::BlobKey>(&CreateRequest::BlobKey { text: &text })
        })
    }

    pub fn blob_key_to_string(&self, key: i64) -> Option<LocalRef> {
        self.guarded("blob_key_to_string", || {
            let key = self.handles.borrow::<kinds::BlobKey>(NativeHandle::from_managed(key))?;
            self.slice_to_string(self.engine().blob_key_to_string(key.handle()))
        })
    }

    pub fn read_stream_open(&self, store: i64, key: i64) -> i64 {
        self.guarded("read_stream_open", || {
            let store = self.handles.borrow::<kinds::BlobStore>(NativeHandle::from_managed(store))?;
            let key = self.handles.borrow::<kinds::BlobKey>(NativeHandle::from_managed(key))?;
            self.create_raw::<kinds::ReadStream>(&CreateRequest::ReadStream {
                store: store.handle(),
                key: key.handle(),
            })
        })
    }

    /// Up to `max` bytes, at most [`MAX_READ_CHUNK`] per call; an empty
    /// array at end of stream
    pub fn read_stream_read(&self, stream: i64, max: i32) -> Option<LocalRef> {
        self.guarded("read_stream_read", || {
            let stream = self.handles.borrow::<kinds::ReadStream>(NativeHandle::from_managed(stream))?;
            let max = usize::try_from(max).map_err(|_| BridgeError::Marshal(format!("negative read size {}", max)))?;
            let mut buf = vec![0u8; max.min(MAX_READ_CHUNK)];
            let n = self.engine().read_stream_read(stream.handle(), &mut buf)?;
            marshal::to_managed_bytes(&self.runtime, Some(&buf[..n]))
        })
    }

    pub fn write_stream_open(&self, store: i64) -> i64 {
        self.guarded("write_stream_open", || {
            let store = self.handles.borrow::<kinds::BlobStore>(NativeHandle::from_managed(store))?;
            self.create_raw::<kinds::WriteStream>(&CreateRequest::WriteStream { store: store.handle() })
        })
    }

    /// Append `data` without copying it: the engine reads straight from the
    /// pinned managed array.
    pub fn write_stream_write(&self, stream: i64, data: Option<LocalRef>) {
        self.guarded("write_stream_write", || {
            let stream = self.handles.borrow::<kinds::WriteStream>(NativeHandle::from_managed(stream))?;
            // the engine call happens under the pin; any throw waits until
            // after unpin
            let written = marshal::with_pinned(&self.runtime, data, self.config.critical_pinning, |bytes| {
                self.engine().write_stream_write(stream.handle(), bytes)
            })?;
            written.map_err(BridgeError::from)
        })
    }
}
