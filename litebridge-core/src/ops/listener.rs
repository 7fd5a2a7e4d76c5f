//! Listener and indexes

use crate::engine::CreateRequest;
use crate::error::BridgeError;
use crate::events::CallbackContext;
use crate::handle::{kinds, NativeHandle};
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    /// Start a listener; authentication callbacks carry `context`
    pub fn listener_start(&self, db: i64, config: Option<LocalRef>, context: i64) -> i64 {
        self.guarded("listener_start", || {
            let db = self.parent(db, "database")?;
            let config = self.arg_bytes(config)?;
            self.create_raw::<kinds::Listener>(&CreateRequest::Listener {
                db,
                config: &config,
                context: CallbackContext(context),
            })
        })
    }

    pub fn listener_port(&self, listener: i64) -> i32 {
        self.guarded("listener_port", || {
            let listener = self.handles.borrow::<kinds::Listener>(NativeHandle::from_managed(listener))?;
            Ok(self.engine().listener_port(listener.handle()) as i32)
        })
    }

    /// Index by name, or 0 if there is none
    pub fn index_get(&self, collection: i64, name: Option<LocalRef>) -> i64 {
        self.guarded("index_get", || {
            let collection = self.handles.borrow::<kinds::Collection>(NativeHandle::from_managed(collection))?;
            let name = self.arg_string(name, "index name")?;
            self.create_raw::<kinds::Index>(&CreateRequest::Index {
                collection: collection.handle(),
                name: &name,
            })
        })
    }

    /// Updater for at most `limit` pending entries; 0 when the index is up
    /// to date
    pub fn index_begin_update(&self, index: i64, limit: i64) -> i64 {
        self.guarded("index_begin_update", || {
            let index = self.handles.borrow::<kinds::Index>(NativeHandle::from_managed(index))?;
            let limit = u64::try_from(limit).map_err(|_| BridgeError::Marshal(format!("negative limit {}", limit)))?;
            self.create_raw::<kinds::IndexUpdater>(&CreateRequest::IndexUpdater {
                index: index.handle(),
                limit,
            })
        })
    }

    pub fn index_updater_count(&self, updater: i64) -> i64 {
        self.guarded("index_updater_count", || {
            let updater = self.handles.borrow::<kinds::IndexUpdater>(NativeHandle::from_managed(updater))?;
            Ok(self.engine().index_updater_count(updater.handle()) as i64)
        })
    }
}
