//! Replicators

use crate::engine::CreateRequest;
use crate::events::CallbackContext;
use crate::handle::{kinds, NativeHandle};
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    /// New replicator. Status changes, document batches and filters are
    /// delivered with `context`.
    pub fn replicator_new(&self, db: i64, options: Option<LocalRef>, context: i64) -> i64 {
        self.guarded("replicator_new", || {
            let db = self.parent(db, "database")?;
            let options = self.arg_bytes(options)?;
            self.create_raw::<kinds::Replicator>(&CreateRequest::Replicator {
                db,
                options: &options,
                context: CallbackContext(context),
            })
        })
    }

    pub fn replicator_start(&self, replicator: i64, reset: bool) {
        self.guarded("replicator_start", || {
            let repl = self.handles.borrow::<kinds::Replicator>(NativeHandle::from_managed(replicator))?;
            self.engine().replicator_start(repl.handle(), reset);
            Ok(())
        })
    }

    pub fn replicator_stop(&self, replicator: i64) {
        self.guarded("replicator_stop", || {
            let repl = self.handles.borrow::<kinds::Replicator>(NativeHandle::from_managed(replicator))?;
            self.engine().replicator_stop(repl.handle());
            Ok(())
        })
    }

    /// Current status as a managed `ReplicatorStatus`
    pub fn replicator_status(&self, replicator: i64) -> Option<LocalRef> {
        self.guarded("replicator_status", || {
            let repl = self.handles.borrow::<kinds::Replicator>(NativeHandle::from_managed(replicator))?;
            let status = self.engine().replicator_status(repl.handle());
            self.new_status_object(&status).map(Some)
        })
    }
}
