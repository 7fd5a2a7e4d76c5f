//! Queries and query observers

use crate::engine::{CreateRequest, QueryLanguage};
use crate::error::BridgeError;
use crate::events::CallbackContext;
use crate::handle::{kinds, NativeHandle};
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    pub fn query_new(&self, db: i64, language: i32, expression: Option<LocalRef>) -> i64 {
        self.guarded("query_new", || {
            let db = self.parent(db, "database")?;
            let language = QueryLanguage::from_raw(language)
                .ok_or_else(|| BridgeError::Marshal(format!("unknown query language {}", language)))?;
            let expression = self.arg_string(expression, "query expression")?;
            self.create_raw::<kinds::Query>(&CreateRequest::Query {
                db,
                language,
                expression: &expression,
            })
        })
    }

    /// Run with encoded parameters (null for none)
    pub fn query_run(&self, query: i64, params: Option<LocalRef>) -> i64 {
        self.guarded("query_run", || {
            let query = self.handles.borrow::<kinds::Query>(NativeHandle::from_managed(query))?;
            let params = self.arg_bytes(params)?;
            self.create_raw::<kinds::QueryEnumerator>(&CreateRequest::QueryEnumerator {
                query: query.handle(),
                params: &params,
            })
        })
    }

    pub fn query_explain(&self, query: i64) -> Option<LocalRef> {
        self.guarded("query_explain", || {
            let query = self.handles.borrow::<kinds::Query>(NativeHandle::from_managed(query))?;
            self.slice_to_string(self.engine().query_explain(query.handle()))
        })
    }

    /// Observer delivering `QueryChanged` with `context`. Created disabled.
    pub fn query_observer_new(&self, query: i64, context: i64) -> i64 {
        self.guarded("query_observer_new", || {
            let query = self.handles.borrow::<kinds::Query>(NativeHandle::from_managed(query))?;
            self.create_raw::<kinds::QueryObserver>(&CreateRequest::QueryObserver {
                query: query.handle(),
                context: CallbackContext(context),
            })
        })
    }

    pub fn query_observer_enable(&self, observer: i64, enabled: bool) {
        self.guarded("query_observer_enable", || {
            let observer = self.handles.borrow::<kinds::QueryObserver>(NativeHandle::from_managed(observer))?;
            self.engine().query_observer_enable(observer.handle(), enabled);
            Ok(())
        })
    }

    /// Latest results, or 0 if there are none yet. With `forget`, the
    /// observer drops its own reference to them.
    pub fn query_observer_get_enumerator(&self, observer: i64, forget: bool) -> i64 {
        self.guarded("query_observer_get_enumerator", || {
            let observer = self.handles.borrow::<kinds::QueryObserver>(NativeHandle::from_managed(observer))?;
            self.create_raw::<kinds::QueryEnumerator>(&CreateRequest::ObserverEnumerator {
                observer: observer.handle(),
                forget,
            })
        })
    }
}
