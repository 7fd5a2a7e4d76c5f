//! Collections, documents, values and change observers

use crate::engine::CreateRequest;
use crate::events::CallbackContext;
use crate::handle::{kinds, NativeHandle};
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    /// Existing collection, or 0 if there is none
    pub fn collection_get(&self, db: i64, scope: Option<LocalRef>, name: Option<LocalRef>) -> i64 {
        self.guarded("collection_get", || {
            let db = self.parent(db, "database")?;
            let scope = self.arg_string(scope, "scope")?;
            let name = self.arg_string(name, "collection name")?;
            self.create_raw::<kinds::Collection>(&CreateRequest::Collection {
                db,
                scope: &scope,
                name: &name,
            })
        })
    }

    /// Collection, created if it does not exist
    pub fn collection_create(&self, db: i64, scope: Option<LocalRef>, name: Option<LocalRef>) -> i64 {
        self.guarded("collection_create", || {
            let db = self.parent(db, "database")?;
            let scope = self.arg_string(scope, "scope")?;
            let name = self.arg_string(name, "collection name")?;
            self.create_raw::<kinds::Collection>(&CreateRequest::CreateCollection {
                db,
                scope: &scope,
                name: &name,
            })
        })
    }

    /// Document by id. With `must_exist`, a missing document is 0 rather
    /// than an empty new document.
    pub fn document_get(&self, collection: i64, doc_id: Option<LocalRef>, must_exist: bool) -> i64 {
        self.guarded("document_get", || {
            let collection = self.handles.borrow::<kinds::Collection>(NativeHandle::from_managed(collection))?;
            let doc_id = self.arg_string(doc_id, "document id")?;
            self.create_raw::<kinds::Document>(&CreateRequest::Document {
                collection: collection.handle(),
                doc_id: &doc_id,
                must_exist,
            })
        })
    }

    /// Body of a document as a dict value; 0 for a deleted document
    pub fn document_properties(&self, document: i64) -> i64 {
        self.guarded("document_properties", || {
            let document = self.handles.borrow::<kinds::Document>(NativeHandle::from_managed(document))?;
            self.create_raw::<kinds::Dict>(&CreateRequest::DocumentProperties {
                document: document.handle(),
            })
        })
    }

    /// Array stored under `key`; 0 if the key is missing or not an array
    pub fn dict_get_array(&self, dict: i64, key: Option<LocalRef>) -> i64 {
        self.guarded("dict_get_array", || {
            let dict = self.handles.borrow::<kinds::Dict>(NativeHandle::from_managed(dict))?;
            let key = self.arg_string(key, "key")?;
            self.create_raw::<kinds::Array>(&CreateRequest::ArrayInDict {
                dict: dict.handle(),
                key: &key,
            })
        })
    }

    pub fn array_iterator_new(&self, array: i64) -> i64 {
        self.guarded("array_iterator_new", || {
            let array = self.handles.borrow::<kinds::Array>(NativeHandle::from_managed(array))?;
            self.create_raw::<kinds::ArrayIterator>(&CreateRequest::ArrayIterator { array: array.handle() })
        })
    }

    pub fn dict_iterator_new(&self, dict: i64) -> i64 {
        self.guarded("dict_iterator_new", || {
            let dict = self.handles.borrow::<kinds::Dict>(NativeHandle::from_managed(dict))?;
            self.create_raw::<kinds::DictIterator>(&CreateRequest::DictIterator { dict: dict.handle() })
        })
    }

    /// Advance; false once the iterator is past the last entry
    pub fn dict_iterator_next(&self, iterator: i64) -> bool {
        self.guarded("dict_iterator_next", || {
            let it = self.handles.borrow::<kinds::DictIterator>(NativeHandle::from_managed(iterator))?;
            Ok(self.engine().dict_iterator_next(it.handle()))
        })
    }

    /// Key at the current position; null past the end
    pub fn dict_iterator_key(&self, iterator: i64) -> Option<LocalRef> {
        self.guarded("dict_iterator_key", || {
            let it = self.handles.borrow::<kinds::DictIterator>(NativeHandle::from_managed(iterator))?;
            let key = self.engine().dict_iterator_key(it.handle());
            if key.is_null() {
                return Ok(None);
            }
            // SAFETY: the key is borrowed from the iterator, which stays
            // positioned until the next call on it.
            crate::marshal::to_managed_string(&self.runtime, Some(unsafe { key.as_bytes() }))
        })
    }

    pub fn database_observer_new(&self, db: i64, context: i64) -> i64 {
        self.guarded("database_observer_new", || {
            let db = self.parent(db, "database")?;
            self.create_raw::<kinds::DatabaseObserver>(&CreateRequest::DatabaseObserver {
                db,
                context: CallbackContext(context),
            })
        })
    }

    pub fn collection_observer_new(&self, collection: i64, context: i64) -> i64 {
        self.guarded("collection_observer_new", || {
            let collection = self.handles.borrow::<kinds::Collection>(NativeHandle::from_managed(collection))?;
            self.create_raw::<kinds::CollectionObserver>(&CreateRequest::CollectionObserver {
                collection: collection.handle(),
                context: CallbackContext(context),
            })
        })
    }

    pub fn document_observer_new(&self, collection: i64, doc_id: Option<LocalRef>, context: i64) -> i64 {
        self.guarded("document_observer_new", || {
            let collection = self.handles.borrow::<kinds::Collection>(NativeHandle::from_managed(collection))?;
            let doc_id = self.arg_string(doc_id, "document id")?;
            self.create_raw::<kinds::DocumentObserver>(&CreateRequest::DocumentObserver {
                collection: collection.handle(),
                doc_id: &doc_id,
                context: CallbackContext(context),
            })
        })
    }
}
