//! Managed socket transport
//!
//! The engine's replicator talks through sockets implemented on the managed
//! side. The engine asks for a connection through the `SocketOpen` callback;
//! the managed transport reports progress back with the calls below.

use crate::engine::CreateRequest;
use crate::error::{BridgeError, NativeError};
use crate::events::CallbackContext;
use crate::handle::{kinds, NativeHandle};
use crate::marshal;
use crate::runtime::{LocalRef, ManagedRuntime};
use crate::Bridge;

impl<R: ManagedRuntime> Bridge<R> {
    /// Route the engine's outgoing connections to the managed factory
    pub fn register_socket_factory(&self, context: i64) {
        self.engine().register_socket_factory(CallbackContext(context));
    }

    /// Wrap a connection the managed side opened on its own (incoming
    /// connections on a listener, for example). The engine returns the
    /// socket without a reference; the returned handle holds one.
    pub fn socket_from_native(
        &self,
        context: i64,
        scheme: Option<LocalRef>,
        host: Option<LocalRef>,
        port: i32,
        path: Option<LocalRef>,
        framing: i32,
    ) -> i64 {
        self.guarded("socket_from_native", || {
            let scheme = self.arg_string(scheme, "scheme")?;
            let host = self.arg_string(host, "host")?;
            let path = self.arg_string(path, "path")?;
            let port = u16::try_from(port).map_err(|_| BridgeError::Marshal(format!("port {} out of range", port)))?;
            self.create_raw::<kinds::Socket>(&CreateRequest::Socket {
                context: CallbackContext(context),
                scheme: &scheme,
                host: &host,
                port,
                path: &path,
                framing,
            })
        })
    }

    pub fn socket_opened(&self, socket: i64) {
        self.guarded("socket_opened", || {
            let socket = self.handles.borrow::<kinds::Socket>(NativeHandle::from_managed(socket))?;
            self.engine().socket_opened(socket.handle());
            Ok(())
        })
    }

    /// Bytes arrived from the peer; the engine reads them from the pinned
    /// array
    pub fn socket_received(&self, socket: i64, data: Option<LocalRef>) {
        self.guarded("socket_received", || {
            let socket = self.handles.borrow::<kinds::Socket>(NativeHandle::from_managed(socket))?;
            marshal::with_pinned(&self.runtime, data, self.config.critical_pinning, |bytes| {
                self.engine().socket_received(socket.handle(), bytes)
            })
        })
    }

    pub fn socket_completed_write(&self, socket: i64, byte_count: i64) {
        self.guarded("socket_completed_write", || {
            let socket = self.handles.borrow::<kinds::Socket>(NativeHandle::from_managed(socket))?;
            let count = u64::try_from(byte_count)
                .map_err(|_| BridgeError::Marshal(format!("negative byte count {}", byte_count)))?;
            self.engine().socket_completed_write(socket.handle(), count);
            Ok(())
        })
    }

    pub fn socket_close_requested(&self, socket: i64, status: i32, message: Option<LocalRef>) {
        self.guarded("socket_close_requested", || {
            let socket = self.handles.borrow::<kinds::Socket>(NativeHandle::from_managed(socket))?;
            let message = marshal::from_managed_string(&self.runtime, message)?.unwrap_or_default();
            self.engine().socket_close_requested(socket.handle(), status, &message);
            Ok(())
        })
    }

    /// The connection is gone. A zero `code` is a clean close.
    pub fn socket_closed(&self, socket: i64, domain: i32, code: i32, info: i32) {
        self.guarded("socket_closed", || {
            let socket = self.handles.borrow::<kinds::Socket>(NativeHandle::from_managed(socket))?;
            self.engine()
                .socket_closed(socket.handle(), NativeError::new(domain, code, info));
            Ok(())
        })
    }
}
