//! Runtime attachment for engine-owned threads
//!
//! Engine callbacks arrive on threads the managed runtime may never have
//! seen. `enter` makes the calling thread usable, and the returned guard
//! undoes exactly what `enter` did: a thread the bridge attached is detached
//! when the guard drops, on every exit path; a thread that was already
//! attached is left alone. Nested entries on one thread therefore detach
//! once, at the outermost level.

use crate::error::{BridgeError, Result};
use crate::runtime::{Attachment, ManagedRuntime};

/// Per-thread attachment state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    NotAttached,
    AttachedByBridge,
    AlreadyAttached,
}

/// Scope guard returned by [`enter`]
#[must_use = "dropping the guard immediately detaches the thread"]
pub struct AttachGuard<'r, R: ManagedRuntime + ?Sized> {
    runtime: &'r R,
    state: AttachmentState,
}

impl<'r, R: ManagedRuntime + ?Sized> AttachGuard<'r, R> {
    pub fn state(&self) -> AttachmentState {
        self.state
    }

    pub fn runtime(&self) -> &'r R {
        self.runtime
    }

    /// Fail if an exception is already pending on this thread. Invoking
    /// more managed code in that state is not allowed.
    pub fn ensure_no_pending_exception(&self) -> Result<()> {
        if self.runtime.exception_pending() {
            Err(BridgeError::PendingException)
        } else {
            Ok(())
        }
    }
}

impl<R: ManagedRuntime + ?Sized> Drop for AttachGuard<'_, R> {
    fn drop(&mut self) {
        if self.state == AttachmentState::AttachedByBridge {
            self.runtime.detach_current_thread();
            crate::log_trace!("detached thread after callback");
        }
    }
}

/// Make the calling thread able to call into the runtime.
///
/// On attach failure nothing has been changed and the caller must abandon
/// the callback without touching managed code.
pub fn enter<'r, R: ManagedRuntime + ?Sized>(runtime: &'r R, thread_name: &str) -> Result<AttachGuard<'r, R>> {
    match runtime.attachment() {
        Attachment::Attached => Ok(AttachGuard {
            runtime,
            state: AttachmentState::AlreadyAttached,
        }),
        Attachment::Detached => {
            if !runtime.attach_current_thread(thread_name) {
                return Err(BridgeError::AttachFailed(thread_name.to_string()));
            }
            crate::log_trace!("attached thread '{}'", thread_name);
            Ok(AttachGuard {
                runtime,
                state: AttachmentState::AttachedByBridge,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[test]
    fn test_attach_and_detach_on_fresh_thread() {
        let rt = FakeRuntime::new();
        std::thread::scope(|s| {
            s.spawn(|| {
                {
                    let guard = enter(&rt, "test").unwrap();
                    assert_eq!(guard.state(), AttachmentState::AttachedByBridge);
                    assert_eq!(rt.attachment(), Attachment::Attached);
                }
                assert_eq!(rt.attachment(), Attachment::Detached);
            });
        });
        assert_eq!(rt.attach_count(), 1);
        assert_eq!(rt.detach_count(), 1);
    }

    #[test]
    fn test_already_attached_thread_is_left_alone() {
        let rt = FakeRuntime::new();
        rt.attach_current_thread("host");
        {
            let guard = enter(&rt, "test").unwrap();
            assert_eq!(guard.state(), AttachmentState::AlreadyAttached);
        }
        assert_eq!(rt.attachment(), Attachment::Attached);
        assert_eq!(rt.detach_count(), 0);
        rt.detach_current_thread();
    }

    #[test]
    fn test_nested_entries_detach_once() {
        let rt = FakeRuntime::new();
        std::thread::scope(|s| {
            s.spawn(|| {
                let outer = enter(&rt, "outer").unwrap();
                {
                    let inner = enter(&rt, "inner").unwrap();
                    assert_eq!(inner.state(), AttachmentState::AlreadyAttached);
                }
                assert_eq!(rt.attachment(), Attachment::Attached);
                drop(outer);
                assert_eq!(rt.attachment(), Attachment::Detached);
            });
        });
        assert_eq!(rt.attach_count(), 1);
        assert_eq!(rt.detach_count(), 1);
    }

    #[test]
    fn test_attach_failure_is_reported() {
        let rt = FakeRuntime::new();
        rt.fail_attach(true);
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(matches!(enter(&rt, "doomed"), Err(BridgeError::AttachFailed(_))));
            });
        });
        assert_eq!(rt.detach_count(), 0);
    }

    #[test]
    fn test_pending_exception_detected() {
        let rt = FakeRuntime::new();
        std::thread::scope(|s| {
            s.spawn(|| {
                let guard = enter(&rt, "t").unwrap();
                assert!(guard.ensure_no_pending_exception().is_ok());
                rt.set_pending_exception(true);
                assert!(matches!(
                    guard.ensure_no_pending_exception(),
                    Err(BridgeError::PendingException)
                ));
                rt.set_pending_exception(false);
            });
        });
    }
}
