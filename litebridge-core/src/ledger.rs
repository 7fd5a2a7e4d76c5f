//! Handle ledger: use-after-release detection
//!
//! When enabled, every handle handed to managed code is recorded as live
//! with an owner count and every managed release gives up one owner. The
//! engine may return the same retained address for repeated lookups, so an
//! address is only poisoned once its last owner has released it. A later use
//! or a further release of a poisoned handle is reported as
//! `UseAfterRelease` instead of reaching the engine. Handles the ledger has
//! never seen (borrowed handles delivered through callbacks) are allowed for
//! use but not for release.
//!
//! Poisoned entries are kept for the most recent releases only; older ones
//! are swept so the map stays bounded.
//!
//! Slice results held by managed code are tracked whether or not poisoning
//! is enabled: freeing one twice would free engine memory twice.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::engine::RawSlice;
use crate::error::{BridgeError, Result};
use crate::handle::{NativeHandle, ObjectKind};

/// Poisoned entries kept between sweeps
pub const RECENT_RELEASES: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Live { kind: ObjectKind, owners: u32 },
    Released { kind: ObjectKind, seq: u64 },
}

pub struct HandleLedger {
    enabled: bool,
    entries: DashMap<u64, HandleState>,
    // buffer address -> size, for slice results managed code still holds
    slices: DashMap<u64, usize>,
    releases: AtomicU64,
}

impl HandleLedger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: DashMap::new(),
            slices: DashMap::new(),
            releases: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self, handle: NativeHandle) -> Option<HandleState> {
        self.entries.get(&handle.0).map(|e| *e)
    }

    /// Number of distinct handles currently held by managed code
    pub fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(*e.value(), HandleState::Live { .. }))
            .count()
    }

    /// Poisoned entries currently remembered
    pub fn poisoned_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(*e.value(), HandleState::Released { .. }))
            .count()
    }

    /// Slice results currently held by managed code
    pub fn live_slices(&self) -> usize {
        self.slices.len()
    }

    /// Record one more managed owner of `handle`
    pub(crate) fn register(&self, kind: ObjectKind, handle: NativeHandle) {
        if !self.enabled {
            return;
        }
        match self.entries.entry(handle.0) {
            Entry::Occupied(mut e) => {
                let next = match *e.get() {
                    HandleState::Live { kind: actual, owners } if actual == kind => HandleState::Live {
                        kind,
                        owners: owners.saturating_add(1),
                    },
                    HandleState::Live { kind: actual, .. } => {
                        crate::log_warn!("{} handed out as {:?} while live as {:?}", handle, kind, actual);
                        HandleState::Live { kind, owners: 1 }
                    }
                    // address reused by the engine
                    HandleState::Released { .. } => HandleState::Live { kind, owners: 1 },
                };
                e.insert(next);
            }
            Entry::Vacant(e) => {
                e.insert(HandleState::Live { kind, owners: 1 });
            }
        }
    }

    /// Give up one managed owner of `handle`. The check and the transition
    /// happen under one entry lock, so racing releases cannot both pass.
    pub(crate) fn release(&self, kind: ObjectKind, handle: NativeHandle) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let seq = {
            let mut state = match self.entries.get_mut(&handle.0) {
                Some(state) => state,
                None => return Err(BridgeError::InvalidHandle { kind, handle }),
            };
            let current = *state;
            match current {
                HandleState::Live { kind: actual, .. } if actual != kind => {
                    return Err(BridgeError::KindMismatch {
                        handle,
                        expected: kind,
                        actual,
                    });
                }
                HandleState::Live { owners, .. } if owners > 1 => {
                    *state = HandleState::Live {
                        kind,
                        owners: owners - 1,
                    };
                    return Ok(());
                }
                HandleState::Live { .. } => {
                    let seq = self.next_seq();
                    *state = HandleState::Released { kind, seq };
                    seq
                }
                HandleState::Released { .. } => return Err(BridgeError::UseAfterRelease { kind, handle }),
            }
        };
        self.maybe_sweep(seq);
        Ok(())
    }

    /// May `handle` be used as a `kind` right now?
    pub(crate) fn check_usable(&self, kind: ObjectKind, handle: NativeHandle) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.state(handle) {
            None => Ok(()),
            Some(HandleState::Live { kind: actual, .. }) if actual == kind => Ok(()),
            Some(HandleState::Live { kind: actual, .. }) => Err(BridgeError::KindMismatch {
                handle,
                expected: kind,
                actual,
            }),
            Some(HandleState::Released { .. }) => Err(BridgeError::UseAfterRelease { kind, handle }),
        }
    }

    /// Record a slice result handed to managed code
    pub(crate) fn register_slice(&self, raw: RawSlice) {
        if raw.is_null() {
            return;
        }
        let handle = NativeHandle::from_ptr(raw.buf);
        if self.enabled {
            self.entries
                .remove_if(&handle.0, |_, state| matches!(state, HandleState::Released { .. }));
        }
        self.slices.insert(handle.0, raw.size);
    }

    /// Take a slice result back from managed code for freeing. Only one
    /// caller can take a given buffer.
    pub(crate) fn take_slice(&self, raw: RawSlice) -> Result<()> {
        if raw.is_null() {
            return Ok(());
        }
        let handle = NativeHandle::from_ptr(raw.buf);
        match self.slices.entry(handle.0) {
            Entry::Occupied(e) if *e.get() == raw.size => {
                e.remove();
            }
            Entry::Occupied(_) => {
                return Err(BridgeError::InvalidHandle {
                    kind: ObjectKind::SliceResult,
                    handle,
                })
            }
            Entry::Vacant(_) => return Err(self.missing_slice(handle)),
        }
        if self.enabled {
            let seq = self.next_seq();
            self.entries.insert(
                handle.0,
                HandleState::Released {
                    kind: ObjectKind::SliceResult,
                    seq,
                },
            );
            self.maybe_sweep(seq);
        }
        Ok(())
    }

    /// May managed code still read this slice result?
    pub(crate) fn check_slice(&self, raw: RawSlice) -> Result<()> {
        if raw.is_null() {
            return Ok(());
        }
        let handle = NativeHandle::from_ptr(raw.buf);
        match self.slices.get(&handle.0) {
            Some(size) if *size == raw.size => Ok(()),
            Some(_) => Err(BridgeError::InvalidHandle {
                kind: ObjectKind::SliceResult,
                handle,
            }),
            None => Err(self.missing_slice(handle)),
        }
    }

    fn missing_slice(&self, handle: NativeHandle) -> BridgeError {
        let kind = ObjectKind::SliceResult;
        match self.state(handle) {
            Some(HandleState::Released { .. }) => BridgeError::UseAfterRelease { kind, handle },
            _ => BridgeError::InvalidHandle { kind, handle },
        }
    }

    fn next_seq(&self) -> u64 {
        self.releases.fetch_add(1, Ordering::Relaxed) + 1
    }

    // Must not be called while holding an entry guard.
    fn maybe_sweep(&self, seq: u64) {
        if seq % RECENT_RELEASES != 0 {
            return;
        }
        let horizon = seq - RECENT_RELEASES;
        self.entries
            .retain(|_, state| !matches!(*state, HandleState::Released { seq, .. } if seq <= horizon));
        crate::log_trace!("swept poisoned handles up to release {}", horizon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: NativeHandle = NativeHandle(0x1000);

    fn slice(buf: &[u8]) -> RawSlice {
        RawSlice {
            buf: buf.as_ptr(),
            size: buf.len(),
        }
    }

    #[test]
    fn test_disabled_ledger_allows_everything() {
        let ledger = HandleLedger::new(false);
        ledger.register(ObjectKind::Query, H);
        assert!(ledger.release(ObjectKind::Query, H).is_ok());
        assert!(ledger.check_usable(ObjectKind::Query, H).is_ok());
        assert!(ledger.release(ObjectKind::Document, H).is_ok());
        assert_eq!(ledger.live_count(), 0);
    }

    #[test]
    fn test_poisoned_handle_is_detected() {
        let ledger = HandleLedger::new(true);
        ledger.register(ObjectKind::Query, H);
        assert!(ledger.release(ObjectKind::Query, H).is_ok());
        assert!(matches!(
            ledger.check_usable(ObjectKind::Query, H),
            Err(BridgeError::UseAfterRelease { .. })
        ));
        assert!(matches!(
            ledger.release(ObjectKind::Query, H),
            Err(BridgeError::UseAfterRelease { .. })
        ));
    }

    #[test]
    fn test_shared_address_poisoned_after_last_owner() {
        let ledger = HandleLedger::new(true);
        ledger.register(ObjectKind::Collection, H);
        ledger.register(ObjectKind::Collection, H);
        assert_eq!(ledger.state(H), Some(HandleState::Live { kind: ObjectKind::Collection, owners: 2 }));

        ledger.release(ObjectKind::Collection, H).unwrap();
        assert!(ledger.check_usable(ObjectKind::Collection, H).is_ok());

        ledger.release(ObjectKind::Collection, H).unwrap();
        assert!(matches!(
            ledger.check_usable(ObjectKind::Collection, H),
            Err(BridgeError::UseAfterRelease { .. })
        ));
    }

    #[test]
    fn test_release_with_wrong_kind_keeps_owner() {
        let ledger = HandleLedger::new(true);
        ledger.register(ObjectKind::Document, H);
        assert!(matches!(
            ledger.release(ObjectKind::Query, H),
            Err(BridgeError::KindMismatch { .. })
        ));
        assert!(ledger.release(ObjectKind::Document, H).is_ok());
    }

    #[test]
    fn test_address_reuse_revives_entry() {
        let ledger = HandleLedger::new(true);
        ledger.register(ObjectKind::Document, H);
        ledger.release(ObjectKind::Document, H).unwrap();
        ledger.register(ObjectKind::Collection, H);
        assert!(ledger.check_usable(ObjectKind::Collection, H).is_ok());
        assert!(matches!(
            ledger.check_usable(ObjectKind::Document, H),
            Err(BridgeError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_handle_cannot_be_released() {
        let ledger = HandleLedger::new(true);
        assert!(ledger.check_usable(ObjectKind::Socket, H).is_ok());
        assert!(matches!(
            ledger.release(ObjectKind::Socket, H),
            Err(BridgeError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn test_poisoned_entries_are_bounded() {
        let ledger = HandleLedger::new(true);
        for i in 0..(RECENT_RELEASES * 3) {
            let handle = NativeHandle(0x10_0000 + i * 0x10);
            ledger.register(ObjectKind::Document, handle);
            ledger.release(ObjectKind::Document, handle).unwrap();
        }
        assert!(ledger.poisoned_count() <= 2 * RECENT_RELEASES as usize);
        assert_eq!(ledger.live_count(), 0);

        // the most recent release is still remembered
        let last = NativeHandle(0x10_0000 + (RECENT_RELEASES * 3 - 1) * 0x10);
        assert!(matches!(
            ledger.check_usable(ObjectKind::Document, last),
            Err(BridgeError::UseAfterRelease { .. })
        ));
    }

    #[test]
    fn test_slices_tracked_without_poisoning() {
        let ledger = HandleLedger::new(false);
        let buf = *b"encoded";
        let raw = slice(&buf);
        ledger.register_slice(raw);
        assert_eq!(ledger.live_slices(), 1);
        assert!(ledger.check_slice(raw).is_ok());

        assert!(ledger.take_slice(raw).is_ok());
        assert!(matches!(ledger.take_slice(raw), Err(BridgeError::InvalidHandle { .. })));
        assert!(ledger.check_slice(raw).is_err());
        assert_eq!(ledger.live_slices(), 0);
    }

    #[test]
    fn test_slice_size_must_match() {
        let ledger = HandleLedger::new(true);
        let buf = *b"encoded";
        let raw = slice(&buf);
        ledger.register_slice(raw);
        let wrong = RawSlice { buf: raw.buf, size: 3 };
        assert!(matches!(ledger.take_slice(wrong), Err(BridgeError::InvalidHandle { .. })));
        assert!(ledger.take_slice(raw).is_ok());
        assert!(matches!(ledger.take_slice(raw), Err(BridgeError::UseAfterRelease { .. })));
    }

    #[test]
    fn test_concurrent_releases_admit_one() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let ledger = Arc::new(HandleLedger::new(true));
        ledger.register(ObjectKind::Query, H);
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.release(ObjectKind::Query, H).is_ok()
                })
            })
            .collect();
        let admitted = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(admitted, 1);
    }
}
