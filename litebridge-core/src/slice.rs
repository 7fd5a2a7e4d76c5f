//! Owned slice results
//!
//! A slice result is an engine-allocated (pointer, length) buffer whose
//! holder must free it exactly once. Unlike an object handle it is a pair,
//! so it is freed with the engine's slice free rather than through the kind
//! table. After release the value is unbound: reading it again is an error,
//! not a read of freed memory. Buffers handed to managed code are recorded
//! in the ledger, so a second managed release is refused rather than freed
//! again.

use crate::engine::RawSlice;
use crate::error::{BridgeError, Result};
use crate::handle::HandleRegistry;

pub struct SliceResult<'r> {
    raw: RawSlice,
    registry: &'r HandleRegistry,
    bound: bool,
}

impl<'r> SliceResult<'r> {
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    pub fn len(&self) -> usize {
        self.raw.size
    }

    pub fn is_empty(&self) -> bool {
        self.raw.size == 0
    }

    pub fn bytes(&self) -> Result<&[u8]> {
        if !self.bound {
            return Err(BridgeError::Unbound);
        }
        // SAFETY: bound means the engine allocation has not been freed.
        Ok(unsafe { self.raw.as_bytes() })
    }

    /// Free the buffer now. A second call reports `Unbound`.
    pub fn release(&mut self) -> Result<()> {
        if !self.bound {
            return Err(BridgeError::Unbound);
        }
        self.bound = false;
        if !self.raw.is_null() {
            self.registry.engine().free_slice(self.raw);
        }
        Ok(())
    }

    /// Copy out and free
    pub fn into_vec(mut self) -> Result<Vec<u8>> {
        let bytes = self.bytes()?.to_vec();
        self.release()?;
        Ok(bytes)
    }

    /// Hand the buffer to managed code, which now owes the free
    pub fn into_raw(mut self) -> RawSlice {
        let raw = self.raw;
        if self.bound {
            self.registry.ledger().register_slice(raw);
        }
        self.bound = false;
        raw
    }
}

impl Drop for SliceResult<'_> {
    fn drop(&mut self) {
        if self.bound {
            let _ = self.release();
        }
    }
}

impl HandleRegistry {
    /// Take ownership of a buffer the engine just returned
    pub fn adopt_slice(&self, raw: RawSlice) -> SliceResult<'_> {
        SliceResult {
            raw,
            registry: self,
            bound: true,
        }
    }

    /// Take back a buffer previously handed to managed code
    pub fn reclaim_slice(&self, raw: RawSlice) -> Result<SliceResult<'_>> {
        self.ledger().take_slice(raw)?;
        Ok(self.adopt_slice(raw))
    }

    /// Read a buffer still held by managed code
    pub fn view_slice(&self, raw: RawSlice) -> Result<&[u8]> {
        if raw.is_null() {
            return Ok(&[]);
        }
        self.ledger().check_slice(raw)?;
        // SAFETY: the ledger confirmed the buffer is still held by managed
        // code and has not been freed.
        Ok(unsafe { raw.as_bytes() })
    }
}
