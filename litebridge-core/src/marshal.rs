//! Text and byte marshaling between engine buffers and managed objects
//!
//! Strings never go through the runtime's own UTF-8 decoder: some runtimes
//! use a modified UTF-8 that rejects 4-byte sequences (supplementary-plane
//! code points). Text is decoded to UTF-16 here and handed over as code
//! units.
//!
//! Managed byte arrays are always independent copies. Borrowed views over a
//! managed array pin its storage for exactly the lifetime of a
//! [`PinnedBytes`] guard.

use std::slice;

use crate::error::{BridgeError, Result};
use crate::runtime::{LocalRef, ManagedRuntime, PinnedRegion, UnpinMode};

/// Decode UTF-8 into UTF-16 code units
pub fn utf8_to_utf16(bytes: &[u8]) -> Result<Vec<u16>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| BridgeError::Marshal(format!("invalid UTF-8 at byte {}", e.valid_up_to())))?;
    Ok(text.encode_utf16().collect())
}

/// Encode UTF-16 code units as UTF-8
pub fn utf16_to_utf8(units: &[u16]) -> Result<String> {
    String::from_utf16(units).map_err(|_| BridgeError::Marshal("unpaired surrogate in managed string".into()))
}

/// Managed string from engine text. Null stays null; empty becomes "".
pub fn to_managed_string<R: ManagedRuntime + ?Sized>(rt: &R, bytes: Option<&[u8]>) -> Result<Option<LocalRef>> {
    let bytes = match bytes {
        Some(b) => b,
        None => return Ok(None),
    };
    let units = utf8_to_utf16(bytes)?;
    rt.new_string_utf16(&units)
        .map(Some)
        .ok_or_else(|| BridgeError::Marshal("runtime could not allocate a string".into()))
}

pub fn str_to_managed<R: ManagedRuntime + ?Sized>(rt: &R, text: &str) -> Result<Option<LocalRef>> {
    to_managed_string(rt, Some(text.as_bytes()))
}

/// Engine text from a managed string. Null stays null.
pub fn from_managed_string<R: ManagedRuntime + ?Sized>(rt: &R, string: Option<LocalRef>) -> Result<Option<String>> {
    let string = match string {
        Some(s) => s,
        None => return Ok(None),
    };
    let units = rt
        .string_utf16(string)
        .ok_or_else(|| BridgeError::Marshal("argument is not a string".into()))?;
    utf16_to_utf8(&units).map(Some)
}

/// Like [`from_managed_string`] but null is an argument error
pub fn required_string<R: ManagedRuntime + ?Sized>(rt: &R, string: Option<LocalRef>, what: &str) -> Result<String> {
    from_managed_string(rt, string)?.ok_or_else(|| BridgeError::Marshal(format!("{} must not be null", what)))
}

/// Managed byte array holding a copy of `bytes`. Null stays null.
pub fn to_managed_bytes<R: ManagedRuntime + ?Sized>(rt: &R, bytes: Option<&[u8]>) -> Result<Option<LocalRef>> {
    let bytes = match bytes {
        Some(b) => b,
        None => return Ok(None),
    };
    rt.new_byte_array(bytes)
        .map(Some)
        .ok_or_else(|| BridgeError::Marshal(format!("runtime could not allocate a {}-byte array", bytes.len())))
}

/// Owned copy of a managed byte array. Null stays null.
pub fn from_managed_bytes<R: ManagedRuntime + ?Sized>(rt: &R, array: Option<LocalRef>) -> Result<Option<Vec<u8>>> {
    match array {
        None => Ok(None),
        Some(array) => {
            let pinned = PinnedBytes::pin(rt, array, false)?;
            Ok(Some(pinned.as_slice().to_vec()))
        }
    }
}

/// A pinned, read-only view of a managed byte array
///
/// With `critical`, the caller must not make any other runtime call until
/// the guard is dropped.
pub struct PinnedBytes<'r, R: ManagedRuntime + ?Sized> {
    runtime: &'r R,
    array: LocalRef,
    region: PinnedRegion,
    critical: bool,
}

impl<'r, R: ManagedRuntime + ?Sized> PinnedBytes<'r, R> {
    pub fn pin(runtime: &'r R, array: LocalRef, critical: bool) -> Result<Self> {
        let region = runtime
            .pin_byte_array(array, critical)
            .ok_or_else(|| BridgeError::Marshal("could not pin byte array".into()))?;
        Ok(Self {
            runtime,
            array,
            region,
            critical,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.region.ptr.is_null() || self.region.len == 0 {
            return &[];
        }
        // SAFETY: the runtime keeps the region valid and unmoved until unpin,
        // which only happens in Drop.
        unsafe { slice::from_raw_parts(self.region.ptr, self.region.len) }
    }

    pub fn len(&self) -> usize {
        self.region.len
    }

    pub fn is_empty(&self) -> bool {
        self.region.len == 0
    }
}

impl<R: ManagedRuntime + ?Sized> Drop for PinnedBytes<'_, R> {
    fn drop(&mut self) {
        self.runtime
            .unpin_byte_array(self.array, self.region, self.critical, UnpinMode::Abort);
    }
}

/// Run `f` over a borrowed view of `array` (empty for null)
pub fn with_pinned<R, T, F>(rt: &R, array: Option<LocalRef>, critical: bool, f: F) -> Result<T>
where
    R: ManagedRuntime + ?Sized,
    F: FnOnce(&[u8]) -> T,
{
    match array {
        None => Ok(f(&[])),
        Some(array) => {
            let pinned = PinnedBytes::pin(rt, array, critical)?;
            Ok(f(pinned.as_slice()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[test]
    fn test_supplementary_plane_survives() {
        let text = "log 🚀 𝄞 done";
        let units = utf8_to_utf16(text.as_bytes()).unwrap();
        // two surrogate pairs
        assert_eq!(units.len(), text.chars().count() + 2);
        assert_eq!(utf16_to_utf8(&units).unwrap(), text);
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        assert!(matches!(utf8_to_utf16(&[0x66, 0xff, 0x6f]), Err(BridgeError::Marshal(_))));
    }

    #[test]
    fn test_lone_surrogate_is_an_error() {
        assert!(utf16_to_utf8(&[0xd800, 0x41]).is_err());
    }

    #[test]
    fn test_null_and_empty_strings() {
        let rt = FakeRuntime::new();
        rt.attach_current_thread("t");
        assert_eq!(to_managed_string(&rt, None).unwrap(), None);
        let empty = to_managed_string(&rt, Some(b"")).unwrap().unwrap();
        assert_eq!(rt.string_value(empty).as_deref(), Some(""));
        assert_eq!(from_managed_string(&rt, None).unwrap(), None);
        assert!(required_string(&rt, None, "name").is_err());
        rt.detach_current_thread();
    }

    #[test]
    fn test_managed_bytes_are_copies() {
        let rt = FakeRuntime::new();
        rt.attach_current_thread("t");
        let mut source = vec![1u8, 2, 3];
        let array = to_managed_bytes(&rt, Some(&source)).unwrap().unwrap();
        source[0] = 9;
        assert_eq!(rt.bytes_value(array), Some(vec![1, 2, 3]));
        assert_eq!(from_managed_bytes(&rt, Some(array)).unwrap(), Some(vec![1, 2, 3]));
        rt.detach_current_thread();
    }

    #[test]
    fn test_pin_is_released_on_drop() {
        let rt = FakeRuntime::new();
        rt.attach_current_thread("t");
        let array = rt.new_byte_array(b"abcdef").unwrap();
        {
            let view = PinnedBytes::pin(&rt, array, true).unwrap();
            assert_eq!(view.as_slice(), b"abcdef");
            assert_eq!(rt.pinned_count(), 1);
            assert!(rt.in_critical());
        }
        assert_eq!(rt.pinned_count(), 0);
        assert!(!rt.in_critical());
        let len = with_pinned(&rt, Some(array), false, |b| b.len()).unwrap();
        assert_eq!(len, 6);
        assert_eq!(rt.pinned_count(), 0);
        rt.detach_current_thread();
    }
}
