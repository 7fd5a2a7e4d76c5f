//! Host runtime supplied as a table of C function pointers
//!
//! The .NET host fills a [`HostRuntimeVTable`] with delegates and passes it
//! to `litebridge_init`. Every entry must be set; a partial table is
//! rejected at load. Managed references cross as `u64` (`0` is null).

use litebridge_core::runtime::{
    ArgKind, Attachment, ClassId, LocalRef, ManagedRuntime, MethodId, MethodSig, PinnedRegion, UnpinMode, Value,
};
use litebridge_core::{BridgeError, Result};

/// A managed call argument or return value
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CValue {
    /// `ArgKind` discriminant
    pub kind: u8,
    pub bits: i64,
}

impl From<Value> for CValue {
    fn from(value: Value) -> Self {
        let bits = match value {
            Value::Void => 0,
            Value::Bool(b) => b as i64,
            Value::Int(v) => v as i64,
            Value::Long(v) => v,
            Value::Object(r) => litebridge_core::runtime::raw_ref(r) as i64,
        };
        CValue {
            kind: value.kind() as u8,
            bits,
        }
    }
}

impl CValue {
    pub fn to_value(self) -> Value {
        match self.kind {
            k if k == ArgKind::Bool as u8 => Value::Bool(self.bits != 0),
            k if k == ArgKind::Int as u8 => Value::Int(self.bits as i32),
            k if k == ArgKind::Long as u8 => Value::Long(self.bits),
            k if k == ArgKind::Object as u8 => Value::Object(LocalRef::from_raw(self.bits as u64)),
            _ => Value::Void,
        }
    }
}

/// Storage of a pinned byte array; `ptr` is null when pinning failed
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CPinned {
    pub ptr: *mut u8,
    pub len: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRuntimeVTable {
    pub is_attached: Option<extern "C" fn() -> bool>,
    pub attach_current_thread: Option<extern "C" fn(name: *const u8, name_len: usize) -> bool>,
    pub detach_current_thread: Option<extern "C" fn()>,
    pub exception_pending: Option<extern "C" fn() -> bool>,
    pub describe_and_clear_exception: Option<extern "C" fn()>,
    pub resolve_class: Option<extern "C" fn(name: *const u8, name_len: usize) -> u64>,
    pub resolve_method: Option<
        extern "C" fn(
            class: u64,
            name: *const u8,
            name_len: usize,
            params: *const u8,
            param_count: usize,
            ret: u8,
            is_static: bool,
        ) -> u64,
    >,
    pub call_static: Option<extern "C" fn(class: u64, method: u64, args: *const CValue, arg_count: usize) -> CValue>,
    pub new_object: Option<extern "C" fn(class: u64, ctor: u64, args: *const CValue, arg_count: usize) -> u64>,
    pub throw: Option<extern "C" fn(exception: u64) -> bool>,
    pub new_string_utf16: Option<extern "C" fn(units: *const u16, len: usize) -> u64>,
    /// Length in UTF-16 units, or negative if `string` is not a string
    pub string_length: Option<extern "C" fn(string: u64) -> i64>,
    pub string_region: Option<extern "C" fn(string: u64, out: *mut u16, len: usize) -> bool>,
    pub new_byte_array: Option<extern "C" fn(bytes: *const u8, len: usize) -> u64>,
    /// Length in bytes, or negative if `array` is not a byte array
    pub byte_array_length: Option<extern "C" fn(array: u64) -> i64>,
    pub pin_byte_array: Option<extern "C" fn(array: u64, critical: bool) -> CPinned>,
    pub unpin_byte_array: Option<extern "C" fn(array: u64, ptr: *mut u8, len: usize, critical: bool, mode: u8)>,
    pub new_object_array: Option<extern "C" fn(element_class: u64, len: usize) -> u64>,
    pub set_array_element: Option<extern "C" fn(array: u64, index: usize, value: u64) -> bool>,
    pub delete_local_ref: Option<extern "C" fn(r: u64)>,
}

macro_rules! missing_entries {
    ($table:expr; $($field:ident),* $(,)?) => {{
        let mut missing = Vec::new();
        $(if $table.$field.is_none() { missing.push(stringify!($field)); })*
        missing
    }};
}

impl HostRuntimeVTable {
    fn missing(&self) -> Vec<&'static str> {
        missing_entries!(self;
            is_attached, attach_current_thread, detach_current_thread, exception_pending,
            describe_and_clear_exception, resolve_class, resolve_method, call_static, new_object,
            throw, new_string_utf16, string_length, string_region, new_byte_array,
            byte_array_length, pin_byte_array, unpin_byte_array, new_object_array,
            set_array_element, delete_local_ref,
        )
    }
}

/// Call a table entry; entries are checked at construction, so the
/// fallback only applies to a table mutated behind our back
macro_rules! host {
    ($self:ident.$entry:ident($($arg:expr),*) else $fallback:expr) => {
        match $self.table.$entry {
            Some(f) => f($($arg),*),
            None => $fallback,
        }
    };
}

/// [`ManagedRuntime`] over a host-supplied vtable
pub struct HostRuntime {
    table: HostRuntimeVTable,
}

impl HostRuntime {
    pub fn new(table: HostRuntimeVTable) -> Result<Self> {
        let missing = table.missing();
        if !missing.is_empty() {
            return Err(BridgeError::Config(format!(
                "runtime vtable is missing: {}",
                missing.join(", ")
            )));
        }
        Ok(Self { table })
    }
}

fn values(args: &[Value]) -> Vec<CValue> {
    args.iter().map(|v| CValue::from(*v)).collect()
}

impl ManagedRuntime for HostRuntime {
    fn attachment(&self) -> Attachment {
        if host!(self.is_attached() else false) {
            Attachment::Attached
        } else {
            Attachment::Detached
        }
    }

    fn attach_current_thread(&self, thread_name: &str) -> bool {
        host!(self.attach_current_thread(thread_name.as_ptr(), thread_name.len()) else false)
    }

    fn detach_current_thread(&self) {
        host!(self.detach_current_thread() else ())
    }

    fn exception_pending(&self) -> bool {
        host!(self.exception_pending() else false)
    }

    fn describe_and_clear_exception(&self) {
        host!(self.describe_and_clear_exception() else ())
    }

    fn resolve_class(&self, name: &str) -> Option<ClassId> {
        match host!(self.resolve_class(name.as_ptr(), name.len()) else 0) {
            0 => None,
            id => Some(ClassId(id)),
        }
    }

    fn resolve_method(&self, class: ClassId, name: &str, sig: &MethodSig, is_static: bool) -> Option<MethodId> {
        // ArgKind is repr(u8)
        let params = sig.params.as_ptr() as *const u8;
        let id = host!(self.resolve_method(
            class.0,
            name.as_ptr(),
            name.len(),
            params,
            sig.params.len(),
            sig.ret as u8,
            is_static
        ) else 0);
        if id == 0 {
            None
        } else {
            Some(MethodId(id))
        }
    }

    fn call_static(&self, class: ClassId, method: MethodId, args: &[Value]) -> Value {
        let args = values(args);
        host!(self.call_static(class.0, method.0, args.as_ptr(), args.len()) else CValue::from(Value::Void))
            .to_value()
    }

    fn new_object(&self, class: ClassId, ctor: MethodId, args: &[Value]) -> Option<LocalRef> {
        let args = values(args);
        LocalRef::from_raw(host!(self.new_object(class.0, ctor.0, args.as_ptr(), args.len()) else 0))
    }

    fn throw(&self, exception: LocalRef) -> bool {
        host!(self.throw(exception.as_raw()) else false)
    }

    fn new_string_utf16(&self, units: &[u16]) -> Option<LocalRef> {
        LocalRef::from_raw(host!(self.new_string_utf16(units.as_ptr(), units.len()) else 0))
    }

    fn string_utf16(&self, string: LocalRef) -> Option<Vec<u16>> {
        let len = usize::try_from(host!(self.string_length(string.as_raw()) else -1)).ok()?;
        let mut units = vec![0u16; len];
        if host!(self.string_region(string.as_raw(), units.as_mut_ptr(), len) else false) {
            Some(units)
        } else {
            None
        }
    }

    fn new_byte_array(&self, bytes: &[u8]) -> Option<LocalRef> {
        LocalRef::from_raw(host!(self.new_byte_array(bytes.as_ptr(), bytes.len()) else 0))
    }

    fn byte_array_len(&self, array: LocalRef) -> Option<usize> {
        usize::try_from(host!(self.byte_array_length(array.as_raw()) else -1)).ok()
    }

    fn pin_byte_array(&self, array: LocalRef, critical: bool) -> Option<PinnedRegion> {
        let pinned = host!(self.pin_byte_array(array.as_raw(), critical) else CPinned {
            ptr: std::ptr::null_mut(),
            len: 0,
        });
        if pinned.ptr.is_null() {
            None
        } else {
            Some(PinnedRegion {
                ptr: pinned.ptr,
                len: pinned.len,
            })
        }
    }

    fn unpin_byte_array(&self, array: LocalRef, region: PinnedRegion, critical: bool, mode: UnpinMode) {
        host!(self.unpin_byte_array(array.as_raw(), region.ptr, region.len, critical, mode as u8) else ())
    }

    fn new_object_array(&self, element_class: ClassId, len: usize) -> Option<LocalRef> {
        LocalRef::from_raw(host!(self.new_object_array(element_class.0, len) else 0))
    }

    fn set_array_element(&self, array: LocalRef, index: usize, value: Option<LocalRef>) -> bool {
        host!(self.set_array_element(array.as_raw(), index, litebridge_core::runtime::raw_ref(value)) else false)
    }

    fn delete_local_ref(&self, r: LocalRef) {
        host!(self.delete_local_ref(r.as_raw()) else ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvalue_conversions() {
        let cases = [
            Value::Void,
            Value::Bool(true),
            Value::Int(-7),
            Value::Long(i64::MAX),
            Value::Object(None),
            Value::Object(LocalRef::from_raw(42)),
        ];
        for value in cases {
            assert_eq!(CValue::from(value).to_value(), value);
        }
        assert_eq!(CValue { kind: 200, bits: 1 }.to_value(), Value::Void);
    }

    #[test]
    fn test_partial_table_is_rejected() {
        extern "C" fn yes() -> bool {
            true
        }
        let table = HostRuntimeVTable {
            is_attached: Some(yes),
            ..HostRuntimeVTable::default()
        };
        let err = HostRuntime::new(table).err().unwrap();
        let text = err.to_string();
        assert!(text.contains("attach_current_thread"));
        assert!(!text.contains("is_attached"));
    }
}
