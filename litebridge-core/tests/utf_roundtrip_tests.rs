// utf_roundtrip_tests.rs
// Text crossing the boundary keeps every code point, supplementary planes included

use litebridge_core::marshal::{self, utf16_to_utf8, utf8_to_utf16};
use litebridge_core::testing::FakeRuntime;
use litebridge_core::ManagedRuntime;
use proptest::prelude::*;

fn attached_runtime() -> FakeRuntime {
    let runtime = FakeRuntime::new();
    assert!(runtime.attach_current_thread("utf"));
    runtime
}

#[test]
fn test_four_byte_sequences_survive() {
    let runtime = attached_runtime();
    for text in ["🚀", "a𝄞b", "😀😃😄", "日本語テキスト", "\u{10FFFF}"] {
        let managed = marshal::str_to_managed(&runtime, text).unwrap();
        assert_eq!(runtime.string_value(managed.unwrap()).as_deref(), Some(text));
        let back = marshal::from_managed_string(&runtime, managed).unwrap();
        assert_eq!(back.as_deref(), Some(text));
    }
}

#[test]
fn test_surrogate_pairs_are_two_units() {
    assert_eq!(utf8_to_utf16("🚀".as_bytes()).unwrap(), vec![0xD83D, 0xDE80]);
}

#[test]
fn test_invalid_input_is_rejected() {
    assert!(utf8_to_utf16(&[0x61, 0xF0, 0x9F]).is_err());
    assert!(utf16_to_utf8(&[0xD800]).is_err());
}

#[test]
fn test_null_and_empty_are_distinct() {
    let runtime = attached_runtime();
    assert!(marshal::to_managed_string(&runtime, None).unwrap().is_none());
    let empty = marshal::to_managed_string(&runtime, Some(b"")).unwrap();
    assert!(empty.is_some());
    assert_eq!(marshal::from_managed_string(&runtime, empty).unwrap().as_deref(), Some(""));
}

proptest! {
    #[test]
    fn prop_utf16_roundtrip(text in any::<String>()) {
        let units = utf8_to_utf16(text.as_bytes()).unwrap();
        prop_assert_eq!(utf16_to_utf8(&units).unwrap(), text);
    }

    #[test]
    fn prop_managed_string_roundtrip(text in any::<String>()) {
        let runtime = attached_runtime();
        let managed = marshal::str_to_managed(&runtime, &text).unwrap();
        let back = marshal::from_managed_string(&runtime, managed).unwrap();
        prop_assert_eq!(back, Some(text));
    }

    #[test]
    fn prop_byte_arrays_are_copied_verbatim(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let runtime = attached_runtime();
        let managed = marshal::to_managed_bytes(&runtime, Some(&bytes)).unwrap();
        prop_assert_eq!(marshal::from_managed_bytes(&runtime, managed).unwrap(), Some(bytes));
    }
}
