// generated_bindings_tests.rs
// The C# surface written by build.rs

const GENERATED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/generated/NativeMethods.g.cs"));

#[test]
fn test_dll_import_names_the_built_library() {
    // cargo names the cdylib after the [lib] name
    assert!(GENERATED.contains("\"litebridge_csharp\""), "DllImport should load litebridge_csharp");
    assert!(GENERATED.contains("\"litebridge_csharp.dll\""));
    assert!(GENERATED.contains("\"liblitebridge_csharp.so\""));
}

#[test]
fn test_entry_points_are_exported() {
    for name in ["litebridge_init", "litebridge_release", "litebridge_on_log", "litebridge_get_last_error"] {
        assert!(GENERATED.contains(name), "{} missing from NativeMethods.g.cs", name);
    }
}
