use std::env;
use std::path::PathBuf;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let out_dir = PathBuf::from(&crate_dir).join("generated");
    // DllImport must name the library cargo actually produces
    let lib_name = env::var("CARGO_PKG_NAME").unwrap().replace('-', "_");

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(&out_dir).ok();

    // Generate C# bindings using csbindgen
    csbindgen::Builder::default()
        .input_extern_file("src/lib.rs")
        .input_extern_file("src/error.rs")
        .input_extern_file("src/vtable.rs")
        .input_extern_file("src/engine_vtable.rs")
        .input_extern_file("src/global.rs")
        .input_extern_file("src/callbacks.rs")
        .input_extern_file("src/exports.rs")
        .input_extern_file("src/logging.rs")
        .input_extern_file("src/memory.rs")
        .input_extern_file("../../litebridge-core/src/engine.rs")
        .input_extern_file("../../litebridge-core/src/error.rs")
        .input_extern_file("../../litebridge-core/src/events.rs")
        .csharp_dll_name(lib_name.as_str())
        .csharp_namespace("LiteBridge.Interop")
        .csharp_class_name("NativeMethods")
        .csharp_class_accessibility("internal")
        .csharp_dll_name_if("LITEBRIDGE_WINDOWS", format!("{}.dll", lib_name).as_str())
        .csharp_dll_name_if("LITEBRIDGE_LINUX", format!("lib{}.so", lib_name).as_str())
        .generate_csharp_file(out_dir.join("NativeMethods.g.cs"))
        .unwrap();
}
