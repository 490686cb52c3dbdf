// Build script for flutter_rust_bridge integration
//
// flutter_rust_bridge v2 code generation is run via the CLI tool:
//   flutter_rust_bridge_codegen generate
//
// Running codegen automatically in build.rs can cause issues with cargo
// builds, so this script only handles platform link flags.

fn main() {
    // Tell cargo to rerun this build script if the API surface changes
    println!("cargo:rerun-if-changed=src/api");

    // Ensure Android builds link against libc++_shared so symbols like
    // __cxa_pure_virtual resolve correctly on all ABIs (arm/x86).
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        println!("cargo:rustc-link-lib=c++_shared");
    }
}
