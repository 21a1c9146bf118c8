use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=TDJSON_LIB_DIR");

    // Only the `tdjson` feature needs the native library
    if env::var_os("CARGO_FEATURE_TDJSON").is_none() {
        return;
    }

    if let Some(dir) = env::var_os("TDJSON_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir.to_string_lossy());
    } else {
        println!("cargo:warning=TDJSON_LIB_DIR not set, relying on the system linker path for libtdjson");
    }

    // libtdjson is a shared library that carries its own C++ runtime dependency
    println!("cargo:rustc-link-lib=dylib=tdjson");
}
