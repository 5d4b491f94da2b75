use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=STACKSPY_RBSPY_LIB_DIR");
    if env::var_os("CARGO_FEATURE_RBSPY").is_none() {
        return;
    }

    if let Some(dir) = env::var_os("STACKSPY_RBSPY_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir.to_string_lossy());
    }
    println!("cargo:rustc-link-lib=static=rustdeps");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux")
        && env::var("CARGO_CFG_TARGET_ENV").as_deref() != Ok("musl")
    {
        let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
        for lib in ["dl", "unwind", "unwind-ptrace", &format!("unwind-{arch}"), "rt", "m"] {
            println!("cargo:rustc-link-lib={lib}");
        }
    }
}
