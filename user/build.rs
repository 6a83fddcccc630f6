fn main() {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rustc-link-arg-bins=-T{manifest}/src/linker.ld");
    println!("cargo:rerun-if-changed=src/linker.ld");
}
