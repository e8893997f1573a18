use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let Ok(crate_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let crate_dir = PathBuf::from(crate_dir);
    let out = crate_dir.join("include").join("restbridge.h");

    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")).unwrap_or_default();
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            if let Some(dir) = out.parent() {
                if let Err(err) = std::fs::create_dir_all(dir) {
                    println!("cargo:warning=could not create {}: {err}", dir.display());
                    return;
                }
            }
            bindings.write_to_file(&out);
        }
        // A header failure must not break the Rust build.
        Err(err) => println!("cargo:warning=could not generate {}: {err}", out.display()),
    }
}
