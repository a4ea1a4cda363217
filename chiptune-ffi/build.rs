// Generates include/chiptune.h with `cbindgen` when it is on PATH and
// otherwise copies the checked-in header to $OUT_DIR, so hosts can use
// either <crate>/include/chiptune.h or $OUT_DIR/chiptune.h.

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/chiptune.h");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=chiptune-ffi: cargo env missing; header not staged");
        return;
    };
    let header_repo = PathBuf::from(&crate_dir).join("include").join("chiptune.h");
    let header_out = PathBuf::from(&out_dir).join("chiptune.h");

    let have_cbindgen = Command::new("cbindgen")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    if have_cbindgen {
        let generated = Command::new("cbindgen")
            .args(["--crate", "chiptune-ffi", "--lang", "C", "--output"])
            .arg(&header_out)
            .current_dir(&crate_dir)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if generated {
            if let Some(parent) = header_repo.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = fs::copy(&header_out, &header_repo);
            return;
        }
        println!("cargo:warning=chiptune-ffi: cbindgen failed; using checked-in header");
    }

    if fs::copy(&header_repo, &header_out).is_err() {
        let placeholder = b"/* chiptune.h: install cbindgen or keep include/chiptune.h checked in */\n";
        if fs::write(&header_out, placeholder).is_err() {
            println!("cargo:warning=chiptune-ffi: could not write {}", header_out.display());
        }
    }
}
