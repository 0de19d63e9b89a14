// build.rs - stamps build date and target triple for the startup banner

use chrono::Utc;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    fs::write(
        out_dir.join("build_info.rs"),
        format!(
            "pub const BUILD_DATE: &str = \"{stamp}\";\npub const BUILD_TARGET: &str = \"{target}\";\n"
        ),
    )
    .expect("write build_info.rs");

    println!("cargo:rerun-if-changed=build.rs");
}
