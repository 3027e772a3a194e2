use cargo_lock::Lockfile;
use serde::Serialize;
use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::Command;

#[derive(Serialize)]
struct DepInfo {
    name: String,
    version: String,
    checksum: Option<String>,
    source: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    // 1. Get Git Hash
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=APP_GIT_HASH={}", git_hash);
    println!("cargo:rerun-if-changed=.git/HEAD");

    // 2. Collect resolved dependencies; none when built without a lock file
    let manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
    let lock_path = Path::new(&manifest_dir).join("Cargo.lock");
    println!("cargo:rerun-if-changed=Cargo.lock");

    let deps: Vec<DepInfo> = match Lockfile::load(&lock_path) {
        Ok(lockfile) => lockfile
            .packages
            .into_iter()
            .map(|pkg| DepInfo {
                name: pkg.name.as_str().to_string(),
                version: pkg.version.to_string(),
                checksum: pkg.checksum.map(|c| c.to_string()),
                source: pkg.source.map(|s| s.to_string()),
            })
            .collect(),
        Err(err) => {
            println!("cargo:warning=could not read {}: {}", lock_path.display(), err);
            Vec::new()
        }
    };

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("deps_info.json");
    fs::write(&dest_path, serde_json::to_string(&deps)?)?;
    println!("cargo:rustc-env=DEPS_INFO_PATH={}", dest_path.display());
    Ok(())
}
