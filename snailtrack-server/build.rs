//! Embeds build identification into the server binary
//!
//! `GIT_HASH` carries a `-dirty` suffix when the working tree had
//! uncommitted changes at build time.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");

    let mut git_hash = git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    if git(&["status", "--porcelain", "--untracked-files=no"]).is_some_and(|s| !s.is_empty()) {
        git_hash.push_str("-dirty");
    }

    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    for (key, value) in [
        ("GIT_HASH", git_hash),
        ("BUILD_TIMESTAMP", timestamp),
        ("BUILD_PROFILE", profile),
    ] {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Trimmed stdout of a successful git invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}
