//! Build script for crew-runner
//!
//! Embeds git revision, build timestamp, target and profile so that
//! `crew-runner version` can report exactly what was built.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = git_output(&["rev-parse", "--short=8", "HEAD"]);
    let git_dirty = is_git_dirty();

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let rustc_version = rustc_version();

    println!("cargo:rustc-env=CREW_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=CREW_GIT_DIRTY={}", git_dirty);
    println!("cargo:rustc-env=CREW_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=CREW_TARGET={}", target);
    println!("cargo:rustc-env=CREW_PROFILE={}", profile);
    println!("cargo:rustc-env=CREW_RUSTC_VERSION={}", rustc_version);
}

/// Run a git command and return its trimmed stdout, or "unknown"
fn git_output(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_git_dirty() -> &'static str {
    Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .map(|output| {
            if output.status.success() && !output.stdout.is_empty() {
                "true"
            } else {
                "false"
            }
        })
        .unwrap_or("unknown")
}

fn rustc_version() -> String {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
