// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=RGBD_STREAM_VERSION");

    // Packagers can pin the version explicitly
    let version = std::env::var("RGBD_STREAM_VERSION").unwrap_or_else(|_| describe_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "0.1.0-abcdef1" from the closest tag, or the crate version plus commit hash
/// when no tag is reachable.
fn describe_version() -> String {
    let base = git(&["describe", "--tags", "--abbrev=0", "--match", "v*"])
        .map(|tag| tag.trim_start_matches('v').to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    match git(&["rev-parse", "--short", "HEAD"]) {
        Some(hash) => format!("{}-{}", base, hash),
        None => base,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
