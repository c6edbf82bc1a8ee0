use std::process::Command;

// Exposes the short commit hash as FORECAST_BUILD_SHA for `forecast --version`.
fn main() {
    let workspace = std::env::var("CARGO_MANIFEST_DIR")
        .map(|dir| format!("{dir}/.."))
        .unwrap_or_else(|_| "..".to_string());

    let sha = Command::new("git")
        .args(["-C", &workspace, "rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=FORECAST_BUILD_SHA={sha}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
