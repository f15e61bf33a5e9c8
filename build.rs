use std::process::Command;

/// Short commit hash: `SWUP_BUILD_COMMIT` wins over git so release
/// pipelines building from a tarball still get a real value.
fn commit() -> String {
    if let Ok(sha) = std::env::var("SWUP_BUILD_COMMIT") {
        return sha.chars().take(7).collect();
    }

    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let build_date = chrono::Utc::now().format("%Y-%m-%d").to_string();

    println!("cargo:rustc-env=BUILD_COMMIT={}", commit());
    println!("cargo:rustc-env=BUILD_DATE={}", build_date);
    println!("cargo:rerun-if-env-changed=SWUP_BUILD_COMMIT");

    if std::path::Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
    }
}
