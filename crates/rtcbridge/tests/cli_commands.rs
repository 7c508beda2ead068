#![cfg(feature = "cli")]

use std::process::Command;

fn rtcbridge() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rtcbridge"));
    command.arg("--log-level").arg("error");
    command
}

#[test]
fn version_prints_package_version() {
    let output = rtcbridge().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_reports_bridge_defaults() {
    let output = rtcbridge()
        .args(["--format", "json", "version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let info: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("build info should be JSON");
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(info["default_protocol"], "sctp");
    assert_eq!(info["strategy"], "rgba");
}

#[test]
fn demo_emits_json_events() {
    let output = rtcbridge()
        .args(["--format", "json", "demo", "--frames", "4", "--message", "ping"])
        .output()
        .expect("demo should run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    let count = |name: &str| {
        events
            .iter()
            .filter(|envelope| envelope["event"]["event"] == name)
            .count()
    };
    assert_eq!(count("didFirstFrameRendered"), 1);
    assert_eq!(count("didTextureChangeVideoSize"), 2);
    assert_eq!(count("didTextureChangeRotation"), 1);
    assert_eq!(count("dataChannelReceiveMessage"), 2);
}

#[test]
fn demo_rejects_unknown_strategy() {
    let output = rtcbridge()
        .args(["demo", "--strategy", "yuv"])
        .output()
        .expect("demo should run");
    assert!(!output.status.success());
}

#[test]
fn soak_finishes_without_leaks() {
    let output = rtcbridge()
        .args(["--format", "json", "soak", "--iterations", "2", "--threads", "3", "--frames", "8"])
        .output()
        .expect("soak should run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should be JSON");
    assert_eq!(summary["rounds"], 2);
    assert_eq!(summary["channels"], 6);
    assert_eq!(summary["failures"], 0);
}
