//! CLI integration tests for rollcall-cli.
//!
//! These run the actual binary against a temporary store and check outputs,
//! exit codes and the persisted entries.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `rollcall` command bound to a store inside `dir`, with pacing disabled.
fn rollcall(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rollcall").unwrap();
    cmd.env_remove("ROLLCALL_ORIGIN")
        .env_remove("ROLLCALL_ROSTER")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(dir.join("page.json"))
        .arg("--no-pacing");
    cmd
}

fn write_roster(dir: &Path) -> String {
    let path = dir.join("roster.json");
    fs::write(
        &path,
        r#"{"teachers": ["teacher1@school.edu"], "students": ["student1@school.edu"]}"#,
    )
    .unwrap();
    path.to_str().unwrap().to_string()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    Command::cargo_bin("rollcall")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fingerprint and face check-in"))
        .stdout(predicate::str::contains("enroll"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("face"));
}

#[test]
fn test_help_shows_exit_codes() {
    Command::cargo_bin("rollcall")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_version_displays_version() {
    Command::cargo_bin("rollcall")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rollcall"));
}

// ============================================================================
// Enrollment and Verification
// ============================================================================

#[test]
fn test_verify_without_enrollment_returns_not_enrolled() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .arg("verify")
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Please enroll your fingerprint first"));
}

#[test]
fn test_enroll_persists_record() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .arg("enroll")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fingerprint enrolled successfully!"));

    let store: serde_json::Value =
        serde_json::from_slice(&fs::read(temp.path().join("page.json")).unwrap()).unwrap();
    assert_eq!(store["fingerprintEnrolled"], "true");
    let id = store["fingerprintCredentialId"].as_str().unwrap();
    assert_eq!(id.len(), 32);
    assert!(hex::decode(id).is_ok());

    rollcall(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("enrolled"))
        .stdout(predicate::str::contains(id));
}

#[test]
fn test_enroll_then_verify() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("Identity verified"));
}

#[test]
fn test_verify_json_verdict() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).args(["--quiet", "enroll"]).assert().success();

    let output = rollcall(temp.path())
        .args(["verify", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["strategy"], "platform-credential");
    assert_eq!(verdict["simulated"], false);
    assert!(verdict["credentialId"].is_string());
    assert!(verdict["verifiedAt"].is_string());
}

#[test]
fn test_second_enroll_is_refused() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .arg("enroll")
        .assert()
        .code(65)
        .stderr(predicate::str::contains(
            "Device is already enrolled. Try verification instead.",
        ));
}

#[test]
fn test_declined_enrollment_is_permission_denied() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .args(["enroll", "--decline"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains(
            "Permission denied. Please enable biometric authentication.",
        ));
    assert!(!temp.path().join("page.json").exists());
}

#[test]
fn test_declined_verification_is_not_recognized() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .args(["verify", "--decline"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains(
            "Fingerprint not recognized or operation cancelled.",
        ));
}

#[test]
fn test_credential_is_scoped_to_origin() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .args(["--origin", "https://attendance.school.edu", "verify"])
        .assert()
        .code(65);
}

#[test]
fn test_reset_forgets_enrollment() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));
    rollcall(temp.path()).arg("verify").assert().code(66);

    // A second reset is harmless.
    rollcall(temp.path()).arg("reset").assert().success();
}

// ============================================================================
// Capability
// ============================================================================

#[test]
fn test_insecure_mobile_page() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .args(["--mobile", "--origin", "http://192.168.1.20:5000", "capability"])
        .assert()
        .success()
        .stdout(predicate::str::contains("insecure context"));

    rollcall(temp.path())
        .args(["--mobile", "--origin", "http://192.168.1.20:5000", "enroll"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("requires HTTPS on mobile devices"));
}

#[test]
fn test_missing_sensor() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .args(["--quiet", "--no-sensor", "capability"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unsupported"));

    rollcall(temp.path())
        .args(["--no-sensor", "enroll"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("Device fingerprint sensor not available"));
}

#[test]
fn test_verify_without_sensor_is_unsupported() {
    let temp = TempDir::new().unwrap();
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .args(["--no-sensor", "verify"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains(
            "Biometric authentication not supported on this device",
        ))
        .stdout(predicate::str::contains("Identity verified").not());

    // The record survives for when the sensor is back.
    rollcall(temp.path()).arg("verify").assert().success();
}

#[test]
fn test_invalid_origin_is_usage_error() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .args(["--origin", "not a url", "status"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid --origin"));
}

#[test]
fn test_corrupt_store_is_io_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("page.json"), b"{broken").unwrap();

    rollcall(temp.path()).arg("verify").assert().code(74);
}

// ============================================================================
// Camera Fallback
// ============================================================================

#[test]
fn test_face_check_is_simulated() {
    let temp = TempDir::new().unwrap();

    let output = rollcall(temp.path())
        .args(["face", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["strategy"], "camera");
    assert_eq!(verdict["simulated"], true);
    assert!(verdict.get("credentialId").is_none());
}

#[test]
fn test_denied_camera() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .args(["face", "--deny-camera"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains(
            "Camera access denied or not available. Please use fingerprint verification.",
        ));
}

// ============================================================================
// Sign-in
// ============================================================================

#[test]
fn test_login_whoami_logout() {
    let temp = TempDir::new().unwrap();
    let roster = write_roster(temp.path());

    rollcall(temp.path())
        .args(["login", " Teacher1@School.edu ", "--roster", &roster])
        .assert()
        .success()
        .stdout(predicate::str::contains("teacher"));

    rollcall(temp.path())
        .args(["whoami", "--roster", &roster])
        .assert()
        .success()
        .stdout(predicate::str::contains("Teacher1@School.edu (teacher)"));

    rollcall(temp.path()).arg("logout").assert().success();

    rollcall(temp.path())
        .args(["whoami", "--roster", &roster])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}

#[test]
fn test_unknown_email_is_not_authorized() {
    let temp = TempDir::new().unwrap();
    let roster = write_roster(temp.path());

    rollcall(temp.path())
        .args(["login", "stranger@school.edu", "--roster", &roster])
        .assert()
        .code(77)
        .stderr(predicate::str::contains("not an authorized e-mail"));
}

#[test]
fn test_login_requires_roster() {
    let temp = TempDir::new().unwrap();

    rollcall(temp.path())
        .args(["login", "teacher1@school.edu"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--roster"))
        .stderr(predicate::str::contains("not an authorized e-mail").not());
    assert!(!temp.path().join("page.json").exists());
}

#[test]
fn test_sign_in_does_not_touch_enrollment() {
    let temp = TempDir::new().unwrap();
    let roster = write_roster(temp.path());
    rollcall(temp.path()).arg("enroll").assert().success();

    rollcall(temp.path())
        .args(["login", "student1@school.edu", "--roster", &roster])
        .assert()
        .success();
    rollcall(temp.path()).arg("logout").assert().success();

    rollcall(temp.path()).arg("verify").assert().success();
}
