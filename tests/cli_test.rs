//! The demonstration driver, run as a subprocess.

use std::process::Command;

fn slowjit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_slowjit"))
}

#[test]
fn test_run_prints_slot_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let output = slowjit()
        .args(["--const", "-7", "--count", "2", "--artifact-dir"])
        .arg(dir.path())
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");
    assert!(stdout.contains("slot 0 = -7"), "{stdout}");
    assert!(stdout.contains("dispatch: Native"), "{stdout}");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_build_failure_exits_nonzero_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let output = slowjit()
        .args(["--cc", "false", "--artifact-dir"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot execute command"), "{stderr}");
    // The provider still released its context, removing the failed source.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_emit_only_prints_source() {
    let output = slowjit().args(["--emit-only", "--const", "5"]).output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.starts_with("#include \"slowjit.h\""), "{stdout}");
    assert!(stdout.contains("*resvalue = (Datum) 5ull;"), "{stdout}");
}
