/*!
 * Integration tests driving the mirrorsync binary
 */

use std::fs;
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use std::process::Command;

use tempfile::tempdir;

fn mirrorsync() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mirrorsync"))
}

#[test]
fn test_cli_mirrors_tree() {
    let temp_dir = tempdir().unwrap();
    let source = temp_dir.path().join("source");
    let destination = temp_dir.path().join("destination");
    fs::create_dir_all(source.join("nested")).unwrap();
    fs::write(source.join("nested").join("file.txt"), "mirrored").unwrap();

    let output = mirrorsync()
        .args(["--threads", "2", "--verify"])
        .arg(&source)
        .arg(&destination)
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(
        fs::read_to_string(destination.join("nested").join("file.txt")).unwrap(),
        "mirrored"
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SYNC COMPLETE"));
    assert!(stdout.contains("Verified 1 files: 0 mismatched"));

    // Progress goes to stderr
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Creating directory"));
}

#[test]
fn test_cli_relative_roots_keep_links_resolvable() {
    let temp_dir = tempdir().unwrap();
    let work = temp_dir.path().canonicalize().unwrap();
    fs::create_dir(work.join("a")).unwrap();
    fs::write(work.join("a").join("f.txt"), "target").unwrap();
    symlink(work.join("a").join("f.txt"), work.join("a").join("abs")).unwrap();
    symlink("a/x", work.join("a").join("rel")).unwrap();

    let output = mirrorsync()
        .current_dir(&work)
        .args(["a", "b"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let mirrored = work.join("b");
    assert_eq!(
        fs::read_link(mirrored.join("abs")).unwrap(),
        mirrored.join("f.txt")
    );
    assert_eq!(fs::read_to_string(mirrored.join("abs")).unwrap(), "target");
    assert_eq!(
        fs::read_link(mirrored.join("rel")).unwrap(),
        PathBuf::from("a/x")
    );
}

#[test]
fn test_cli_quiet_prints_nothing_on_success() {
    let temp_dir = tempdir().unwrap();
    let source = temp_dir.path().join("source");
    fs::create_dir(&source).unwrap();
    fs::write(source.join("a"), "a").unwrap();

    let output = mirrorsync()
        .arg("--quiet")
        .arg(&source)
        .arg(temp_dir.path().join("destination"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[test]
fn test_cli_rejects_missing_source() {
    let temp_dir = tempdir().unwrap();

    let output = mirrorsync()
        .arg(temp_dir.path().join("does-not-exist"))
        .arg(temp_dir.path().join("destination"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Source directory not found"));
    assert!(!temp_dir.path().join("destination").exists());
}

#[test]
fn test_cli_requires_both_roots() {
    let output = mirrorsync().arg("only-one").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cli_generates_completions() {
    let output = mirrorsync().args(["--generate", "bash"]).output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mirrorsync"));
}
