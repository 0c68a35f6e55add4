//! Command line behavior of the kpacker binary.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn kpacker(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("kpacker").unwrap();
    cmd.env("HOME", home).env("RUST_LOG", "warn").arg("--no-ansi");
    cmd
}

#[test]
fn test_help_lists_options() {
    let home = tempfile::tempdir().unwrap();
    kpacker(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--document-extensions"))
        .stdout(predicate::str::contains("--no-dmg-compress"))
        .stdout(predicate::str::contains("--skip-dmg"));
}

#[test]
fn test_unknown_target_is_rejected() {
    let sandbox = common::Sandbox::new();
    kpacker(sandbox.path())
        .args(["--source", sandbox.source().to_str().unwrap()])
        .args(["--name", "Demo", "--out", "dist", "--target", "beos"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("beos"));
}

#[test]
fn test_document_extensions_require_icon() {
    let sandbox = common::Sandbox::new();
    common::populate_source(&sandbox.source());
    kpacker(sandbox.path())
        .args(["--source", sandbox.source().to_str().unwrap()])
        .args(["--name", "Demo", "--target", "windows-x64"])
        .args(["--out", sandbox.out().to_str().unwrap()])
        .args(["--document-extensions", "txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--document-icon"));
    assert!(!sandbox.out().exists());
}

#[test]
fn test_multiple_jars_abort_before_packaging() {
    let sandbox = common::Sandbox::new();
    common::write_jar(&sandbox.source(), "a.jar", Some("demo.A"));
    common::write_jar(&sandbox.source(), "b.jar", Some("demo.B"));
    kpacker(sandbox.path())
        .args(["--source", sandbox.source().to_str().unwrap()])
        .args(["--name", "Demo", "--target", "generic"])
        .args(["--out", sandbox.out().to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("multiple payloads found"));
    assert!(!sandbox.out().exists());
}

#[test]
fn test_generic_target_end_to_end() {
    let sandbox = common::Sandbox::new();
    common::populate_source(&sandbox.source());
    kpacker(sandbox.path())
        .args(["--source", sandbox.source().to_str().unwrap()])
        .args(["--name", "Demo", "--version", "4.2.0", "--target", "Generic"])
        .args(["--out", sandbox.out().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Demo-4.2.0-generic.tar.gz"));
    assert!(
        sandbox
            .out()
            .join("generic/Demo-4.2.0-generic.tar.gz")
            .is_file()
    );
}
