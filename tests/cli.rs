//! The `pinch` binary's exit status.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn pinch(args: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pinch"))
        .args(args)
        .output()
        .unwrap()
}

fn sniff(path: &Path) -> Output {
    pinch(&[Path::new("sniff"), path])
}

#[test]
fn sniff_known_format_succeeds() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a.tif");
    std::fs::write(&path, b"II*\0rest").unwrap();

    let out = sniff(&path);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).ends_with(": tiff\n"));
}

#[test]
fn sniff_unknown_format_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a.gif");
    std::fs::write(&path, b"GIF89a").unwrap();

    let out = sniff(&path);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).ends_with(": unknown\n"));
}

#[test]
fn sniff_short_file_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tiny");
    std::fs::write(&path, [0xFF]).unwrap();
    assert_eq!(sniff(&path).status.code(), Some(1));
}

#[test]
fn compress_missing_input_fails() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("gone.png");
    let output = tmp.path().join("out.png");
    let out = pinch(&[Path::new("compress"), input.as_path(), output.as_path()]);
    assert_eq!(out.status.code(), Some(1));
}
