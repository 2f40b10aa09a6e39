// tests/common.rs

use assert_cmd::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;

/// The copytree binary under test.
pub fn copytree_cmd() -> Command {
    Command::cargo_bin("copytree").expect("Failed to find copytree binary")
}

/// Creates a file (and its parent directories) under `dir`.
pub fn create_file(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, content).expect("write file");
}
