//! Command line tests for the gerbkit binary
//!
//! Each failure class has its own exit code, so scripts can tell a bad
//! command line from a file that failed to parse.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

use gerbkit::error::exit_code;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn gerbkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gerbkit"))
        .args(args)
        .arg("--no-progress")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run gerbkit")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("Non UTF-8 test path")
}

#[test]
fn test_successful_export_exits_zero() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("square.png");
    let square = fixture("square.gbr");

    let run = gerbkit(&["-i", path_arg(&square), "-o", path_arg(&output)]);

    assert_eq!(run.status.code(), Some(exit_code::SUCCESS));
    assert!(output.is_file());
}

#[test]
fn test_usage_error_exits_with_invalid_argument() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("square.png");
    let square = fixture("square.gbr");

    let run = gerbkit(&["-i", path_arg(&square), "-o", path_arg(&output), "--dpi", "0"]);

    assert_eq!(run.status.code(), Some(exit_code::INVALID_ARGUMENT));
    assert!(!output.exists());
}

#[test]
fn test_missing_required_argument_exits_with_invalid_argument() {
    let run = gerbkit(&["-o", "never.png"]);
    assert_eq!(run.status.code(), Some(exit_code::INVALID_ARGUMENT));
}

#[test]
fn test_unparsable_input_exits_with_format_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("drill.png");
    let drill = fixture("drill.drl");

    let run = gerbkit(&["-i", path_arg(&drill), "-o", path_arg(&output)]);

    assert_eq!(run.status.code(), Some(exit_code::FORMAT_ERROR));
    assert!(!output.exists());
}

#[test]
fn test_missing_input_file_exits_with_invalid_argument() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let absent = temp_dir.path().join("absent.gbr");
    let output = temp_dir.path().join("out.png");

    let run = gerbkit(&["-i", path_arg(&absent), "-o", path_arg(&output)]);

    assert_eq!(run.status.code(), Some(exit_code::INVALID_ARGUMENT));
}

#[test]
fn test_help_and_version_exit_zero() {
    for flag in ["--help", "--version"] {
        let run = Command::new(env!("CARGO_BIN_EXE_gerbkit"))
            .arg(flag)
            .output()
            .expect("Failed to run gerbkit");

        assert_eq!(run.status.code(), Some(exit_code::SUCCESS), "{}", flag);
        assert!(!run.stdout.is_empty());
    }
}

#[test]
fn test_negative_scale_is_accepted() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("mirrored.svg");
    let square = fixture("square.gbr");

    let run = gerbkit(&[
        "-i",
        path_arg(&square),
        "-o",
        path_arg(&output),
        "--scale",
        "-1,1",
    ]);

    assert_eq!(run.status.code(), Some(exit_code::SUCCESS));
    assert!(output.is_file());
}
