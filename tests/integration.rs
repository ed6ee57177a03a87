//! E2E Integration tests for textadj
//!
//! Run with: cargo test --test integration
//! Verbose:  TEST_VERBOSE=1 cargo test --test integration -- --nocapture

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Test logging macro - prints when TEST_VERBOSE is set
macro_rules! test_log {
    ($level:expr, $($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            eprintln!("[{}] [integration:{}] {}",
                $level,
                line!(),
                format!($($arg)*)
            );
        }
    };
}

fn get_binary_path() -> PathBuf {
    if let Ok(bin_path) = std::env::var("CARGO_BIN_EXE_textadj") {
        let path = PathBuf::from(bin_path);
        if path.exists() {
            return path;
        }
    }

    // Try release first, then debug
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let release_path = PathBuf::from(manifest_dir).join("target/release/textadj");
    let debug_path = PathBuf::from(manifest_dir).join("target/debug/textadj");

    // Check CARGO_TARGET_DIR override
    if let Ok(target_dir) = std::env::var("CARGO_TARGET_DIR") {
        let custom_release = PathBuf::from(&target_dir).join("release/textadj");
        let custom_debug = PathBuf::from(&target_dir).join("debug/textadj");
        if custom_release.exists() {
            return custom_release;
        }
        if custom_debug.exists() {
            return custom_debug;
        }
    }

    if release_path.exists() {
        release_path
    } else if debug_path.exists() {
        debug_path
    } else {
        panic!(
            "textadj binary not found. Run 'cargo build' or 'cargo build --release' first.\n\
             Looked in:\n  - {}\n  - {}",
            release_path.display(),
            debug_path.display()
        );
    }
}

fn run_stdin(input: &str, args: &[&str]) -> (String, String, i32) {
    test_log!("RUN", "textadj with args: {:?}", args);
    test_log!("INPUT", "Input length: {} bytes", input.len());

    let binary = get_binary_path();
    test_log!("BIN", "Using binary: {}", binary.display());

    let mut child = Command::new(&binary)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn textadj");

    // Write input to stdin
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to wait on textadj");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    test_log!("OUTPUT", "Exit code: {}", code);
    test_log!("OUTPUT", "Stdout length: {} bytes", stdout.len());
    if !stderr.is_empty() {
        test_log!("STDERR", "{}", stderr);
    }

    (stdout, stderr, code)
}

fn run_args(args: &[&str]) -> (String, String, i32) {
    test_log!("RUN", "textadj with args: {:?}", args);

    let binary = get_binary_path();
    let output = Command::new(&binary)
        .args(args)
        .output()
        .expect("Failed to run textadj");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    test_log!("OUTPUT", "Exit code: {}", code);

    (stdout, stderr, code)
}

fn run_args_in(dir: &std::path::Path, args: &[&str]) -> (String, String, i32) {
    test_log!("RUN", "textadj in {} with args: {:?}", dir.display(), args);

    let binary = get_binary_path();
    let output = Command::new(&binary)
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run textadj");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

// ============================================================================
// Basic Functionality Tests
// ============================================================================

#[test]
fn test_stdin_passthrough_without_rules() {
    let (stdout, _, code) = run_stdin("line one\nline two\n", &["--no-config"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "line one\nline two\n");
}

#[test]
fn test_stdin_break_token() {
    let (stdout, _, code) = run_stdin("a END b END c\n", &["--no-config", "-b", "END"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "a END\n b END\n c\n");
}

#[test]
fn test_stdin_break_mode_around() {
    let (stdout, _, code) = run_stdin(
        "a END b",
        &["--no-config", "-b", "END", "--break-mode", "around"],
    );
    assert_eq!(code, 0);
    assert_eq!(stdout, "a \nEND\n b\n");
}

#[test]
fn test_stdin_break_exclusion() {
    let (stdout, _, code) = run_stdin(
        "THE END and END",
        &["--no-config", "-b", "END", "-x", "THE END"],
    );
    assert_eq!(code, 0);
    assert_eq!(stdout, "THE END and END\n");
}

#[test]
fn test_stdin_break_regex() {
    let (stdout, _, code) = run_stdin(
        "abc123def",
        &["--no-config", "--break-regex", "-b", r"\d+"],
    );
    assert_eq!(code, 0);
    assert_eq!(stdout, "abc123\ndef\n");
}

#[test]
fn test_stdin_width_to_full() {
    let (stdout, _, code) = run_stdin("abc 12!", &["--no-config", "-W", "to-full"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "ａｂｃ\u{3000}１２！\n");
}

#[test]
fn test_stdin_width_to_half_kana() {
    let (stdout, _, code) = run_stdin("ガギ。", &["--no-config", "-W", "to-half"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "ｶﾞｷﾞ｡\n");
}

#[test]
fn test_stdin_prefix_suffix_and_blank_removal() {
    let (stdout, _, code) = run_stdin(
        "a\n\nb\n",
        &["--no-config", "-p", "> ", "-s", " <", "-B"],
    );
    assert_eq!(code, 0);
    // The blank line is decorated before the filter, so it survives
    assert_eq!(stdout, "> a <\n>  <\n> b <\n");
}

#[test]
fn test_stdin_skip_lines_protects_from_breaks() {
    let (stdout, _, code) = run_stdin(
        "keep END intact\nsplit END here\n",
        &["--no-config", "-b", "END", "-k", "^keep"],
    );
    assert_eq!(code, 0);
    assert_eq!(stdout, "keep END intact\nsplit END\n here\n");
}

// ============================================================================
// File & In-Place Tests
// ============================================================================

#[test]
fn test_single_file_to_stdout() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("input.txt");
    fs::write(&file, "x END y").unwrap();

    let (stdout, _, code) = run_args(&["--no-config", "-b", "END", file.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "x END\n y\n");
    // Source file untouched
    assert_eq!(fs::read_to_string(&file).unwrap(), "x END y");
}

#[test]
fn test_in_place_with_backup() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("doc.txt");
    fs::write(&file, "a END b").unwrap();

    let (_, _, code) = run_args(&[
        "--no-config",
        "-i",
        "--backup",
        "-b",
        "END",
        file.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&file).unwrap(), "a END\n b\n");

    let backup = temp.path().join("doc.txt.bak");
    assert!(backup.exists());
    assert_eq!(fs::read_to_string(&backup).unwrap(), "a END b");
}

#[test]
fn test_multiple_files_stdout_headers() {
    let temp = TempDir::new().unwrap();
    let f1 = temp.path().join("one.txt");
    let f2 = temp.path().join("two.txt");
    fs::write(&f1, "alpha").unwrap();
    fs::write(&f2, "beta").unwrap();

    let (stdout, _, code) = run_args(&[
        "--no-config",
        f1.to_str().unwrap(),
        f2.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert!(stdout.contains(&format!("==> {} <==", f1.display())));
    assert!(stdout.contains(&format!("==> {} <==", f2.display())));
    assert!(stdout.contains("alpha\n"));
    assert!(stdout.contains("beta\n"));
}

// ============================================================================
// Diff & Dry-Run Tests
// ============================================================================

#[test]
fn test_diff_output() {
    let (stdout, _, code) = run_stdin("a END b\n", &["--no-config", "-b", "END", "--diff"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("--- a/stdin"));
    assert!(stdout.contains("+++ b/stdin"));
    assert!(stdout.contains("-a END b"));
    assert!(stdout.contains("+a END"));
}

#[test]
fn test_diff_silent_when_unchanged() {
    let (stdout, _, code) = run_stdin("nothing here\n", &["--no-config", "--diff"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "");
}

#[test]
fn test_side_by_side_marks_changed_lines() {
    let (stdout, _, code) = run_stdin(
        "a\nb END c\n",
        &["--no-config", "-b", "END", "--side-by-side"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains(" | "));
    assert!(stdout.contains('~'));
}

#[test]
fn test_dry_run_exit_code_would_change() {
    let (_, _, code) = run_stdin("a END b\n", &["--no-config", "-b", "END", "--dry-run"]);
    assert_eq!(code, 3);
}

#[test]
fn test_dry_run_exit_code_no_change() {
    let (_, _, code) = run_stdin("plain\n", &["--no-config", "--dry-run"]);
    assert_eq!(code, 0);
}

#[test]
fn test_dry_run_does_not_modify_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("keep.txt");
    fs::write(&file, "a END b").unwrap();

    let (_, _, code) = run_args(&[
        "--no-config",
        "--dry-run",
        "-b",
        "END",
        file.to_str().unwrap(),
    ]);
    assert_eq!(code, 3);
    assert_eq!(fs::read_to_string(&file).unwrap(), "a END b");
}

// ============================================================================
// JSON Output Tests
// ============================================================================

#[test]
fn test_json_output_shape() {
    let (stdout, _, code) = run_stdin("a END b\n", &["--no-config", "-b", "END", "--json"]);
    assert_eq!(code, 0);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON output");
    assert_eq!(json["version"], "1.0");
    assert_eq!(json["status"], "success");
    assert_eq!(json["changed"], true);
    assert_eq!(json["input"]["lines"], 1);
    assert_eq!(json["output"]["lines"], 2);
    assert!(json["content"].as_str().unwrap().contains("a END\n"));
    // stdin input has no file field
    assert!(json.get("file").is_none());
}

#[test]
fn test_json_unchanged_input() {
    let (stdout, _, code) = run_stdin("plain\n", &["--no-config", "--json"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["changed"], false);
}

// ============================================================================
// Error & Exit Code Tests
// ============================================================================

#[test]
fn test_binary_file_exit_code() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("blob.bin.txt");
    fs::write(&file, [0x00u8, 0x01, 0x02]).unwrap();

    let (_, stderr, code) = run_args(&["--no-config", file.to_str().unwrap()]);
    assert_eq!(code, 4);
    assert!(stderr.contains("binary"));
}

#[test]
fn test_invalid_utf8_file_exit_code() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("bad.txt");
    fs::write(&file, [0xFFu8, 0xFE, 0xFD]).unwrap();

    let (_, stderr, code) = run_args(&["--no-config", file.to_str().unwrap()]);
    assert_eq!(code, 4);
    assert!(stderr.contains("UTF-8"));
}

#[test]
fn test_missing_file_exit_code() {
    let (_, _, code) = run_args(&["--no-config", "/nonexistent/missing.txt"]);
    assert_eq!(code, 1);
}

#[test]
fn test_invalid_args_exit_code() {
    // --debounce-ms requires --watch
    let (_, _, code) = run_args(&["--no-config", "--debounce-ms", "100"]);
    assert_eq!(code, 2);
}

#[test]
fn test_exclude_with_regex_mode_rejected() {
    let (_, stderr, code) = run_stdin(
        "x",
        &["--no-config", "--break-regex", "-b", "a", "-x", "b"],
    );
    assert_eq!(code, 2);
    assert!(stderr.contains("break-exclude"));
}

#[test]
fn test_watch_without_input_exit_code() {
    let (_, _, code) = run_args(&["--no-config", "--watch"]);
    assert_eq!(code, 2);
}

#[test]
fn test_help_exits_zero() {
    let (stdout, _, code) = run_args(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("EXIT CODES"));
}

// ============================================================================
// Batch Mode Tests
// ============================================================================

#[test]
fn test_batch_mirrors_directory_tree() {
    let temp = TempDir::new().unwrap();
    let in_dir = temp.path().join("in");
    let out_dir = temp.path().join("out");
    fs::create_dir_all(in_dir.join("sub")).unwrap();
    fs::write(in_dir.join("a.txt"), "x END y").unwrap();
    fs::write(in_dir.join("sub/b.txt"), "p END q").unwrap();
    fs::write(in_dir.join("skip.png"), "binaryish").unwrap();

    let (_, stderr, code) = run_args(&[
        "--no-config",
        "-b",
        "END",
        "-r",
        "-o",
        out_dir.to_str().unwrap(),
        in_dir.to_str().unwrap(),
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");

    assert_eq!(
        fs::read_to_string(out_dir.join("a.txt")).unwrap(),
        "x END\n y"
    );
    assert_eq!(
        fs::read_to_string(out_dir.join("sub/b.txt")).unwrap(),
        "p END\n q"
    );
    assert!(!out_dir.join("skip.png").exists());
    assert!(stderr.contains("2 of 2 file(s) written"));
}

#[test]
fn test_batch_case_insensitive_extensions() {
    let temp = TempDir::new().unwrap();
    let in_dir = temp.path().join("in");
    let out_dir = temp.path().join("out");
    fs::create_dir_all(&in_dir).unwrap();
    fs::write(in_dir.join("Report.TXT"), "hello").unwrap();

    let (_, _, code) = run_args(&[
        "--no-config",
        "--ext",
        ".txt",
        "-o",
        out_dir.to_str().unwrap(),
        in_dir.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert!(out_dir.join("Report.TXT").exists());
}

#[test]
fn test_batch_non_recursive_skips_subdirs() {
    let temp = TempDir::new().unwrap();
    let in_dir = temp.path().join("in");
    let out_dir = temp.path().join("out");
    fs::create_dir_all(in_dir.join("sub")).unwrap();
    fs::write(in_dir.join("a.txt"), "top").unwrap();
    fs::write(in_dir.join("sub/b.txt"), "deep").unwrap();

    let (_, _, code) = run_args(&[
        "--no-config",
        "-o",
        out_dir.to_str().unwrap(),
        in_dir.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert!(out_dir.join("a.txt").exists());
    assert!(!out_dir.join("sub/b.txt").exists());
}

#[test]
fn test_batch_requires_directory_input() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("f.txt");
    fs::write(&file, "x").unwrap();

    let (_, _, code) = run_args(&[
        "--no-config",
        "-o",
        temp.path().join("out").to_str().unwrap(),
        file.to_str().unwrap(),
    ]);
    assert_eq!(code, 2);
}

// ============================================================================
// Recursive Multi-File Tests
// ============================================================================

#[test]
fn test_recursive_glob_discovery_in_place() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("docs")).unwrap();
    fs::write(temp.path().join("docs/a.md"), "x END y").unwrap();
    fs::write(temp.path().join("docs/b.rs"), "x END y").unwrap();

    let (_, _, code) = run_args(&[
        "--no-config",
        "-r",
        "-i",
        "--glob",
        "*.md",
        "-b",
        "END",
        temp.path().to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert_eq!(
        fs::read_to_string(temp.path().join("docs/a.md")).unwrap(),
        "x END\n y\n"
    );
    // Non-matching file untouched
    assert_eq!(
        fs::read_to_string(temp.path().join("docs/b.rs")).unwrap(),
        "x END y"
    );
}

#[test]
fn test_recursive_no_matches_warns() {
    let temp = TempDir::new().unwrap();
    let (_, stderr, code) = run_args(&[
        "--no-config",
        "-r",
        "--glob",
        "*.nope",
        temp.path().to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert!(stderr.contains("No files matched"));
}

// ============================================================================
// Config File Tests
// ============================================================================

#[test]
fn test_config_init_and_path() {
    let temp = TempDir::new().unwrap();

    let (_, stderr, code) = run_args_in(temp.path(), &["config", "init"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(temp.path().join(".textadjrc").exists());

    let (stdout, _, code) = run_args_in(temp.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with(".textadjrc"));

    // Second init fails: file already exists
    let (_, _, code) = run_args_in(temp.path(), &["config", "init"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_file_applies_and_cli_wins() {
    let temp = TempDir::new().unwrap();
    let rc = temp.path().join(".textadjrc");
    fs::write(&rc, "prefix = \"file: \"\nbreak_tokens = [\"END\"]\n").unwrap();
    let input = temp.path().join("in.txt");
    fs::write(&input, "a END b").unwrap();

    // File config supplies both settings
    let (stdout, _, code) = run_args(&[
        "--config",
        rc.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "file: a END\nfile:  b\n");

    // CLI prefix overrides the file's prefix; file break token still applies
    let (stdout, _, code) = run_args(&[
        "--config",
        rc.to_str().unwrap(),
        "-p",
        "cli: ",
        input.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "cli: a END\ncli:  b\n");
}

#[test]
fn test_no_config_ignores_file() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".textadjrc"), "prefix = \"file: \"\n").unwrap();
    let input = temp.path().join("in.txt");
    fs::write(&input, "plain").unwrap();

    let (stdout, _, code) = run_args(&["--no-config", input.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "plain\n");
}

#[test]
fn test_missing_explicit_config_errors() {
    let (_, stderr, code) = run_stdin("x", &["--config", "/nonexistent/.textadjrc"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Config file not found"));
}
