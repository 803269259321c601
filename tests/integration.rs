use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use cinescout::index::FlatIndex;

fn cine_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cine");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[scrape]
max_chars = 2000

[embedding]
dims = 4

[index]
path = "{}/data/reviews.idx"
chunk_chars = 500
overlap_chars = 100
top_k = 2

[server]
bind = "127.0.0.1:7411"
"#,
        root.display()
    );

    let config_path = root.join("cinescout.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cine(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cine_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cine binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_index_info_before_any_ingest() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cine(&config_path, &["index", "info"]);
    assert!(success, "index info failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("not found"));
}

#[test]
fn test_index_info_reports_saved_index() {
    let (tmp, config_path) = setup_test_env();

    let index_path = tmp.path().join("data").join("reviews.idx");
    let mut index = FlatIndex::new(4);
    index
        .add(vec![vec![0.1, 0.2, 0.3, 0.4], vec![0.5, 0.6, 0.7, 0.8]])
        .unwrap();
    index.save(&index_path).unwrap();

    let (stdout, _, success) = run_cine(&config_path, &["index", "info"]);
    assert!(success);
    assert!(stdout.contains("dims: 4"));
    assert!(stdout.contains("vectors: 2"));
}

#[test]
fn test_ask_with_empty_index_returns_fixed_answer() {
    // No index file exists and no Ollama is running; the empty index must
    // short-circuit before any network call.
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cine(&config_path, &["ask", "is it any good?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No relevant information found."));
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_cine(&config_path, &["index", "info"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("cinescout.toml");
    fs::write(&config_path, "[index]\nchunk_chars = 100\noverlap_chars = 100\n").unwrap();

    let (_, stderr, success) = run_cine(&config_path, &["index", "info"]);
    assert!(!success);
    assert!(stderr.contains("overlap_chars"));
}

#[test]
fn test_index_push_without_storage_config_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_cine(&config_path, &["index", "push"]);
    assert!(!success);
    assert!(stderr.contains("[storage]") || stderr.contains("No index file"));
}

#[test]
fn test_upload_without_storage_config_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_cine(&config_path, &["upload", "--text", "hello"]);
    assert!(!success);
    assert!(stderr.contains("[storage]"));
}

#[test]
fn test_reviews_requires_movie_id_or_url() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_cine(&config_path, &["reviews"]);
    assert!(!success);
    assert!(stderr.contains("movie id or --url"));
}
