use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn pdfchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pdfchat");
    path
}

/// Temp workspace with an offline config: hashing embeddings and a model
/// list command that does not exist.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("policy.txt"),
        "Store policy.\n\nRefunds are processed within 30 days.\n\nShipping labels print nightly.",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes.md"),
        "# Notes\n\nThe warehouse is closed on Sundays.",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
path = "{}/chroma_db"

[embedding]
provider = "hash"
dims = 128

[llm]
default_model = "mistral:latest"
url = "http://127.0.0.1:9"
command = "pdfchat-test-no-such-binary"
max_retries = 0
timeout_secs = 2
"#,
        root.display()
    );

    let config_path = root.join("pdfchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pdfchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pdfchat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdfchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_ask_before_ingest_prints_guidance() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdfchat(&config_path, &["ask", "What is the refund policy?"]);

    assert!(success, "ask failed: {}", stderr);
    assert_eq!(stdout.trim(), "Please, add a PDF document first.");
    assert!(!tmp.path().join("chroma_db").exists());
}

#[test]
fn test_models_without_backend_fails_with_hint() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdfchat(&config_path, &["models"]);

    assert!(!success);
    assert!(stdout.is_empty(), "unexpected stdout: {}", stdout);
    assert!(
        stderr.contains("No Ollama models found. Please install models with 'ollama pull <model_name>'"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_ingest_then_status_reports_chunks() {
    let (tmp, config_path) = setup_test_env();
    let files = tmp.path().join("files");

    let (stdout, stderr, success) = run_pdfchat(
        &config_path,
        &[
            "ingest",
            files.join("policy.txt").to_str().unwrap(),
            files.join("notes.md").to_str().unwrap(),
        ],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("Ingested policy.txt in "), "stdout: {}", stdout);
    assert!(stdout.contains("Ingested notes.md in "), "stdout: {}", stdout);
    assert!(tmp.path().join("chroma_db").join("index.sqlite3").exists());

    let (stdout, stderr, success) = run_pdfchat(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("Model: mistral:latest (not installed)"), "stdout: {}", stdout);
    assert!(stdout.contains("Index: 2 chunks"), "stdout: {}", stdout);
}

#[test]
fn test_ingest_missing_file_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("files").join("nope.pdf");

    let (_stdout, stderr, success) =
        run_pdfchat(&config_path, &["ingest", missing.to_str().unwrap()]);

    assert!(!success);
    assert!(stderr.contains("nope.pdf"), "stderr: {}", stderr);
}

#[test]
fn test_ask_with_uninstalled_model_is_refused() {
    let (_tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run_pdfchat(
        &config_path,
        &["ask", "--model", "llama3.2:latest", "anything?"],
    );

    assert!(!success);
    assert!(stderr.contains("No Ollama models found"), "stderr: {}", stderr);
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.toml");

    let (_stdout, stderr, success) = run_pdfchat(&missing, &["status"]);

    assert!(!success);
    assert!(stderr.contains("absent.toml"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("pdfchat.toml");
    fs::write(
        &config_path,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .unwrap();

    let (_stdout, stderr, success) = run_pdfchat(&config_path, &["status"]);

    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_chat_session_commands() {
    let (tmp, config_path) = setup_test_env();
    let policy = tmp.path().join("files").join("policy.txt");

    let mut child = Command::new(pdfchat_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("chat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(stdin, "What is the refund policy?").unwrap();
        writeln!(stdin, "/ingest {}", policy.display()).unwrap();
        writeln!(stdin, "/status").unwrap();
        writeln!(stdin, "/clear").unwrap();
        writeln!(stdin, "/model llama3.2:latest").unwrap();
        writeln!(stdin, "/quit").unwrap();
    }

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "chat failed: {}", stderr);
    assert!(stdout.contains("Please, add a PDF document first."), "stdout: {}", stdout);
    assert!(stdout.contains("Ingested policy.txt in "), "stdout: {}", stdout);
    assert!(stdout.contains("Index: 1 chunks"), "stdout: {}", stdout);
    assert!(stdout.contains("Cleared."), "stdout: {}", stdout);
    assert!(stderr.contains("No Ollama models found"), "stderr: {}", stderr);
}
