use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const ENV_KEYS: [&str; 4] = [
    "PADDLE_API_KEY",
    "PADDLE_PRICE_ID",
    "PADDLE_CLIENT_TOKEN",
    "NICHEFIRE_SESSION_SECRET",
];

fn nichefire_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("nichefire");
    path
}

fn setup_test_env(billing: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("outliers.json"),
        r#"[
            {"video_id":"a","title":"Cat video","creator_name":"Tom","viral_score":80,"view_count":1500000},
            {"video_id":"b","title":"Dog video","creator_name":"Rex","viral_score":95,"view_count":2000},
            {"video_id":"c","title":"Category hit","creator_name":"Ann"}
        ]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[server]
bind = "127.0.0.1:7331"

[data]
outliers_url = "http://127.0.0.1:9/api/outliers"

[auth]
session_secret = "cli-secret"

{}
"#,
        billing
    );

    let config_path = config_dir.join("nichefire.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_nichefire(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = nichefire_binary();
    let mut cmd = Command::new(&binary);
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    let output = cmd
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run nichefire binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

const BILLING: &str = r#"[billing]
api_key = "pdl_test"
price_id = "pri_test"
client_token = "test_token"
"#;

#[test]
fn test_check_passes_with_credentials() {
    let (_tmp, config) = setup_test_env(BILLING);
    let (stdout, stderr, ok) = run_nichefire(&config, &["check"]);
    assert!(ok, "check failed: {}", stderr);
    assert!(stdout.contains("config ok"));
    assert!(stdout.contains("127.0.0.1:7331"));
}

#[test]
fn test_check_fails_without_billing_credentials() {
    let (_tmp, config) = setup_test_env("");
    let (_stdout, stderr, ok) = run_nichefire(&config, &["check"]);
    assert!(!ok);
    assert!(stderr.contains("PADDLE_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_serve_refuses_to_start_without_credentials() {
    let (_tmp, config) = setup_test_env(
        r#"[billing]
api_key = "pdl_test"
price_id = "pri_test"
"#,
    );
    let (_stdout, stderr, ok) = run_nichefire(&config, &["serve"]);
    assert!(!ok);
    assert!(stderr.contains("PADDLE_CLIENT_TOKEN"), "stderr: {}", stderr);
}

#[test]
fn test_routes_classification() {
    let (_tmp, config) = setup_test_env(BILLING);
    let (stdout, _stderr, ok) = run_nichefire(
        &config,
        &["routes", "/", "/dashboard", "/subscribe/plan", "/static/app.css", "/api/checkout"],
    );
    assert!(ok);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].contains("public") && lines[0].ends_with("allow"));
    assert!(lines[1].contains("protected") && lines[1].ends_with("requires session"));
    assert!(lines[2].ends_with("requires session"));
    assert!(lines[3].contains("excluded") && lines[3].ends_with("not intercepted"));
    assert!(lines[4].contains("unclassified") && lines[4].ends_with("allow"));
}

#[test]
fn test_outliers_sorted_by_viral_score() {
    let (tmp, config) = setup_test_env(BILLING);
    let data = tmp.path().join("outliers.json");
    let (stdout, stderr, ok) = run_nichefire(
        &config,
        &["outliers", "--from-file", data.to_str().unwrap()],
    );
    assert!(ok, "outliers failed: {}", stderr);

    let b = stdout.find("Dog video").unwrap();
    let a = stdout.find("Cat video").unwrap();
    let c = stdout.find("Category hit").unwrap();
    assert!(b < a && a < c);
    assert!(stdout.contains("1.5M"));
    assert!(stdout.contains("N/A"));
}

#[test]
fn test_outliers_search_and_sort() {
    let (tmp, config) = setup_test_env(BILLING);
    let data = tmp.path().join("outliers.json");
    let (stdout, _stderr, ok) = run_nichefire(
        &config,
        &[
            "outliers",
            "--from-file",
            data.to_str().unwrap(),
            "--search",
            "CAT",
            "--sort",
            "view_count",
        ],
    );
    assert!(ok);
    assert!(stdout.contains("2 of 3 videos"));
    assert!(!stdout.contains("Dog video"));
    assert!(stdout.find("Cat video").unwrap() < stdout.find("Category hit").unwrap());
}

#[test]
fn test_outliers_no_results() {
    let (tmp, config) = setup_test_env(BILLING);
    let data = tmp.path().join("outliers.json");
    let (stdout, _stderr, ok) = run_nichefire(
        &config,
        &["outliers", "--from-file", data.to_str().unwrap(), "--search", "zebra"],
    );
    assert!(ok);
    assert!(stdout.contains("No results found."));
}

#[test]
fn test_outliers_rejects_unknown_sort_key() {
    let (tmp, config) = setup_test_env(BILLING);
    let data = tmp.path().join("outliers.json");
    let (_stdout, _stderr, ok) = run_nichefire(
        &config,
        &["outliers", "--from-file", data.to_str().unwrap(), "--sort", "comments"],
    );
    assert!(!ok);
}

#[test]
fn test_session_prints_cookie() {
    let (_tmp, config) = setup_test_env(BILLING);
    let (stdout, _stderr, ok) = run_nichefire(
        &config,
        &["session", "--user-id", "user_1", "--first-name", "Ada"],
    );
    assert!(ok);
    let line = stdout.trim();
    assert!(line.starts_with("__session="));
    let token = line.trim_start_matches("__session=");
    assert_eq!(token.split('.').count(), 2);
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_stdout, stderr, ok) = run_nichefire(&tmp.path().join("absent.toml"), &["check"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
