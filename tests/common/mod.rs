//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure: a clean command for the
//! binary, a temporary workspace with a config file, and a tiny
//! OpenAI-compatible HTTP stub.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use tempfile::TempDir;

/// Environment variables that would leak host configuration into a test
const CREW_ENV_VARS: &[&str] = &[
    "CREW_CONFIG",
    "CREW_PROVIDER",
    "CREW_BASE_URL",
    "CREW_MODEL",
    "CREW_API_KEY",
    "CREW_API_KEY_ENV",
    "CREW_TIMEOUT_SECS",
    "CREW_MAX_RETRIES",
    "CREW_OUTPUT_DIR",
    "CREW_LOG_LEVEL",
    "CREW_LOG_FILE",
    "CREW_LOG_JSON",
    "RUST_LOG",
];

/// Get a command for the crew-runner binary with host overrides removed
pub fn crew_cmd() -> Command {
    let mut cmd = Command::cargo_bin("crew-runner").unwrap();
    for var in CREW_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

// ─────────────────────────────────────────────────────────────────
// Test Environment
// ─────────────────────────────────────────────────────────────────

/// Temporary working directory with a config file and an output directory
pub struct TestEnvironment {
    pub root: TempDir,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let config_path = root.path().join("crew.toml");
        let output_dir = root.path().join("out");
        Self {
            root,
            config_path,
            output_dir,
        }
    }

    /// Write `body` as the config file; `[output] dir` points at `output_dir`
    pub fn write_config(&self, body: &str) {
        let content = format!(
            "{}\n\n[output]\ndir = \"{}\"\n",
            body,
            self.output_dir.display().to_string().replace('\\', "/")
        );
        fs::write(&self.config_path, content).expect("Failed to write config");
    }

    /// Config with the offline mock provider and the bundled crew
    pub fn with_mock(fail_roles: &[&str]) -> Self {
        let env = Self::new();
        let roles: Vec<String> = fail_roles.iter().map(|r| format!("\"{}\"", r)).collect();
        env.write_config(&format!(
            "[llm]\nprovider = \"mock\"\n\n[llm.mock]\nfail_roles = [{}]",
            roles.join(", ")
        ));
        env
    }

    pub fn config(&self) -> &str {
        self.config_path.to_str().unwrap()
    }

    pub fn output(&self, name: &str) -> String {
        fs::read_to_string(self.output_dir.join(name))
            .unwrap_or_else(|e| panic!("missing output file {}: {}", name, e))
    }

    pub fn output_exists(&self, name: &str) -> bool {
        self.output_dir.join(name).exists()
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Command running inside the environment's root directory
    pub fn cmd(&self) -> Command {
        let mut cmd = crew_cmd();
        cmd.current_dir(self.root.path());
        cmd
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI-compatible stub server
// ─────────────────────────────────────────────────────────────────

/// Chat completions stub. Each request is answered by the first route whose
/// needle appears in the request; unmatched requests get a 500.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub fn start(routes: Vec<(&str, u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let routes: Vec<(String, u16, String)> = routes
            .into_iter()
            .map(|(needle, status, text)| (needle.to_string(), status, text.to_string()))
            .collect();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let request = read_request(&mut stream);
                let (status, body) = routes
                    .iter()
                    .find(|(needle, _, _)| request.contains(needle.as_str()))
                    .map(|(_, status, text)| (*status, response_body(*status, text)))
                    .unwrap_or((500, r#"{"error":{"message":"no route"}}"#.to_string()));
                seen.lock().unwrap().push(request);

                let reply = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://{}/v1", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn response_body(status: u16, text: &str) -> String {
    if status == 200 {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }],
            "usage": { "total_tokens": 42 }
        })
        .to_string()
    } else {
        serde_json::json!({ "error": { "message": text } }).to_string()
    }
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
    }

    #[test]
    fn test_valid_fixture_exists() {
        assert!(fixture_path("valid_crew.toml").exists());
        assert!(fixture_path("invalid_crew.toml").exists());
    }
}
