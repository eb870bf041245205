//! Shared fixtures: an in-process HTTP stub and a harness pointed at it.

#![allow(dead_code)]

use api_probe::api::ApiClient;
use api_probe::config::ConfigStore;
use api_probe::probes::Harness;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

/// A request as the stub saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Canned response served for one connection.
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        StubResponse {
            status,
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> Self {
        StubResponse {
            status,
            body: String::new(),
        }
    }
}

/// Serves the given responses in order, one per connection, then stops
/// accepting. Every response carries `Connection: close`.
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub fn start(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        thread::spawn(move || {
            for response in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                let request = read_request(&mut reader);
                recorded.lock().unwrap().push(request);

                let mut stream = reader.into_inner();
                let head = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(response.body.as_bytes());
                let _ = stream.flush();
            }
        });

        StubServer { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(reader: &mut impl BufRead) -> RecordedRequest {
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let len = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).unwrap();

    RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8(body).unwrap(),
    }
}

/// Harness writing its secrets file and response files into a temp dir.
pub fn harness(base_url: &str) -> (Harness, TempDir) {
    harness_with_secrets(base_url, |dir| dir.join("secrets.json"))
}

/// Like [`harness`], with the secrets path chosen from the temp dir.
pub fn harness_with_secrets(
    base_url: &str,
    secrets: impl FnOnce(&Path) -> PathBuf,
) -> (Harness, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let api = ApiClient::new(base_url, temp_dir.path().join("out"))
        .unwrap()
        .with_headers_shown(false);
    let store = ConfigStore::new(secrets(temp_dir.path()));
    (Harness::new(api, store), temp_dir)
}

pub fn auth_body(user_id: u64, access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "id": user_id,
            "name": "Super Admin",
            "email": "admin@example.com",
            "role": "admin",
            "isEmailVerified": false,
            "createdAt": "2025-01-01T00:00:00Z"
        },
        "tokens": {
            "access": {"token": access, "expires": "2025-01-01T00:30:00Z"},
            "refresh": {"token": refresh, "expires": "2025-01-31T00:00:00Z"}
        }
    })
}

pub fn user_body(id: u64, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "email": "john.doe@example.com",
        "role": "user",
        "isEmailVerified": false,
        "createdAt": "2025-01-01T00:00:00Z"
    })
}
