// API client module: a small blocking HTTP client that sends one request
// per probe, prints what came back and keeps a copy of the body on disk.
// Request failures are reported on stdout and never abort the caller.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ui;

/// Blocking client bound to the base URL of the API under test and to the
/// directory that receives the per-probe response files.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    out_dir: PathBuf,
    show_headers: bool,
}

/// What a probe gets back from [`ApiClient::send_and_print`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// Body parsed into one of the typed payloads below.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("Parsing response json")
    }
}

/// Payload for `/auth/register` and `POST /users`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Login request payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `/auth/logout` and `/auth/refresh-tokens`. A missing token is
/// sent as `null`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Partial update for `PATCH /users/{id}`; unset fields are left out.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default)]
    pub expires: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthTokens {
    pub access: TokenResponse,
    pub refresh: TokenResponse,
}

/// Response of register and login.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: AuthTokens,
}

/// One page of `GET /users`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserPage {
    pub results: Vec<UserResponse>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl ApiClient {
    pub fn new(base_url: &str, out_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            out_dir: out_dir.into(),
            show_headers: true,
        })
    }

    /// Toggle printing of response headers.
    pub fn with_headers_shown(mut self, show: bool) -> Self {
        self.show_headers = show;
        self
    }

    /// Absolute URL for an API path such as `/users/3`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Where the response of `stem` is written.
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", stem))
    }

    /// `Content-Type: application/json`, sent by every probe.
    pub fn json_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// JSON headers plus `Authorization: Bearer <token>`.
    pub fn bearer_headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = self.json_headers();
        let val = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("Access token is not a valid header value")?;
        headers.insert(AUTHORIZATION, val);
        Ok(headers)
    }

    /// Perform one request, print a summary and save the body to
    /// `output_file`. Returns `None` when no response arrived at all; any
    /// status code, error statuses included, comes back to the caller.
    pub fn send_and_print(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<&Value>,
        output_file: &Path,
    ) -> Option<ApiResponse> {
        ui::print_request(&method, url, body);
        debug!(%method, url, "sending request");

        let mut req = self.client.request(method.clone(), url).headers(headers);
        if let Some(b) = body {
            req = req.json(b);
        }

        let spinner = ui::spinner(&format!("{} {}", method, url));
        let sent = req.send().and_then(|res| {
            let status = res.status();
            let headers = res.headers().clone();
            res.text().map(|body| ApiResponse {
                status,
                headers,
                body,
            })
        });
        spinner.finish_and_clear();

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                ui::print_failure(&e);
                return None;
            }
        };

        ui::print_response(&response, self.show_headers);
        if let Err(e) = write_output(output_file, &response.body) {
            warn!(error = %e, "could not save response body");
        }
        Some(response)
    }
}

/// Save a response body, reformatting it when it is JSON.
pub fn write_output(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = match serde_json::from_str::<Value>(body) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => body.to_string(),
    };
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
