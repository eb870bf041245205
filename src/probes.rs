// Probes: each one sends a single request to the API, prints the answer
// and, on the expected status, stores the returned tokens or IDs so the
// next probe can pick them up from the secrets file.

use crate::api::{
    ApiClient, ApiResponse, AuthResponse, AuthTokens, LoginRequest, NewUserRequest,
    RefreshTokenRequest, UpdateUserRequest, UserPage, UserResponse,
};
use crate::config::{
    ConfigStore, Settings, ACCESS_TOKEN, REFRESH_TOKEN, TARGET_USER_ID, USER_ID,
};
use crate::{token, ui};
use anyhow::{Context, Result};
use clap::Subcommand;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "password123";

const REGISTER_FILE: &str = "1.auth_register";
const LOGIN_FILE: &str = "A2.auth_login";
const LOGOUT_FILE: &str = "3.auth_logout";
const REFRESH_FILE: &str = "A4.auth_refresh";
const CREATE_FILE: &str = "B1.user_create";
const GET_ALL_FILE: &str = "B2.user_get_all";
const GET_ONE_FILE: &str = "6.user_get_one";
const UPDATE_FILE: &str = "B4.user_update";
const DELETE_FILE: &str = "B5.user_delete";

/// Everything a probe needs: the HTTP client and the secrets file.
pub struct Harness {
    pub api: ApiClient,
    pub store: ConfigStore,
}

impl Harness {
    pub fn new(api: ApiClient, store: ConfigStore) -> Self {
        Harness { api, store }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api = ApiClient::new(&settings.base_url, &settings.out_dir)?
            .with_headers_shown(!settings.quiet);
        Ok(Harness::new(api, ConfigStore::new(&settings.secrets)))
    }

    fn access_token(&self) -> String {
        self.store.load_config(ACCESS_TOKEN).unwrap_or_default()
    }

    /// Stored id under `key`; an empty string counts as absent.
    fn stored_id(&self, key: &str) -> Option<String> {
        self.store.load_config(key).filter(|id| !id.is_empty())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .save_config(key, value)
            .with_context(|| format!("Failed to save {}", key))
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<&Value>,
        stem: &str,
    ) -> Option<ApiResponse> {
        let url = self.api.url(path);
        let output = self.api.output_path(stem);
        self.api.send_and_print(method, &url, headers, body, &output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Probe {
    /// POST /auth/register with the admin account and store its tokens.
    AuthRegister,
    /// POST /auth/login with the admin account and store its tokens.
    AuthLogin,
    /// POST /auth/logout with the stored refresh token.
    AuthLogout,
    /// POST /auth/refresh-tokens and store the new token pair.
    AuthRefresh,
    /// POST /users and store the new user as the target user.
    UserCreate,
    /// GET /users, first page of five.
    UserGetAll,
    /// GET /users/{id} for the target user, or the logged-in user.
    UserGetOne,
    /// PATCH /users/{id} on the target user.
    UserUpdate,
    /// DELETE /users/{id} on the target user.
    UserDelete,
    /// Register (or log in), then exercise every user endpoint and log out.
    RunAll,
    /// Print the secrets file with tokens masked.
    ShowConfig,
    /// Decode the claims of the stored access token.
    Claims,
}

impl Probe {
    pub const ALL: [Probe; 12] = [
        Probe::AuthRegister,
        Probe::AuthLogin,
        Probe::AuthLogout,
        Probe::AuthRefresh,
        Probe::UserCreate,
        Probe::UserGetAll,
        Probe::UserGetOne,
        Probe::UserUpdate,
        Probe::UserDelete,
        Probe::RunAll,
        Probe::ShowConfig,
        Probe::Claims,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Probe::AuthRegister => "Register (POST /auth/register)",
            Probe::AuthLogin => "Login (POST /auth/login)",
            Probe::AuthLogout => "Logout (POST /auth/logout)",
            Probe::AuthRefresh => "Refresh tokens (POST /auth/refresh-tokens)",
            Probe::UserCreate => "Create user (POST /users)",
            Probe::UserGetAll => "List users (GET /users)",
            Probe::UserGetOne => "Get user (GET /users/{id})",
            Probe::UserUpdate => "Update user (PATCH /users/{id})",
            Probe::UserDelete => "Delete user (DELETE /users/{id})",
            Probe::RunAll => "Run the whole sequence",
            Probe::ShowConfig => "Show stored secrets",
            Probe::Claims => "Decode access token",
        }
    }

    /// File name, minus `.json`, that receives the response body.
    pub fn output_stem(&self) -> Option<&'static str> {
        match self {
            Probe::AuthRegister => Some(REGISTER_FILE),
            Probe::AuthLogin => Some(LOGIN_FILE),
            Probe::AuthLogout => Some(LOGOUT_FILE),
            Probe::AuthRefresh => Some(REFRESH_FILE),
            Probe::UserCreate => Some(CREATE_FILE),
            Probe::UserGetAll => Some(GET_ALL_FILE),
            Probe::UserGetOne => Some(GET_ONE_FILE),
            Probe::UserUpdate => Some(UPDATE_FILE),
            Probe::UserDelete => Some(DELETE_FILE),
            Probe::RunAll | Probe::ShowConfig | Probe::Claims => None,
        }
    }

    pub fn run(&self, h: &Harness) -> Result<()> {
        match self {
            Probe::AuthRegister => auth_register(h).map(|_| ()),
            Probe::AuthLogin => auth_login(h).map(|_| ()),
            Probe::AuthLogout => auth_logout(h),
            Probe::AuthRefresh => auth_refresh(h),
            Probe::UserCreate => user_create(h),
            Probe::UserGetAll => user_get_all(h).map(|_| ()),
            Probe::UserGetOne => user_get_one(h),
            Probe::UserUpdate => user_update(h),
            Probe::UserDelete => user_delete(h),
            Probe::RunAll => run_all(h),
            Probe::ShowConfig => show_config(h),
            Probe::Claims => claims(h),
        }
    }
}

fn to_body<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).context("Serializing request body")
}

fn expected(response: Option<ApiResponse>, status: StatusCode) -> Option<ApiResponse> {
    response.filter(|r| r.status == status)
}

fn parse_or_warn<T: serde::de::DeserializeOwned>(response: &ApiResponse) -> Option<T> {
    match response.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            println!("[WARN] Unexpected response shape: {:#}", e);
            None
        }
    }
}

fn save_auth(h: &Harness, response: &ApiResponse) -> Result<bool> {
    let Some(auth) = parse_or_warn::<AuthResponse>(response) else {
        return Ok(false);
    };
    h.save(ACCESS_TOKEN, &auth.tokens.access.token)?;
    h.save(REFRESH_TOKEN, &auth.tokens.refresh.token)?;
    h.save(USER_ID, &auth.user.id.to_string())?;
    debug!(user_id = auth.user.id, "stored auth tokens");
    Ok(true)
}

/// Register the admin account. Returns whether tokens were stored.
pub fn auth_register(h: &Harness) -> Result<bool> {
    let payload = NewUserRequest {
        name: "Super Admin".into(),
        email: ADMIN_EMAIL.into(),
        password: ADMIN_PASSWORD.into(),
        role: "admin".into(),
    };
    let body = to_body(&payload)?;
    let response = h.send(
        Method::POST,
        "/auth/register",
        h.api.json_headers(),
        Some(&body),
        REGISTER_FILE,
    );

    let Some(response) = expected(response, StatusCode::CREATED) else {
        return Ok(false);
    };
    let saved = save_auth(h, &response)?;
    if saved {
        println!("\n[INFO] Tokens and User ID saved to {}", h.store.path().display());
    }
    Ok(saved)
}

/// Log in as the admin account. Returns whether tokens were stored.
pub fn auth_login(h: &Harness) -> Result<bool> {
    let payload = LoginRequest {
        email: ADMIN_EMAIL.into(),
        password: ADMIN_PASSWORD.into(),
    };
    let body = to_body(&payload)?;
    let response = h.send(
        Method::POST,
        "/auth/login",
        h.api.json_headers(),
        Some(&body),
        LOGIN_FILE,
    );

    let Some(response) = expected(response, StatusCode::OK) else {
        return Ok(false);
    };
    let saved = save_auth(h, &response)?;
    if saved {
        println!("\n[INFO] Tokens updated in {}", h.store.path().display());
    }
    Ok(saved)
}

fn refresh_body(h: &Harness) -> Result<Value> {
    to_body(&RefreshTokenRequest {
        refresh_token: h.store.load_config(REFRESH_TOKEN),
    })
}

pub fn auth_logout(h: &Harness) -> Result<()> {
    let body = refresh_body(h)?;
    h.send(
        Method::POST,
        "/auth/logout",
        h.api.json_headers(),
        Some(&body),
        LOGOUT_FILE,
    );
    Ok(())
}

pub fn auth_refresh(h: &Harness) -> Result<()> {
    let body = refresh_body(h)?;
    let response = h.send(
        Method::POST,
        "/auth/refresh-tokens",
        h.api.json_headers(),
        Some(&body),
        REFRESH_FILE,
    );

    let Some(response) = expected(response, StatusCode::OK) else {
        return Ok(());
    };
    if let Some(tokens) = parse_or_warn::<AuthTokens>(&response) {
        h.save(ACCESS_TOKEN, &tokens.access.token)?;
        h.save(REFRESH_TOKEN, &tokens.refresh.token)?;
        println!("\n[INFO] Tokens refreshed in {}", h.store.path().display());
    }
    Ok(())
}

pub fn user_create(h: &Harness) -> Result<()> {
    let payload = NewUserRequest {
        name: "John Doe".into(),
        email: "john.doe@example.com".into(),
        password: ADMIN_PASSWORD.into(),
        role: "user".into(),
    };
    let body = to_body(&payload)?;
    let headers = h.api.bearer_headers(&h.access_token())?;
    let response = h.send(
        Method::POST,
        "/users",
        headers,
        Some(&body),
        CREATE_FILE,
    );

    let Some(response) = expected(response, StatusCode::CREATED) else {
        return Ok(());
    };
    if let Some(user) = parse_or_warn::<UserResponse>(&response) {
        h.save(TARGET_USER_ID, &user.id.to_string())?;
        println!("\n[INFO] Target User ID saved to {}", h.store.path().display());
    }
    Ok(())
}

/// First page of five users, when the server answers 200 with a page.
pub fn user_get_all(h: &Harness) -> Result<Option<UserPage>> {
    let headers = h.api.bearer_headers(&h.access_token())?;
    let response = h.send(
        Method::GET,
        "/users?page=1&limit=5",
        headers,
        None,
        GET_ALL_FILE,
    );

    let Some(response) = expected(response, StatusCode::OK) else {
        return Ok(None);
    };
    let page = parse_or_warn::<UserPage>(&response);
    if let Some(page) = &page {
        println!(
            "\n[INFO] Page {} (limit {}): {} of {} users",
            page.page,
            page.limit,
            page.results.len(),
            page.total
        );
    }
    Ok(page)
}

/// Fetch the created user, falling back to the logged-in user.
pub fn user_get_one(h: &Harness) -> Result<()> {
    let Some(id) = h
        .stored_id(TARGET_USER_ID)
        .or_else(|| h.stored_id(USER_ID))
    else {
        println!("No user id stored. Run auth-login or user-create first.");
        return Ok(());
    };

    let headers = h.api.bearer_headers(&h.access_token())?;
    h.send(
        Method::GET,
        &format!("/users/{}", id),
        headers,
        None,
        GET_ONE_FILE,
    );
    Ok(())
}

pub fn user_update(h: &Harness) -> Result<()> {
    let Some(id) = h.stored_id(TARGET_USER_ID) else {
        println!("No target user to update. Run user-create first.");
        return Ok(());
    };

    let payload = UpdateUserRequest {
        name: Some("John Updated".into()),
        email: Some("john.updated@example.com".into()),
    };
    let body = to_body(&payload)?;
    let headers = h.api.bearer_headers(&h.access_token())?;
    h.send(
        Method::PATCH,
        &format!("/users/{}", id),
        headers,
        Some(&body),
        UPDATE_FILE,
    );
    Ok(())
}

/// Delete the target user. The stored id is left in place.
pub fn user_delete(h: &Harness) -> Result<()> {
    let Some(id) = h.stored_id(TARGET_USER_ID) else {
        println!("No target user to delete. Run user-create first.");
        return Ok(());
    };

    let headers = h.api.bearer_headers(&h.access_token())?;
    h.send(
        Method::DELETE,
        &format!("/users/{}", id),
        headers,
        None,
        DELETE_FILE,
    );
    Ok(())
}

/// Every step runs even when an earlier one failed.
pub fn run_all(h: &Harness) -> Result<()> {
    match auth_register(h) {
        Ok(true) => {}
        Ok(false) => {
            println!("Registration did not yield tokens, trying login.");
            report(Probe::AuthLogin, auth_login(h).map(|_| ()));
        }
        Err(e) => report(Probe::AuthRegister, Err(e)),
    }

    let steps = [
        Probe::UserCreate,
        Probe::UserGetAll,
        Probe::UserGetOne,
        Probe::UserUpdate,
        Probe::AuthRefresh,
        Probe::AuthLogout,
    ];
    for step in steps {
        report(step, step.run(h));
    }
    Ok(())
}

fn report(probe: Probe, result: Result<()>) {
    if let Err(e) = result {
        println!("{} failed: {:#}", probe.label(), e);
    }
}

/// Secrets file entries as printed by `show-config`, tokens masked.
pub fn masked_entries(h: &Harness) -> Result<Vec<(String, String)>> {
    let entries = h
        .store
        .entries()
        .with_context(|| format!("Reading {}", h.store.path().display()))?;

    Ok(entries
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let shown = if key.ends_with("_token") {
                ui::mask_secret(&text)
            } else {
                text
            };
            (key, shown)
        })
        .collect())
}

pub fn show_config(h: &Harness) -> Result<()> {
    let entries = masked_entries(h)?;
    if entries.is_empty() {
        println!("{} is empty or missing.", h.store.path().display());
        return Ok(());
    }

    println!("{}:", h.store.path().display());
    for (key, shown) in entries {
        println!("  {}: {}", key, shown);
    }
    Ok(())
}

/// Claims of the stored access token, `None` when no token is stored.
pub fn stored_claims(h: &Harness) -> Option<Result<Value, token::TokenError>> {
    h.store
        .load_config(ACCESS_TOKEN)
        .map(|access| token::decode_claims(&access))
}

pub fn claims(h: &Harness) -> Result<()> {
    match stored_claims(h) {
        None => println!("No access token stored. Run auth-login first."),
        Some(Ok(claims)) => println!("{}", ui::format_body(&claims.to_string())),
        Some(Err(e)) => println!("Could not decode access token: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_request_probe_has_a_distinct_output_file() {
        let stems: Vec<_> = Probe::ALL.iter().filter_map(|p| p.output_stem()).collect();
        assert_eq!(stems.len(), 9);
        let mut unique = stems.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), stems.len());
    }

    #[test]
    fn test_output_stems_keep_script_order_prefixes() {
        assert_eq!(Probe::AuthRegister.output_stem(), Some("1.auth_register"));
        assert_eq!(Probe::UserGetOne.output_stem(), Some("6.user_get_one"));
        assert_eq!(Probe::ShowConfig.output_stem(), None);
    }
}
