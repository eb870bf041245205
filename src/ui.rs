// UI layer: terminal output for requests and responses, a spinner while a
// request is in flight, and an interactive menu built on `dialoguer`.

use crate::api::ApiResponse;
use crate::probes::{Harness, Probe};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::fmt::Display;
use std::time::Duration;

const RULE: &str = "------------------------------------------------------------";

/// Main interactive menu. Runs probes one at a time until "Exit" is chosen.
///
/// A failing probe is reported and the menu comes back, so a session can
/// carry on after a bad request.
pub fn main_menu(harness: &Harness) -> Result<()> {
    let mut items: Vec<&str> = Probe::ALL.iter().map(|p| p.label()).collect();
    items.push("Exit");

    loop {
        let selection = Select::new()
            .with_prompt("Probe")
            .items(&items)
            .default(0)
            .interact()?;
        match Probe::ALL.get(selection) {
            Some(probe) => {
                if let Err(e) = probe.run(harness) {
                    println!("{} failed: {:#}", probe.label(), e);
                }
            }
            None => break,
        }
    }
    Ok(())
}

/// Spinner shown on stderr while waiting for the server.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub fn print_request(method: &Method, url: &str, body: Option<&Value>) {
    println!("{}", RULE);
    println!("{} {}", method.as_str().bold(), url);
    if let Some(b) = body {
        println!("{}", pretty_json(b));
    }
}

pub fn print_response(response: &ApiResponse, show_headers: bool) {
    println!("{}", RULE);
    println!("Status: {}", status_line(response.status));
    if show_headers {
        println!("Headers:");
        for (name, value) in response.headers.iter() {
            println!("  {}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }
    println!("Body:");
    println!("{}", format_body(&response.body));
    println!("{}", RULE);
}

pub fn print_failure(err: &dyn Display) {
    println!("{} {}", "Request failed:".red(), err);
    println!("{}", RULE);
}

/// Status code colored by class: green for 2xx, yellow for 4xx, red for 5xx.
pub fn status_line(status: StatusCode) -> String {
    let text = status.to_string();
    if status.is_success() {
        text.green().to_string()
    } else if status.is_client_error() {
        text.yellow().to_string()
    } else if status.is_server_error() {
        text.red().to_string()
    } else {
        text
    }
}

/// Pretty JSON when the body parses, the raw text otherwise.
pub fn format_body(body: &str) -> String {
    if body.trim().is_empty() {
        return "<empty>".to_string();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(json) => pretty_json(&json),
        Err(_) => body.to_string(),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// First eight characters of a secret followed by `...`.
pub fn mask_secret(value: &str) -> String {
    if value.chars().count() <= 8 {
        return value.to_string();
    }
    let head: String = value.chars().take(8).collect();
    format!("{}...", head)
}
