// Library root
// -----------
// The binary (`main.rs`) is a thin shell over these modules, which keeps
// the probes callable from integration tests.
//
// Module responsibilities:
// - `api`: sends one HTTP request, prints it and saves the body to disk.
// - `config`: CLI settings and the JSON secrets file shared between runs.
// - `probes`: one function per endpoint exercised against the API.
// - `token`: read-only decoding of the stored access token.
// - `ui`: response printing, spinners and the interactive probe menu.
pub mod api;
pub mod config;
pub mod probes;
pub mod token;
pub mod ui;

/// Install the stderr log subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("api_probe={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
