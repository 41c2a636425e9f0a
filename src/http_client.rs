use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Process-wide client with the default request timeout.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("momentum_predictor/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")
}
