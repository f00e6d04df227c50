mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};
use tracing::debug;

/// Issues a GET for `url` with `query` appended and returns the body.
///
/// # Errors
///
/// Fails on transport errors and on any non-success status, including the
/// response body in the message.
pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    url: &str,
    query: &[(&str, String)],
) -> Result<Vec<u8>> {
    let url = reqwest::Url::parse_with_params(url, query)?;
    debug!(url = %url, "GET");
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    let body = resp.bytes().await?;

    if !status.is_success() {
        bail!(
            "request failed with status {}: {}",
            status,
            String::from_utf8_lossy(&body)
        );
    }

    Ok(body.to_vec())
}
