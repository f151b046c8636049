//! HTTP transport for the extract endpoints.
//!
//! The [`HttpClient`] trait is the seam the pipeline is generic over, so
//! tests can stand in a canned client without touching the network.

mod basic;
mod client;
mod url_param;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use url_param::UrlParam;

use crate::table::Table;
use anyhow::{Context, Result, bail};
use tracing::debug;

/// Issues a GET and returns the response body.
///
/// A non-success status is an error; there is no retry.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url} returned status {status}");
    }

    let bytes = resp.bytes().await?.to_vec();
    debug!(url, bytes = bytes.len(), "Response body received");
    Ok(bytes)
}

/// Fetches a URL and parses the body as a CSV [`Table`].
pub async fn fetch_csv<C: HttpClient>(client: &C, url: &str) -> Result<Table> {
    let bytes = fetch_bytes(client, url).await?;
    Table::from_csv_bytes(&bytes).with_context(|| format!("invalid CSV payload from {url}"))
}
