//! Client-side operations against a running coordinator
//!
//! Used by the `minidoc` CLI. Each call maps to one public HTTP endpoint and
//! returns a typed report.

pub mod collection;
pub mod document;

pub use collection::{create_collection, rebuild_collection, CollectionReport};
pub use document::{delete_document, index_document, WriteOptions, WriteReport};

use crate::common::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    reason: String,
}

/// Turn a non-success response into an error carrying the coordinator's reason
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await?;
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => format!("{} {}: {}", status, body.error.kind, body.error.reason),
        Err(_) => format!("{} {}", status, text),
    };
    Err(crate::Error::Http(message))
}

fn base(coordinator_url: &str) -> &str {
    coordinator_url.trim_end_matches('/')
}
