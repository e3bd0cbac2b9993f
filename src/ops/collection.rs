//! Collection-level operations

use super::{base, check};
use crate::common::{encode_path_segment, Result};
use crate::coordinator::broadcast::AggregateBroadcastResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionReport {
    pub collection: String,
    pub partitions: u32,
    pub replicas: usize,
    pub routing_required: bool,
}

#[derive(Debug, Serialize)]
struct CreateQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    partitions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replicas: Option<usize>,
    routing_required: bool,
}

#[derive(Debug, Deserialize)]
struct RebuildBody {
    #[serde(rename = "_shards")]
    shards: AggregateBroadcastResult,
}

pub async fn create_collection(
    coordinator_url: &str,
    collection: &str,
    partitions: Option<u32>,
    replicas: Option<usize>,
    routing_required: bool,
) -> Result<CollectionReport> {
    tracing::info!("Creating collection {}", collection);
    let response = reqwest::Client::new()
        .put(format!(
            "{}/{}",
            base(coordinator_url),
            encode_path_segment(collection)
        ))
        .query(&CreateQuery {
            partitions,
            replicas,
            routing_required,
        })
        .send()
        .await?;
    Ok(check(response).await?.json().await?)
}

/// Rebuild every partition of a collection.
///
/// Partition failures are returned inside the result, not as an error.
pub async fn rebuild_collection(
    coordinator_url: &str,
    collection: &str,
    timeout: Option<&str>,
) -> Result<AggregateBroadcastResult> {
    tracing::info!("Rebuilding collection {}", collection);
    let mut request = reqwest::Client::new().post(format!(
        "{}/{}/_rebuild",
        base(coordinator_url),
        encode_path_segment(collection)
    ));
    if let Some(timeout) = timeout {
        request = request.query(&[("timeout", timeout)]);
    }
    let body: RebuildBody = check(request.send().await?).await?.json().await?;
    Ok(body.shards)
}
