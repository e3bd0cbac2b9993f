//! Index and delete single documents

use super::{base, check};
use crate::common::{encode_path_segment, ConsistencyLevel, Result, VersionType};
use crate::coordinator::consistency::ShardInfo;
use serde::{Deserialize, Serialize};

/// Optional parameters of a single-key write
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<ConsistencyLevel>,
    /// Duration string, e.g. `30s`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_type: Option<VersionType>,
}

/// Acknowledged write as reported by the coordinator
#[derive(Debug, Clone, Deserialize)]
pub struct WriteReport {
    #[serde(rename = "_index")]
    pub collection: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(rename = "_seq_no")]
    pub seq_no: u64,
    #[serde(rename = "_primary")]
    pub primary: String,
    #[serde(rename = "_shard")]
    pub shard: u32,
    pub result: String,
    #[serde(rename = "_shards")]
    pub shards: ShardInfo,
}

fn doc_url(coordinator_url: &str, collection: &str, id: &str) -> String {
    format!(
        "{}/{}/_doc/{}",
        base(coordinator_url),
        encode_path_segment(collection),
        encode_path_segment(id)
    )
}

pub async fn index_document(
    coordinator_url: &str,
    collection: &str,
    id: &str,
    source: &serde_json::Value,
    options: &WriteOptions,
) -> Result<WriteReport> {
    tracing::debug!("Indexing {}/{}", collection, id);
    let response = reqwest::Client::new()
        .put(doc_url(coordinator_url, collection, id))
        .query(options)
        .json(source)
        .send()
        .await?;
    Ok(check(response).await?.json().await?)
}

/// Delete a document; a missing document is reported with result `not_found`
pub async fn delete_document(
    coordinator_url: &str,
    collection: &str,
    id: &str,
    options: &WriteOptions,
) -> Result<WriteReport> {
    tracing::debug!("Deleting {}/{}", collection, id);
    let response = reqwest::Client::new()
        .delete(doc_url(coordinator_url, collection, id))
        .query(options)
        .send()
        .await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        // Either a missing document (write body) or a missing collection (error body)
        let text = response.text().await?;
        return serde_json::from_str(&text)
            .map_err(|_| crate::Error::Http(format!("404 Not Found {}", text)));
    }
    Ok(check(response).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_url_encodes_segments() {
        assert_eq!(
            doc_url("http://localhost:5000/", "logs", "a/b c"),
            "http://localhost:5000/logs/_doc/a%2Fb%20c"
        );
    }

    #[test]
    fn test_write_options_query() {
        let options = WriteOptions {
            routing: Some("tenant-1".into()),
            consistency: Some(ConsistencyLevel::All),
            version_type: Some(VersionType::ExternalGte),
            version: Some(4),
            ..WriteOptions::default()
        };
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["consistency"], "all");
        assert_eq!(value["version_type"], "external_gte");
        assert!(value.get("timeout").is_none());
    }

    #[test]
    fn test_write_report_parses_response() {
        let body = serde_json::json!({
            "_index": "logs",
            "_id": "1",
            "_version": 2,
            "_seq_no": 9,
            "_primary": "node-1",
            "_shard": 3,
            "result": "updated",
            "_shards": { "total": 3, "successful": 2, "failed": 0, "failures": [] },
        });
        let report: WriteReport = serde_json::from_value(body).unwrap();
        assert_eq!(report.version, 2);
        assert_eq!(report.shards.total, 3);
        assert_eq!(report.result, "updated");
    }
}
