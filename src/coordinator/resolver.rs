//! Partition resolution for single-key operations
//!
//! Resolution depends only on the collection metadata (partition count and
//! the required-routing flag), so it runs before any topology or copy call
//! and a caller error never reaches the remote tier.

use crate::common::{shard_key, PartitionId, Result, VersionType};
use crate::coordinator::metadata::CollectionMetadata;

/// Map a record to the partition of `collection` that owns it.
///
/// The routing value, when present, replaces the id as the shard key.
/// Checks, in order:
/// - the id must not be empty
/// - a non-internal version type with a missing required routing value is
///   rejected as `UnsupportedCombination`
/// - a missing required routing value is rejected as `RoutingRequired`
pub fn resolve(
    collection: &CollectionMetadata,
    id: &str,
    routing: Option<&str>,
    version_type: VersionType,
) -> Result<PartitionId> {
    if id.is_empty() {
        return Err(crate::Error::InvalidRequest(format!(
            "document id must not be empty in [{}]",
            collection.name
        )));
    }

    let routing = routing.filter(|r| !r.is_empty());
    if collection.routing_required && routing.is_none() {
        if version_type != VersionType::Internal {
            return Err(crate::Error::UnsupportedCombination {
                collection: collection.name.clone(),
                id: id.to_string(),
                version_type: version_type.to_string(),
            });
        }
        return Err(crate::Error::RoutingRequired {
            collection: collection.name.clone(),
            id: id.to_string(),
        });
    }

    if collection.partitions == 0 {
        return Err(crate::Error::InvalidConfig(format!(
            "collection [{}] has no partitions",
            collection.name
        )));
    }

    let shard = shard_key(routing.unwrap_or(id), collection.partitions);
    Ok(PartitionId::new(collection.name.clone(), shard))
}
