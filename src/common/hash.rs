//! Hashing utilities for minidoc
//!
//! - Partition routing: BLAKE3 of the routing value, modulo the partition count
//! - HRW (Highest Random Weight) for copy placement

/// First 8 bytes of BLAKE3(data) as a little-endian u64
fn blake3_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(prefix)
}

/// Compute the partition for a routing value.
///
/// Stable for a given partition count; changing the count remaps keys.
pub fn shard_key(routing: &str, num_partitions: u32) -> u32 {
    debug_assert!(num_partitions > 0);
    (blake3_u64(routing.as_bytes()) % u64::from(num_partitions)) as u32
}

/// HRW (Highest Random Weight) hashing for copy placement
///
/// Given a key and a set of nodes, returns nodes sorted by their weight
/// (deterministic based on key). This ensures consistent placement even
/// as the cluster changes.
pub fn hrw_hash(key: &str, nodes: &[String]) -> Vec<String> {
    let mut weights: Vec<(String, u64)> = nodes
        .iter()
        .map(|node| {
            let combined = format!("{}{}", key, node);
            (node.clone(), blake3_u64(combined.as_bytes()))
        })
        .collect();

    // Sort by weight (descending), node id breaks ties
    weights.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    weights.into_iter().map(|(node, _)| node).collect()
}

/// Select N nodes using HRW hashing
pub fn select_replicas(key: &str, nodes: &[String], n: usize) -> Vec<String> {
    let sorted = hrw_hash(key, nodes);
    sorted.into_iter().take(n).collect()
}
