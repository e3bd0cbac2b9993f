//! Auto-provisioning of collections on first write
//!
//! The existence check and the create are not serialized: two requests for a
//! new collection may both try to create it. The loser gets
//! `Error::AlreadyExists` from the metadata service and carries on with the
//! winner's collection as if it had created it.

use crate::common::{CoordinatorMetrics, Result};
use crate::coordinator::metadata::{CollectionMetadata, CollectionSpec, MetadataService};
use std::str::FromStr;
use std::sync::Arc;

/// One entry of a pattern list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    allow: bool,
    pattern: String,
}

/// Which collections may be created on demand.
///
/// Parsed from `"true"`, `"false"`, or a comma-separated list of patterns
/// such as `"+logs-*,-secret*,metrics"`. Patterns may contain `*`. A leading
/// `-` denies, `+` or nothing allows; the first matching pattern decides and
/// a name matching none is denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoCreatePolicy {
    Always,
    Never,
    Patterns(Vec<Rule>),
}

impl AutoCreatePolicy {
    pub fn allows(&self, collection: &str) -> bool {
        match self {
            AutoCreatePolicy::Always => true,
            AutoCreatePolicy::Never => false,
            AutoCreatePolicy::Patterns(rules) => rules
                .iter()
                .find(|r| wildcard_match(&r.pattern, collection))
                .map(|r| r.allow)
                .unwrap_or(false),
        }
    }
}

impl FromStr for AutoCreatePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "true" => return Ok(AutoCreatePolicy::Always),
            "false" => return Ok(AutoCreatePolicy::Never),
            _ => {}
        }

        let mut rules = Vec::new();
        for part in s.split(',').map(str::trim) {
            let (allow, pattern) = match part.chars().next() {
                Some('+') => (true, &part[1..]),
                Some('-') => (false, &part[1..]),
                _ => (true, part),
            };
            if pattern.is_empty() {
                return Err(crate::Error::InvalidConfig(format!(
                    "empty pattern in auto_create [{}]",
                    s
                )));
            }
            rules.push(Rule {
                allow,
                pattern: pattern.to_string(),
            });
        }
        Ok(AutoCreatePolicy::Patterns(rules))
    }
}

/// Glob match supporting `*` only
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if name.len() < first.len() + last.len() || !name.starts_with(first) || !name.ends_with(last)
    {
        return false;
    }
    let mut rest = &name[first.len()..name.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(pos) => rest = &rest[pos + middle.len()..],
            None => return false,
        }
    }
    true
}

/// Proof that a collection existed when the request was admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredCollection {
    pub metadata: CollectionMetadata,
    /// This request's create call is the one that made the collection
    pub created: bool,
}

/// Ensures the target collection exists before routing
pub struct ProvisionGuard {
    metadata: Arc<dyn MetadataService>,
    policy: AutoCreatePolicy,
    default_partitions: u32,
    default_replicas: usize,
    metrics: Arc<CoordinatorMetrics>,
}

impl ProvisionGuard {
    pub fn new(
        metadata: Arc<dyn MetadataService>,
        policy: AutoCreatePolicy,
        default_partitions: u32,
        default_replicas: usize,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            metadata,
            policy,
            default_partitions,
            default_replicas,
            metrics,
        }
    }

    pub async fn ensure_collection(&self, collection: &str) -> Result<EnsuredCollection> {
        if let Some(metadata) = self.metadata.get(collection).await? {
            return Ok(EnsuredCollection {
                metadata,
                created: false,
            });
        }

        if !self.policy.allows(collection) {
            return Err(crate::Error::CollectionNotFound(collection.to_string()));
        }

        let spec = CollectionSpec::new(collection, self.default_partitions, self.default_replicas);
        match self.metadata.create(spec).await {
            Ok(metadata) => {
                self.metrics.collections_created.inc();
                tracing::info!(
                    "Auto-created collection [{}] ({} partitions, {} copies)",
                    collection,
                    metadata.partitions,
                    metadata.replicas
                );
                Ok(EnsuredCollection {
                    metadata,
                    created: true,
                })
            }
            Err(crate::Error::AlreadyExists(_)) => {
                self.metrics.provisioning_races.inc();
                tracing::debug!("Collection [{}] created concurrently", collection);
                let metadata = self.metadata.get(collection).await?.ok_or_else(|| {
                    crate::Error::Internal(format!(
                        "collection [{}] reported as existing but not found",
                        collection
                    ))
                })?;
                Ok(EnsuredCollection {
                    metadata,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }
}
