//! Collection metadata service
//!
//! Stores, per collection:
//! - partition count and copies per partition
//! - whether single-key operations must carry a routing value
//!
//! `create` is atomic: of two concurrent creators of the same collection,
//! exactly one succeeds and the other gets `Error::AlreadyExists`.

use crate::common::{timestamp_now_millis, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Collection metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,
    pub partitions: u32,
    pub replicas: usize,
    pub routing_required: bool,
    pub created_at: i64,
}

/// Parameters of a collection creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub partitions: u32,
    pub replicas: usize,
    #[serde(default)]
    pub routing_required: bool,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, partitions: u32, replicas: usize) -> Self {
        Self {
            name: name.into(),
            partitions,
            replicas,
            routing_required: false,
        }
    }

    pub fn with_routing_required(mut self, required: bool) -> Self {
        self.routing_required = required;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.starts_with('_') || self.name.contains('/') {
            return Err(crate::Error::InvalidRequest(format!(
                "invalid collection name [{}]",
                self.name
            )));
        }
        if self.partitions == 0 {
            return Err(crate::Error::InvalidRequest(
                "partitions must be >= 1".into(),
            ));
        }
        if self.replicas == 0 {
            return Err(crate::Error::InvalidRequest("replicas must be >= 1".into()));
        }
        Ok(())
    }

    fn into_metadata(self) -> CollectionMetadata {
        CollectionMetadata {
            name: self.name,
            partitions: self.partitions,
            replicas: self.replicas,
            routing_required: self.routing_required,
            created_at: timestamp_now_millis(),
        }
    }
}

/// Read/create access to collection metadata
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn get(&self, collection: &str) -> Result<Option<CollectionMetadata>>;

    async fn exists(&self, collection: &str) -> Result<bool> {
        Ok(self.get(collection).await?.is_some())
    }

    /// Create a collection; fails with `Error::AlreadyExists` if present.
    async fn create(&self, spec: CollectionSpec) -> Result<CollectionMetadata>;

    /// All collections, ordered by name
    async fn list(&self) -> Result<Vec<CollectionMetadata>>;
}

/// In-memory metadata store
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    collections: RwLock<BTreeMap<String, CollectionMetadata>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataService for MemoryMetadata {
    async fn get(&self, collection: &str) -> Result<Option<CollectionMetadata>> {
        Ok(self.collections.read().await.get(collection).cloned())
    }

    async fn create(&self, spec: CollectionSpec) -> Result<CollectionMetadata> {
        spec.validate()?;
        let mut collections = self.collections.write().await;
        if collections.contains_key(&spec.name) {
            return Err(crate::Error::AlreadyExists(spec.name));
        }
        let meta = spec.into_metadata();
        collections.insert(meta.name.clone(), meta.clone());
        Ok(meta)
    }

    async fn list(&self) -> Result<Vec<CollectionMetadata>> {
        Ok(self.collections.read().await.values().cloned().collect())
    }
}

#[cfg(feature = "rocksdb")]
pub use rocks::RocksMetadataStore;

#[cfg(feature = "rocksdb")]
mod rocks {
    use super::*;
    use rocksdb::{ColumnFamily, Options, DB};
    use std::path::Path;
    use std::sync::Mutex;

    const CF_COLLECTIONS: &str = "collections";

    /// Metadata store persisted in RocksDB
    pub struct RocksMetadataStore {
        db: DB,
        /// Serializes check-then-put in `create`
        create_lock: Mutex<()>,
    }

    impl RocksMetadataStore {
        /// Open or create metadata store
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            opts.create_missing_column_families(true);

            let db = DB::open_cf(&opts, path, vec![CF_COLLECTIONS])?;

            Ok(Self {
                db,
                create_lock: Mutex::new(()),
            })
        }

        fn cf(&self) -> Result<&ColumnFamily> {
            self.db
                .cf_handle(CF_COLLECTIONS)
                .ok_or_else(|| crate::Error::MetadataCorrupted("missing column family".into()))
        }

        fn read(&self, collection: &str) -> Result<Option<CollectionMetadata>> {
            match self.db.get_cf(self.cf()?, collection.as_bytes())? {
                Some(bytes) => {
                    let meta: CollectionMetadata = bincode::deserialize(&bytes)
                        .map_err(|e| crate::Error::MetadataCorrupted(e.to_string()))?;
                    Ok(Some(meta))
                }
                None => Ok(None),
            }
        }

        /// Flush to disk
        pub fn flush(&self) -> Result<()> {
            self.db.flush()?;
            Ok(())
        }
    }

    #[async_trait]
    impl MetadataService for RocksMetadataStore {
        async fn get(&self, collection: &str) -> Result<Option<CollectionMetadata>> {
            self.read(collection)
        }

        async fn create(&self, spec: CollectionSpec) -> Result<CollectionMetadata> {
            spec.validate()?;
            let _guard = self
                .create_lock
                .lock()
                .map_err(|_| crate::Error::Internal("metadata lock poisoned".into()))?;
            if self.read(&spec.name)?.is_some() {
                return Err(crate::Error::AlreadyExists(spec.name));
            }
            let meta = spec.into_metadata();
            let value = bincode::serialize(&meta)
                .map_err(|e| crate::Error::Internal(format!("Serialize error: {}", e)))?;
            self.db.put_cf(self.cf()?, meta.name.as_bytes(), value)?;
            Ok(meta)
        }

        async fn list(&self) -> Result<Vec<CollectionMetadata>> {
            let iter = self
                .db
                .iterator_cf(self.cf()?, rocksdb::IteratorMode::Start);

            let mut collections = Vec::new();
            for item in iter {
                let (_, value_bytes) = item?;
                let meta: CollectionMetadata = bincode::deserialize(&value_bytes)
                    .map_err(|e| crate::Error::MetadataCorrupted(e.to_string()))?;
                collections.push(meta);
            }

            Ok(collections)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_metadata_create_once() {
        let store = MemoryMetadata::new();
        assert!(!store.exists("articles").await.unwrap());

        let meta = store
            .create(CollectionSpec::new("articles", 3, 2))
            .await
            .unwrap();
        assert_eq!(meta.partitions, 3);
        assert!(!meta.routing_required);
        assert!(store.exists("articles").await.unwrap());

        let again = store.create(CollectionSpec::new("articles", 7, 1)).await;
        assert!(matches!(again, Err(crate::Error::AlreadyExists(name)) if name == "articles"));

        // First creation wins
        assert_eq!(store.get("articles").await.unwrap().unwrap().partitions, 3);
    }

    #[tokio::test]
    async fn test_invalid_specs_rejected() {
        let store = MemoryMetadata::new();
        assert!(store.create(CollectionSpec::new("", 1, 1)).await.is_err());
        assert!(store.create(CollectionSpec::new("_internal", 1, 1)).await.is_err());
        assert!(store.create(CollectionSpec::new("a", 0, 1)).await.is_err());
        assert!(store.create(CollectionSpec::new("a", 1, 0)).await.is_err());
        assert!(store.list().await.unwrap().is_empty());
    }
}
