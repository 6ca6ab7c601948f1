//! Bucket set owned by the background worker context
//!
//! Install populates a bucket only once every manifest resource has been
//! fetched successfully. Activate deletes every bucket but the current one.

use crate::cache::bucket::{BucketName, CacheBucket};
use crate::cache::manifest::PrecacheManifest;
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::{Network, Response};
use futures_util::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// The set of named cache buckets for one origin
///
/// Cloning yields another handle to the same set.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    buckets: Arc<RwLock<BTreeMap<String, CacheBucket>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the whole manifest and commit it to `name` in one write
    ///
    /// Any unreachable resource or non-success status fails the install before
    /// anything is written, so a failed install never leaves a partial bucket.
    pub async fn install(
        &self,
        name: &BucketName,
        manifest: &PrecacheManifest,
        origin: &Url,
        network: &dyn Network,
    ) -> SwgateResult<usize> {
        let requests = manifest.requests(origin)?;
        debug!("Precaching {} resources into {}", requests.len(), name);

        let fetched = try_join_all(requests.iter().map(|request| async move {
            let response =
                network
                    .fetch(request)
                    .await
                    .map_err(|e| SwgateError::PrecacheFailed {
                        resource: request.url.path().to_string(),
                        reason: e.to_string(),
                    })?;
            if !response.is_success() {
                return Err(SwgateError::PrecacheFailed {
                    resource: request.url.path().to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok((request.cache_key(), response))
        }))
        .await?;

        let count = fetched.len();
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(name.to_string())
            .or_insert_with(|| CacheBucket::new(name.clone(), Some(manifest.digest())));
        for (key, response) in fetched {
            bucket.insert(key, response);
        }

        info!("Installed {} ({} resources)", name, count);
        Ok(count)
    }

    /// Delete every bucket whose name differs from `current`
    ///
    /// Returns the deleted names. Running it again deletes nothing.
    pub async fn activate(&self, current: &BucketName) -> SwgateResult<Vec<String>> {
        let current = current.to_string();
        let mut buckets = self.buckets.write().await;
        if !buckets.contains_key(&current) {
            return Err(SwgateError::BucketNotFound(current));
        }

        let stale: Vec<String> = buckets
            .keys()
            .filter(|name| **name != current)
            .cloned()
            .collect();
        for name in &stale {
            buckets.remove(name);
            info!("Deleted stale cache bucket {}", name);
        }

        Ok(stale)
    }

    /// Exact-key lookup in one bucket
    pub async fn lookup(&self, bucket: &BucketName, key: &str) -> Option<Response> {
        let buckets = self.buckets.read().await;
        buckets
            .get(&bucket.to_string())
            .and_then(|b| b.get(key))
            .map(|stored| stored.response.clone())
    }

    /// Store a response in an existing bucket
    ///
    /// Returns false when the bucket is gone; a deleted bucket is never recreated
    /// by a late write.
    pub async fn put(&self, bucket: &BucketName, key: String, response: Response) -> bool {
        let mut buckets = self.buckets.write().await;
        match buckets.get_mut(&bucket.to_string()) {
            Some(b) => {
                b.insert(key, response);
                true
            }
            None => {
                debug!("Dropping write for {}: bucket {} no longer exists", key, bucket);
                false
            }
        }
    }

    /// Names of all buckets, sorted
    pub async fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().await.keys().cloned().collect()
    }

    pub async fn contains(&self, bucket: &BucketName) -> bool {
        self.buckets.read().await.contains_key(&bucket.to_string())
    }

    /// Copy of one bucket
    pub async fn snapshot(&self, bucket: &BucketName) -> Option<CacheBucket> {
        self.buckets.read().await.get(&bucket.to_string()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryNetwork;

    fn origin() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    fn site(version: u32) -> MemoryNetwork {
        let manifest = PrecacheManifest::default();
        MemoryNetwork::serving(&origin(), manifest.entries(), version).unwrap()
    }

    async fn installed(store: &CacheStore, version: u32) -> BucketName {
        let name = BucketName::new("jobboard", version);
        store
            .install(&name, &PrecacheManifest::default(), &origin(), &site(version))
            .await
            .unwrap();
        name
    }

    #[tokio::test]
    async fn install_populates_bucket() {
        let store = CacheStore::new();
        let name = installed(&store, 1).await;

        let bucket = store.snapshot(&name).await.unwrap();
        assert_eq!(bucket.len(), 4);
        assert!(bucket.contains("http://localhost:3000/static/css/main.css"));
        assert_eq!(
            bucket.manifest_digest,
            Some(PrecacheManifest::default().digest())
        );
    }

    #[tokio::test]
    async fn install_is_all_or_nothing() {
        for missing in PrecacheManifest::default().entries() {
            let store = CacheStore::new();
            let network = site(1);
            network.set_reachable(origin().join(missing).unwrap().as_str(), false);

            let name = BucketName::new("jobboard", 1);
            let err = store
                .install(&name, &PrecacheManifest::default(), &origin(), &network)
                .await
                .unwrap_err();

            assert!(matches!(err, SwgateError::PrecacheFailed { .. }));
            assert!(store.bucket_names().await.is_empty(), "{} left a bucket", missing);
        }
    }

    #[tokio::test]
    async fn install_rejects_error_status() {
        let store = CacheStore::new();
        let network = site(1);
        network.serve("http://localhost:3000/manifest.json", 500, "boom");

        let err = store
            .install(
                &BucketName::new("jobboard", 1),
                &PrecacheManifest::default(),
                &origin(),
                &network,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("status 500"));
        assert!(store.bucket_names().await.is_empty());
    }

    #[tokio::test]
    async fn failed_install_leaves_existing_version_untouched() {
        let store = CacheStore::new();
        let v1 = installed(&store, 1).await;
        let before = store.snapshot(&v1).await.unwrap();

        let network = site(2);
        network.set_offline(true);
        assert!(store
            .install(&v1.next().unwrap(), &PrecacheManifest::default(), &origin(), &network)
            .await
            .is_err());

        assert_eq!(store.bucket_names().await, vec!["jobboard-v1".to_string()]);
        let after = store.snapshot(&v1).await.unwrap();
        assert_eq!(before.len(), after.len());
    }

    #[tokio::test]
    async fn install_new_version_keeps_old_bucket() {
        let store = CacheStore::new();
        let v1 = installed(&store, 1).await;
        let v1_root = store.lookup(&v1, "http://localhost:3000/").await.unwrap();

        let v2 = installed(&store, 2).await;

        assert_eq!(store.bucket_names().await, vec!["jobboard-v1", "jobboard-v2"]);
        assert_eq!(store.lookup(&v1, "http://localhost:3000/").await.unwrap(), v1_root);
        assert_eq!(
            store.lookup(&v2, "http://localhost:3000/").await.unwrap().body,
            b"/ (v2)"
        );
    }

    #[tokio::test]
    async fn activate_deletes_other_buckets() {
        let store = CacheStore::new();
        installed(&store, 1).await;
        let v2 = installed(&store, 2).await;

        let deleted = store.activate(&v2).await.unwrap();

        assert_eq!(deleted, vec!["jobboard-v1".to_string()]);
        assert_eq!(store.bucket_names().await, vec!["jobboard-v2".to_string()]);
    }

    #[tokio::test]
    async fn activate_is_idempotent() {
        let store = CacheStore::new();
        installed(&store, 1).await;
        let v2 = installed(&store, 2).await;

        store.activate(&v2).await.unwrap();
        let names = store.bucket_names().await;
        let deleted = store.activate(&v2).await.unwrap();

        assert!(deleted.is_empty());
        assert_eq!(store.bucket_names().await, names);
    }

    #[tokio::test]
    async fn activate_single_bucket_is_noop() {
        let store = CacheStore::new();
        let v1 = installed(&store, 1).await;

        assert!(store.activate(&v1).await.unwrap().is_empty());
        assert!(store.contains(&v1).await);
    }

    #[tokio::test]
    async fn activate_missing_current_deletes_nothing() {
        let store = CacheStore::new();
        let v1 = installed(&store, 1).await;

        let err = store.activate(&v1.next().unwrap()).await.unwrap_err();

        assert!(matches!(err, SwgateError::BucketNotFound(_)));
        assert!(store.contains(&v1).await);
    }

    #[tokio::test]
    async fn put_into_deleted_bucket_is_dropped() {
        let store = CacheStore::new();
        let v1 = installed(&store, 1).await;
        let v2 = installed(&store, 2).await;
        store.activate(&v2).await.unwrap();

        let url = origin().join("/jobs").unwrap();
        let written = store
            .put(&v1, url.to_string(), Response::new(url, 200, "jobs"))
            .await;

        assert!(!written);
        assert!(!store.contains(&v1).await);
    }
}
