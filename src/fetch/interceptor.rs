//! Cache-first fetch policy
//!
//! Hits are served from the worker's own bucket without revalidation.
//! Misses go to the network; a same-origin success is written back after the
//! response has been handed to the caller.

use crate::cache::{BucketName, CacheStore};
use crate::error::SwgateResult;
use crate::fetch::network::Network;
use crate::fetch::request::{Request, Response};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// Network failed and the configured fallback entry was served
    OfflineFallback,
}

/// Response handed back to the foreground context
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
}

/// A cache write deferred until after the response has been delivered
#[must_use = "a deferred cache write does nothing until committed"]
pub struct CacheWrite {
    store: CacheStore,
    bucket: BucketName,
    key: String,
    response: Response,
}

impl CacheWrite {
    /// Store the cloned response; false if the bucket has been deleted since
    pub async fn commit(self) -> bool {
        self.store.put(&self.bucket, self.key, self.response).await
    }
}

/// Per-request cache-first/network-fallback policy over one bucket
#[derive(Clone)]
pub struct FetchInterceptor {
    store: CacheStore,
    bucket: BucketName,
    origin: url::Origin,
    network: Arc<dyn Network>,
    offline_fallback: Option<String>,
}

impl FetchInterceptor {
    pub fn new(
        store: CacheStore,
        bucket: BucketName,
        origin: &Url,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            store,
            bucket,
            origin: origin.origin(),
            network,
            offline_fallback: None,
        }
    }

    /// Serve the cache key of `entry` when a GET miss cannot reach the network
    pub fn with_offline_fallback(mut self, entry: Option<String>, origin: &Url) -> Self {
        self.offline_fallback = entry
            .and_then(|path| origin.join(&path).ok())
            .map(|url| Request::get(url).cache_key());
        self
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// Whether a network response may be written to the cache
    ///
    /// Opaque, cross-origin or failed responses would poison later reads.
    /// Partial content (206) is never a complete resource.
    pub fn should_cache(&self, response: &Response) -> bool {
        if response.is_opaque() || response.status == 206 {
            return false;
        }
        response.is_same_origin(&self.origin) && response.is_success()
    }

    /// Resolve a request, returning the outcome and any write still owed to the cache
    pub async fn intercept(
        &self,
        request: &Request,
    ) -> SwgateResult<(FetchOutcome, Option<CacheWrite>)> {
        if !request.is_cacheable() {
            let response = self.network.fetch(request).await?;
            let outcome = FetchOutcome {
                response,
                source: ResponseSource::Network,
            };
            return Ok((outcome, None));
        }

        let key = request.cache_key();
        if let Some(response) = self.store.lookup(&self.bucket, &key).await {
            debug!("Cache hit in {}: {}", self.bucket, key);
            let outcome = FetchOutcome {
                response,
                source: ResponseSource::Cache,
            };
            return Ok((outcome, None));
        }

        debug!("Cache miss in {}: {}", self.bucket, key);
        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => return self.offline(e).await.map(|outcome| (outcome, None)),
        };

        let write = if self.should_cache(&response) {
            Some(CacheWrite {
                store: self.store.clone(),
                bucket: self.bucket.clone(),
                key,
                response: response.clone(),
            })
        } else {
            debug!(
                "Not caching {} (status {})",
                response.url, response.status
            );
            None
        };

        let outcome = FetchOutcome {
            response,
            source: ResponseSource::Network,
        };
        Ok((outcome, write))
    }

    /// Resolve a request and commit any cache write right after
    pub async fn handle(&self, request: &Request) -> SwgateResult<FetchOutcome> {
        let (outcome, write) = self.intercept(request).await?;
        if let Some(write) = write {
            write.commit().await;
        }
        Ok(outcome)
    }

    async fn offline(&self, error: crate::SwgateError) -> SwgateResult<FetchOutcome> {
        let Some(key) = &self.offline_fallback else {
            return Err(error);
        };
        match self.store.lookup(&self.bucket, key).await {
            Some(response) => {
                warn!("Network unavailable, serving offline fallback: {}", error);
                Ok(FetchOutcome {
                    response,
                    source: ResponseSource::OfflineFallback,
                })
            }
            None => Err(error),
        }
    }
}
