//! Versioned offline cache
//!
//! Buckets are named `{app}-v{n}` and only ever written by the background
//! worker context. Foreground contexts read through the fetch interceptor.
//!
//! # Bucket Lifecycle
//!
//! | Step | Effect |
//! |------|--------|
//! | install | whole manifest fetched, bucket committed in one write or not at all |
//! | activate | every other bucket deleted; repeated runs are no-ops |
//! | fetch | hits served from the worker's own bucket, misses written after responding |

pub mod bucket;
pub mod manifest;
pub mod store;

pub use bucket::{format_bytes, BucketName, CacheBucket, StoredResponse};
pub use manifest::{PrecacheManifest, DEFAULT_PRECACHE};
pub use store::CacheStore;
