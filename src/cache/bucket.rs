//! Versioned cache buckets
//!
//! A bucket is named `{app}-v{n}`. The version token only ever grows, so a
//! newer deploy never collides with the bucket an older worker is serving from.

use crate::error::SwgateError;
use crate::fetch::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of a versioned cache bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketName {
    /// Application name prefix
    pub app: String,
    /// Monotonically increasing version token
    pub version: u32,
}

impl BucketName {
    pub fn new(app: impl Into<String>, version: u32) -> Self {
        Self {
            app: app.into(),
            version,
        }
    }

    /// Bucket name of the next deploy
    pub fn next(&self) -> Result<Self, SwgateError> {
        let version = self
            .version
            .checked_add(1)
            .ok_or_else(|| SwgateError::InvalidBucketName(format!("{} has no successor", self)))?;
        Ok(Self::new(self.app.clone(), version))
    }

    /// Whether this bucket supersedes `other` for the same app
    pub fn supersedes(&self, other: &BucketName) -> bool {
        self.app == other.app && self.version > other.version
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.app, self.version)
    }
}

impl FromStr for BucketName {
    type Err = SwgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SwgateError::InvalidBucketName(s.to_string());

        let (app, version) = s.rsplit_once("-v").ok_or_else(invalid)?;
        if app.is_empty() || version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let version = version.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self::new(app, version))
    }
}

/// A response held in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

/// A named collection of cached request/response pairs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBucket {
    pub name: BucketName,
    /// Digest of the manifest this bucket was populated from
    pub manifest_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    entries: BTreeMap<String, StoredResponse>,
}

impl CacheBucket {
    /// Create an empty bucket
    pub fn new(name: BucketName, manifest_digest: Option<String>) -> Self {
        Self {
            name,
            manifest_digest,
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// Store a response under a cache key, replacing any previous entry
    pub fn insert(&mut self, key: String, response: Response) {
        self.entries.insert(
            key,
            StoredResponse {
                response,
                stored_at: Utc::now(),
            },
        );
    }

    /// Exact-key lookup
    pub fn get(&self, key: &str) -> Option<&StoredResponse> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Cached keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total body bytes held by the bucket
    pub fn size_bytes(&self) -> u64 {
        self.entries
            .values()
            .map(|e| e.response.body.len() as u64)
            .sum()
    }
}

/// Format bytes as human-readable size (e.g., "1.5 KB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn bucket_name_display() {
        assert_eq!(BucketName::new("jobboard", 3).to_string(), "jobboard-v3");
    }

    #[test]
    fn bucket_name_parse() {
        let name: BucketName = "jobboard-v12".parse().unwrap();
        assert_eq!(name, BucketName::new("jobboard", 12));

        // Only the last -v separates app and version
        let name: BucketName = "my-video-app-v2".parse().unwrap();
        assert_eq!(name.app, "my-video-app");
        assert_eq!(name.version, 2);
    }

    #[test]
    fn bucket_name_parse_rejects_garbage() {
        for bad in ["jobboard", "-v1", "jobboard-v", "jobboard-vx", "jobboard-v+1"] {
            assert!(bad.parse::<BucketName>().is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn bucket_name_supersedes() {
        let v1 = BucketName::new("jobboard", 1);
        let v2 = v1.next().unwrap();
        assert!(v2.supersedes(&v1));
        assert!(!v1.supersedes(&v2));
        assert!(!BucketName::new("other", 9).supersedes(&v1));
    }

    #[test]
    fn last_version_has_no_successor() {
        let last = BucketName::new("jobboard", u32::MAX);
        let err = last.next().unwrap_err();
        assert!(matches!(err, SwgateError::InvalidBucketName(_)));
        assert!(err.to_string().contains("jobboard-v4294967295 has no successor"));
    }

    #[test]
    fn bucket_insert_and_get() {
        let mut bucket = CacheBucket::new(BucketName::new("jobboard", 1), None);
        let url = Url::parse("http://localhost:3000/").unwrap();
        bucket.insert(url.to_string(), Response::new(url.clone(), 200, "<html>"));

        assert_eq!(bucket.len(), 1);
        assert!(bucket.contains("http://localhost:3000/"));
        assert_eq!(bucket.size_bytes(), 6);
        assert!(bucket.get("http://localhost:3000/other").is_none());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.0 MB");
    }
}
