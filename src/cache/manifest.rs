//! Precache manifest and its content digest
//!
//! The manifest is the fixed list of resources that must be cached during
//! install. Its digest changes whenever the list changes, which is the signal
//! that the bucket version has to be bumped.

use crate::error::{SwgateError, SwgateResult};
use crate::fetch::Request;
use sha2::{Digest, Sha256};
use url::Url;

/// Resources cached by default
pub const DEFAULT_PRECACHE: [&str; 4] = [
    "/",
    "/static/js/bundle.js",
    "/static/css/main.css",
    "/manifest.json",
];

/// The list of resources guaranteed to be cached on install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    entries: Vec<String>,
}

impl PrecacheManifest {
    /// Create a manifest, dropping duplicate entries
    pub fn new(entries: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.contains(&entry) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    /// Manifest entries in declaration order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    /// Entries must be root-relative paths
    pub fn validate(&self) -> SwgateResult<()> {
        if self.entries.is_empty() {
            return Err(SwgateError::InvalidManifest(
                "manifest has no entries".to_string(),
            ));
        }
        if let Some(bad) = self.entries.iter().find(|e| !e.starts_with('/')) {
            return Err(SwgateError::InvalidManifest(format!(
                "{} is not a root-relative path",
                bad
            )));
        }
        Ok(())
    }

    /// Resolve every entry against the app origin
    pub fn requests(&self, origin: &Url) -> SwgateResult<Vec<Request>> {
        self.validate()?;
        self.entries
            .iter()
            .map(|entry| {
                origin
                    .join(entry)
                    .map(Request::get)
                    .map_err(|e| SwgateError::InvalidUrl {
                        url: entry.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    /// SHA256 over the entries, first 12 hex chars
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.as_bytes());
            hasher.update([0u8]);
        }
        let result = hasher.finalize();
        hex::encode(&result[..6])
    }
}

impl Default for PrecacheManifest {
    fn default() -> Self {
        Self::new(DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_is_literal() {
        let manifest = PrecacheManifest::default();
        assert_eq!(
            manifest.entries(),
            &["/", "/static/js/bundle.js", "/static/css/main.css", "/manifest.json"]
        );
    }

    #[test]
    fn duplicates_dropped() {
        let manifest = PrecacheManifest::new(vec!["/".into(), "/a".into(), "/".into()]);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn digest_deterministic() {
        let a = PrecacheManifest::default();
        let b = PrecacheManifest::default();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 12);
    }

    #[test]
    fn digest_changes_with_entries() {
        let a = PrecacheManifest::default();
        let mut entries = a.entries().to_vec();
        entries.push("/logo192.png".into());
        let b = PrecacheManifest::new(entries);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn requests_resolve_against_origin() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        let requests = PrecacheManifest::default().requests(&origin).unwrap();

        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].url.as_str(), "http://localhost:3000/");
        assert_eq!(
            requests[1].url.as_str(),
            "http://localhost:3000/static/js/bundle.js"
        );
    }

    #[test]
    fn relative_entry_rejected() {
        let manifest = PrecacheManifest::new(vec!["static/app.js".into()]);
        assert!(matches!(
            manifest.validate(),
            Err(SwgateError::InvalidManifest(_))
        ));
        assert!(PrecacheManifest::new(vec![]).validate().is_err());
    }
}
