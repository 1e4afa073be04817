//! On-disk response cache keyed by request URL.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use vinaya_notes_shared::{Result, VinayaError};

/// Stores response bodies under `<dir>/<sha256(url)>.body`.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached body for `url`, if present and readable.
    pub fn get(&self, url: &str) -> Option<String> {
        let path = self.entry_path(url);
        match std::fs::read_to_string(&path) {
            Ok(body) => {
                debug!(%url, path = %path.display(), "cache hit");
                Some(body)
            }
            Err(_) => None,
        }
    }

    /// Store `body` for `url`, writing to a temp file first and renaming.
    pub fn put(&self, url: &str, body: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| VinayaError::io(&self.dir, e))?;

        let target = self.entry_path(url);
        let temp = target.with_extension("tmp");
        std::fs::write(&temp, body).map_err(|e| VinayaError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| VinayaError::io(&target, e))?;

        debug!(%url, size = body.len(), "cached response");
        Ok(())
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.body", cache_key(url)))
    }
}

/// SHA-256 of the URL, hex-encoded.
fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_hex() {
        let key = cache_key("https://suttacentral.net/api/notes/x?page=1");
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key("https://suttacentral.net/api/notes/x?page=1"));
        assert_ne!(key, cache_key("https://suttacentral.net/api/notes/x?page=2"));
    }

    #[test]
    fn put_then_get() {
        let dir = std::env::temp_dir().join(format!("vn-cache-test-{}", uuid::Uuid::now_v7()));
        let cache = ResponseCache::new(&dir);

        assert!(cache.get("https://example.com/a").is_none());
        cache.put("https://example.com/a", "{\"notes\":[]}").unwrap();
        assert_eq!(
            cache.get("https://example.com/a").as_deref(),
            Some("{\"notes\":[]}")
        );

        // No temp files left behind
        for entry in std::fs::read_dir(&dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(name.ends_with(".body"), "unexpected file: {name}");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}
