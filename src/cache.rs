use crate::error::ShopgrabError;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub struct Cache {
    dir: PathBuf,
    read_enabled: bool,
}

const RECORD_TTL: Duration = Duration::from_secs(24 * 60 * 60); // 24 hours

impl Cache {
    /// Create a cache. When `no_cache` is true, reads are skipped but writes still happen.
    pub fn new(cache_dir: PathBuf, no_cache: bool) -> Self {
        Self {
            dir: cache_dir,
            read_enabled: !no_cache,
        }
    }

    pub fn get_record<T: DeserializeOwned>(&self, platform: &str, url: &str) -> Option<T> {
        if !self.read_enabled {
            return None;
        }
        let path = self.record_path(platform, url);
        self.read_cached(&path, RECORD_TTL)
    }

    pub fn set_record<T: Serialize>(
        &self,
        platform: &str,
        url: &str,
        data: &T,
    ) -> Result<(), ShopgrabError> {
        let path = self.record_path(platform, url);
        self.write_cached(&path, data)
    }

    fn record_path(&self, platform: &str, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();
        let key = hex::encode(&result[..8]); // 16 hex chars
        self.dir.join(format!("record_{}_{}.json", platform, key))
    }

    fn read_cached<T: DeserializeOwned>(&self, path: &Path, ttl: Duration) -> Option<T> {
        let metadata = std::fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age > ttl {
            tracing::debug!("Cache expired for {}", path.display());
            return None;
        }
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(data) => {
                tracing::info!("Cache hit for {}", path.display());
                Some(data)
            }
            Err(e) => {
                tracing::warn!("Cache parse error for {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_cached<T: Serialize>(&self, path: &Path, data: &T) -> Result<(), ShopgrabError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ShopgrabError::Cache(format!("Failed to create cache dir: {}", e)))?;
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(path, content)
            .map_err(|e| ShopgrabError::Cache(format!("Failed to write cache: {}", e)))?;
        tracing::debug!("Cached to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        title: String,
        price: f64,
    }

    fn sample() -> Sample {
        Sample {
            title: "Widget".to_string(),
            price: 9.99,
        }
    }

    #[test]
    fn roundtrips_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false);

        let url = "https://example.com/item/1005001.html";
        cache.set_record("aliexpress", url, &sample()).unwrap();

        let got: Option<Sample> = cache.get_record("aliexpress", url);
        assert_eq!(got, Some(sample()));
    }

    #[test]
    fn no_cache_skips_reads_but_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), true);

        let url = "https://example.com/item/1005002.html";
        cache.set_record("aliexpress", url, &sample()).unwrap();

        let got: Option<Sample> = cache.get_record("aliexpress", url);
        assert!(got.is_none());

        // A fresh cache with reads enabled sees the write.
        let readable = Cache::new(dir.path().to_path_buf(), false);
        let got: Option<Sample> = readable.get_record("aliexpress", url);
        assert_eq!(got, Some(sample()));
    }

    #[test]
    fn miss_on_unknown_url() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false);

        let got: Option<Sample> = cache.get_record("aliexpress", "https://example.com/other");
        assert!(got.is_none());
    }

    #[test]
    fn distinct_urls_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false);

        let a = cache.record_path("aliexpress", "https://example.com/item/1.html");
        let b = cache.record_path("aliexpress", "https://example.com/item/2.html");
        assert_ne!(a, b);
    }
}
