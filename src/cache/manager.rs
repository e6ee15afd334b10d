//! Disk cache for fetched documents
//!
//! Provides a `CacheManager` that stores serializable data to JSON files with
//! expiry timestamps. Expired entries are still readable (flagged with
//! `is_expired`) so callers decide whether stale data is acceptable.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::CacheError;

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached
    cached_at: DateTime<Utc>,
    /// When the cache entry expires
    expires_at: DateTime<Utc>,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// When the entry stops being fresh
    pub expires_at: DateTime<Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// Manages reading and writing cached data to disk
///
/// The cache manager stores data as JSON files in an XDG-compliant cache directory
/// (`~/.cache/adstxt-relay/` on Linux). An entry counts as expired from the
/// instant its `expires_at` is reached.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "adstxt-relay")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Writes data to the cache with the given time-to-live, starting now
    pub fn write<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> Result<(), CacheError> {
        self.write_at(key, data, ttl, Utc::now())
    }

    /// Writes data to the cache as if it had been stored at `now`
    ///
    /// # Arguments
    /// * `key` - Unique identifier for the cache entry
    /// * `data` - The data to cache (must implement Serialize)
    /// * `ttl` - How long the cache entry should be considered fresh
    /// * `now` - Timestamp recorded as `cached_at`
    pub fn write_at<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)?;

        let entry = CacheEntry {
            data,
            cached_at: now,
            expires_at: now + ttl,
        };

        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(self.cache_path(key), json)?;
        Ok(())
    }

    /// Reads data from the cache, judging freshness against the current time
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        self.read_at(key, Utc::now())
    }

    /// Reads data from the cache, judging freshness against `now`
    ///
    /// Returns `None` if the entry doesn't exist or cannot be parsed.
    pub fn read_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<CachedData<T>> {
        let content = fs::read_to_string(self.cache_path(key)).ok()?;
        let entry: CacheEntry<T> = serde_json::from_str(&content).ok()?;

        Some(CachedData {
            is_expired: now >= entry.expires_at,
            data: entry.data,
            cached_at: entry.cached_at,
            expires_at: entry.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheManager::with_dir(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    #[test]
    fn test_write_creates_file_in_cache_directory() {
        let (cache, temp_dir) = create_test_cache();

        cache
            .write("test_key", &"example.com, pub-1, DIRECT".to_string(), Duration::hours(24))
            .expect("Write should succeed");

        let expected_path = temp_dir.path().join("test_key.json");
        assert!(expected_path.exists(), "Cache file should exist");

        let content = fs::read_to_string(&expected_path).expect("Should read file");
        assert!(content.contains("\"data\""));
        assert!(content.contains("pub-1"));
        assert!(content.contains("\"expires_at\""));
    }

    #[test]
    fn test_read_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache();

        let result: Option<CachedData<String>> = cache.read("nonexistent_key");

        assert!(result.is_none(), "Should return None for missing key");
    }

    #[test]
    fn test_read_returns_none_for_corrupt_file() {
        let (cache, temp_dir) = create_test_cache();
        fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();

        let result: Option<CachedData<String>> = cache.read("broken");

        assert!(result.is_none());
    }

    #[test]
    fn test_fresh_entry_is_not_expired() {
        let (cache, _temp_dir) = create_test_cache();

        cache
            .write("fresh_key", &"fresh".to_string(), Duration::seconds(86400))
            .expect("Write should succeed");

        let result: CachedData<String> = cache.read("fresh_key").expect("Should read fresh cache");

        assert_eq!(result.data, "fresh");
        assert!(!result.is_expired, "Fresh cache should not be expired");
    }

    #[test]
    fn test_entry_expires_exactly_at_ttl() {
        let (cache, _temp_dir) = create_test_cache();
        let stored_at = Utc::now();

        cache
            .write_at("ttl_key", &"A".to_string(), Duration::seconds(60), stored_at)
            .unwrap();

        let before: CachedData<String> = cache
            .read_at("ttl_key", stored_at + Duration::seconds(59))
            .unwrap();
        let at: CachedData<String> = cache
            .read_at("ttl_key", stored_at + Duration::seconds(60))
            .unwrap();

        assert!(!before.is_expired);
        assert!(at.is_expired);
        assert_eq!(at.data, "A", "Expired data is still readable");
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache").join("dir");
        let cache = CacheManager::with_dir(nested_path.clone());

        cache
            .write("nested_key", &"x".to_string(), Duration::hours(1))
            .expect("Write should succeed");

        assert!(nested_path.join("nested_key.json").exists(), "Cache file should exist");
    }

    #[test]
    fn test_cached_at_timestamp_is_recorded() {
        let (cache, _temp_dir) = create_test_cache();

        let before = Utc::now();
        cache
            .write("timestamp_key", &"t".to_string(), Duration::hours(24))
            .expect("Write should succeed");
        let after = Utc::now();

        let result: CachedData<String> = cache.read("timestamp_key").expect("Should read cache");

        assert!(result.cached_at >= before);
        assert!(result.cached_at <= after);
        assert_eq!(result.expires_at, result.cached_at + Duration::hours(24));
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(cache) = CacheManager::new() {
            let path_str = cache.dir().to_string_lossy();
            assert!(path_str.contains("adstxt-relay"));
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }

    #[test]
    fn test_overwrite_existing_cache() {
        let (cache, _temp_dir) = create_test_cache();

        cache.write("overwrite_key", &"first".to_string(), Duration::hours(24)).unwrap();
        cache.write("overwrite_key", &"second".to_string(), Duration::hours(24)).unwrap();

        let result: CachedData<String> = cache.read("overwrite_key").expect("Should read cache");

        assert_eq!(result.data, "second", "Cache should contain latest data");
    }
}
