//! Single-slot ads.txt cache

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::{CacheError, CacheManager};

/// Key of the one cache entry holding the last fetched document
pub const ADS_TXT_CACHE_KEY: &str = "publisher_collective_ads_txt";

/// Freshness window of a fetched document (one day)
pub const ADS_TXT_CACHE_TTL: Duration = Duration::seconds(86_400);

/// A single time-limited value slot
///
/// `get` only returns a value while it is fresh. `set` always overwrites and
/// restarts the expiry clock.
pub trait CacheStore: Send + Sync {
    /// Returns the stored body if it has not expired
    fn get(&self) -> Option<String>;

    /// Stores `body`, fresh for `ttl` from now
    fn set(&self, body: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Slot persisted on disk through a `CacheManager`
#[derive(Debug, Clone)]
pub struct PersistentSlot {
    manager: CacheManager,
    key: String,
}

impl PersistentSlot {
    /// Creates the ads.txt slot inside the given cache
    pub fn new(manager: CacheManager) -> Self {
        Self::with_key(manager, ADS_TXT_CACHE_KEY)
    }

    /// Creates a slot stored under a custom key
    pub fn with_key(manager: CacheManager, key: impl Into<String>) -> Self {
        Self {
            manager,
            key: key.into(),
        }
    }

    /// Reads the slot, judging freshness against `now`
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.manager
            .read_at::<String>(&self.key, now)
            .filter(|cached| !cached.is_expired)
            .map(|cached| cached.data)
    }

    /// Writes the slot as if it had been stored at `now`
    pub fn set_at(&self, body: &str, ttl: Duration, now: DateTime<Utc>) -> Result<(), CacheError> {
        self.manager.write_at(&self.key, &body, ttl, now)
    }
}

impl CacheStore for PersistentSlot {
    fn get(&self) -> Option<String> {
        self.get_at(Utc::now())
    }

    fn set(&self, body: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set_at(body, ttl, Utc::now())
    }
}

#[derive(Debug)]
struct MemoryEntry {
    body: String,
    expires_at: DateTime<Utc>,
}

/// Process-local slot, used when no cache directory is available
#[derive(Debug, Default)]
pub struct MemorySlot {
    entry: Mutex<Option<MemoryEntry>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the slot, judging freshness against `now`
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<String> {
        let entry = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entry
            .as_ref()
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.body.clone())
    }

    /// Writes the slot as if it had been stored at `now`
    pub fn set_at(&self, body: &str, ttl: Duration, now: DateTime<Utc>) {
        let mut entry = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *entry = Some(MemoryEntry {
            body: body.to_string(),
            expires_at: now + ttl,
        });
    }
}

impl CacheStore for MemorySlot {
    fn get(&self) -> Option<String> {
        self.get_at(Utc::now())
    }

    fn set(&self, body: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set_at(body, ttl, Utc::now());
        Ok(())
    }
}
