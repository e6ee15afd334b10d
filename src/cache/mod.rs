//! Cache module for the fetched ads.txt document
//!
//! `CacheManager` persists keyed JSON entries with expiry timestamps. The
//! `CacheStore` trait narrows that down to the single time-limited slot the
//! refresh logic works against; expired entries read as absent.

mod manager;
mod slot;

pub use manager::{CacheManager, CachedData};
pub use slot::{CacheStore, MemorySlot, PersistentSlot, ADS_TXT_CACHE_KEY, ADS_TXT_CACHE_TTL};

use thiserror::Error;

/// Errors that can occur when writing to the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache directory or file could not be written
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded
    #[error("Cache encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
