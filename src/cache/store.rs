//! In-memory stores owned by one background engine.
//!
//! Zone: resolved zone configuration per lookup key, including "no row".
//! Pool: candidate media per source descriptor, no expiry.
//! Background: decoded background per page key, expiry checked on read.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tokio::time::Instant;

use crate::application::decode::DecodedImage;
use crate::domain::{media::MediaItem, zones::ZoneConfig};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

// ============================================================================
// Zone configuration cache
// ============================================================================

#[derive(Default)]
pub struct ZoneCache {
    entries: RwLock<HashMap<String, Option<ZoneConfig>>>,
}

impl ZoneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` means the store was asked and had no row.
    pub fn get(&self, key: &str) -> Option<Option<ZoneConfig>> {
        rw_read(&self.entries, SOURCE, "zone_get").get(key).cloned()
    }

    pub fn set(&self, key: String, config: Option<ZoneConfig>) {
        rw_write(&self.entries, SOURCE, "zone_set").insert(key, config);
    }

    pub fn invalidate(&self, key: &str) {
        rw_write(&self.entries, SOURCE, "zone_invalidate").remove(key);
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "zone_clear").clear();
    }
}

// ============================================================================
// Candidate pool cache
// ============================================================================

pub type CandidatePool = Arc<[MediaItem]>;

#[derive(Default)]
pub struct PoolCache {
    pools: RwLock<HashMap<String, CandidatePool>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CandidatePool> {
        rw_read(&self.pools, SOURCE, "pool_get").get(key).cloned()
    }

    pub fn set(&self, key: String, pool: CandidatePool) {
        rw_write(&self.pools, SOURCE, "pool_set").insert(key, pool);
    }

    pub fn clear(&self) {
        rw_write(&self.pools, SOURCE, "pool_clear").clear();
    }

    pub fn is_empty(&self) -> bool {
        rw_read(&self.pools, SOURCE, "pool_is_empty").is_empty()
    }
}

// ============================================================================
// Decoded background cache
// ============================================================================

/// A background whose pixels are already decoded and ready to display.
#[derive(Debug, Clone)]
pub struct CachedBackground {
    pub media: MediaItem,
    pub image: DecodedImage,
    pub cached_at: Instant,
}

impl CachedBackground {
    pub fn new(media: MediaItem, image: DecodedImage) -> Self {
        Self {
            media,
            image,
            cached_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.cached_at) < ttl
    }
}

pub struct BackgroundCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedBackground>>,
}

impl BackgroundCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entry for `page_key` if it has not outlived the TTL.
    ///
    /// Expired entries stay in the map until overwritten or cleared.
    pub fn get_fresh(&self, page_key: &str) -> Option<CachedBackground> {
        let now = Instant::now();
        rw_read(&self.entries, SOURCE, "background_get")
            .get(page_key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .cloned()
    }

    /// Entry for `page_key` regardless of age.
    pub fn get_any(&self, page_key: &str) -> Option<CachedBackground> {
        rw_read(&self.entries, SOURCE, "background_get_any")
            .get(page_key)
            .cloned()
    }

    pub fn set(&self, page_key: String, entry: CachedBackground) {
        rw_write(&self.entries, SOURCE, "background_set").insert(page_key, entry);
    }

    pub fn remove(&self, page_key: &str) {
        rw_write(&self.entries, SOURCE, "background_remove").remove(page_key);
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "background_clear").clear();
    }
}
