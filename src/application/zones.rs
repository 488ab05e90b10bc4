//! Zone configuration resolution with a per-engine cache.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use crate::application::repos::ZoneConfigRepo;
use crate::cache::ZoneCache;
use crate::domain::zones::{
    DEFAULT_CAROUSEL_INTERVAL_MS, HOME_PAGE_KEY, ZoneConfig, zone_lookup_key,
};

const SOURCE: &str = "application::zones::ZoneConfigResolver";

/// Built-in zone behaviour for page keys without a stored zone row.
#[derive(Debug, Clone)]
pub struct ZoneDefaults {
    fallback: ZoneConfig,
    pages: HashMap<String, ZoneConfig>,
}

impl Default for ZoneDefaults {
    fn default() -> Self {
        let home = ZoneConfig {
            carousel_enabled: true,
            carousel_interval_ms: DEFAULT_CAROUSEL_INTERVAL_MS,
            ..ZoneConfig::default()
        };
        Self::new(ZoneConfig::default()).with_page(HOME_PAGE_KEY, home)
    }
}

impl ZoneDefaults {
    pub fn new(fallback: ZoneConfig) -> Self {
        Self {
            fallback,
            pages: HashMap::new(),
        }
    }

    pub fn with_page(mut self, page_key: impl Into<String>, config: ZoneConfig) -> Self {
        self.pages.insert(page_key.into(), config);
        self
    }

    pub fn for_page(&self, page_key: &str) -> ZoneConfig {
        self.pages
            .get(page_key)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Clone)]
pub struct ZoneConfigResolver {
    repo: Arc<dyn ZoneConfigRepo>,
    cache: Arc<ZoneCache>,
    defaults: Arc<ZoneDefaults>,
}

impl ZoneConfigResolver {
    pub fn new(repo: Arc<dyn ZoneConfigRepo>, defaults: ZoneDefaults) -> Self {
        Self {
            repo,
            cache: Arc::new(ZoneCache::new()),
            defaults: Arc::new(defaults),
        }
    }

    /// Stored configuration for `page_key`, or `None` when the zone has no row.
    ///
    /// A store failure is logged and reported as `None` without being cached,
    /// so the next call asks the store again.
    pub async fn resolve(&self, page_key: &str, force_refresh: bool) -> Option<ZoneConfig> {
        let key = zone_lookup_key(page_key);

        if !force_refresh && let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        match self.repo.find_zone_config(&key).await {
            Ok(row) => {
                let config = row.map(|row| {
                    ZoneConfig::from_stored(
                        row.randomization_enabled,
                        row.static_media_id,
                        &row.config_json,
                    )
                });
                debug!(
                    target = SOURCE,
                    zone = %key,
                    found = config.is_some(),
                    "zone configuration resolved"
                );
                self.cache.set(key, config.clone());
                config
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    zone = %key,
                    error = %err,
                    "zone configuration lookup failed; using defaults"
                );
                None
            }
        }
    }

    /// Stored configuration, or the built-in default for `page_key`.
    pub async fn effective(&self, page_key: &str, force_refresh: bool) -> ZoneConfig {
        match self.resolve(page_key, force_refresh).await {
            Some(config) => config,
            None => self.defaults.for_page(page_key),
        }
    }

    /// Drop the cached configuration of one page key, or of every page key.
    pub fn invalidate(&self, page_key: Option<&str>) {
        match page_key {
            Some(page_key) => self.cache.invalidate(&zone_lookup_key(page_key)),
            None => self.cache.clear(),
        }
    }
}
