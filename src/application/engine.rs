//! Background resolution and caching engine.
//!
//! Given a page key the engine resolves the zone configuration, gathers a
//! candidate pool, drops recently shown media, picks one at random, decodes it
//! and keeps the decoded result for the cache TTL. Every public method resolves
//! to a value or `None`; failures are logged and never propagated.

use std::{
    collections::HashSet,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use futures::{FutureExt, future::join_all};
use metrics::{counter, histogram};
use rand::seq::IndexedRandom;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::{
    decode::ImageDecoder,
    history::{DEFAULT_RECENT_VIEW_LIMIT, ViewHistory},
    pool::CandidatePoolFetcher,
    repos::{BackgroundViewsRepo, MediaRepo, ZoneConfigRepo},
    zones::{ZoneConfigResolver, ZoneDefaults},
};
use crate::cache::{BackgroundCache, CachedBackground, InFlightLoads};
use crate::config::BackgroundSettings;
use crate::domain::{
    media::{MediaId, MediaItem},
    zones::{RandomizationMode, ZoneConfig},
};

const SOURCE: &str = "application::engine::BackgroundEngine";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

pub(crate) const METRIC_CACHE_HIT: &str = "vitrine_background_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "vitrine_background_cache_miss_total";
pub(crate) const METRIC_LOAD_DEDUPLICATED: &str = "vitrine_background_load_deduplicated_total";
pub(crate) const METRIC_DECODE_FAILED: &str = "vitrine_background_decode_failed_total";
pub(crate) const METRIC_LOAD_MS: &str = "vitrine_background_load_ms";

/// Tunables of one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache_ttl: Duration,
    pub recent_view_limit: u32,
    pub zone_defaults: ZoneDefaults,
}

impl From<&BackgroundSettings> for EngineConfig {
    fn from(settings: &BackgroundSettings) -> Self {
        Self {
            cache_ttl: settings.cache_ttl,
            recent_view_limit: settings.recent_view_limit.get(),
            zone_defaults: settings.zone_defaults.clone(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            recent_view_limit: DEFAULT_RECENT_VIEW_LIMIT,
            zone_defaults: ZoneDefaults::default(),
        }
    }
}

/// The three store ports the engine reads from and writes to.
#[derive(Clone)]
pub struct BackgroundStores {
    pub zones: Arc<dyn ZoneConfigRepo>,
    pub media: Arc<dyn MediaRepo>,
    pub views: Arc<dyn BackgroundViewsRepo>,
}

impl BackgroundStores {
    /// Use one adapter for every port.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ZoneConfigRepo + MediaRepo + BackgroundViewsRepo + 'static,
    {
        Self {
            zones: store.clone(),
            media: store.clone(),
            views: store,
        }
    }
}

pub struct BackgroundEngine {
    zones: ZoneConfigResolver,
    pools: CandidatePoolFetcher,
    history: ViewHistory,
    media: Arc<dyn MediaRepo>,
    decoder: Arc<dyn ImageDecoder>,
    backgrounds: BackgroundCache,
    in_flight: InFlightLoads,
}

impl BackgroundEngine {
    pub fn new(stores: BackgroundStores, decoder: Arc<dyn ImageDecoder>, config: EngineConfig) -> Self {
        let session_id = Uuid::new_v4();
        debug!(target = SOURCE, session_id = %session_id, "background engine created");

        Self {
            zones: ZoneConfigResolver::new(stores.zones, config.zone_defaults),
            pools: CandidatePoolFetcher::new(stores.media.clone()),
            history: ViewHistory::new(stores.views, session_id, config.recent_view_limit),
            media: stores.media,
            decoder,
            backgrounds: BackgroundCache::new(config.cache_ttl),
            in_flight: InFlightLoads::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.history.session_id()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.backgrounds.ttl()
    }

    /// Effective zone configuration of `page_key`, falling back to the defaults.
    pub async fn zone_config(&self, page_key: &str) -> ZoneConfig {
        self.zones.effective(page_key, false).await
    }

    /// Resolve, decode and cache the background of `page_key`.
    ///
    /// At most one load runs per page key; a call that finds a load already in
    /// flight returns the currently cached item, which may be stale or absent.
    #[instrument(level = "debug", skip(self))]
    pub async fn preload_for_page(&self, page_key: &str, force_refresh: bool) -> Option<MediaItem> {
        let config = self.zones.effective(page_key, force_refresh).await;
        let randomization_enabled = config.randomization_enabled;

        if !randomization_enabled
            && !force_refresh
            && let Some(entry) = self.backgrounds.get_fresh(page_key)
        {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Some(entry.media.clone());
        }

        let guard = match self.in_flight.acquire(page_key) {
            Ok(guard) => guard,
            Err(err) => {
                debug!(target = SOURCE, reason = %err, "joining in-flight background load");
                counter!(METRIC_LOAD_DEDUPLICATED).increment(1);
                return self.last_shown(page_key);
            }
        };
        counter!(METRIC_CACHE_MISS).increment(1);

        let exclusions = if randomization_enabled {
            self.exclusions(page_key).await
        } else {
            HashSet::new()
        };

        let Some(media) = self
            .choose_media(page_key, &config, &exclusions, force_refresh)
            .await
        else {
            debug!(target = SOURCE, "no background candidates available");
            return None;
        };

        match self.decoder.decode(&media).await {
            Ok(image) => {
                self.backgrounds.set(
                    page_key.to_string(),
                    CachedBackground::new(media.clone(), image),
                );
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    media_id = %media.id,
                    error = %err,
                    "background decode failed; keeping previous entry"
                );
                counter!(METRIC_DECODE_FAILED).increment(1);
                return self.last_shown(page_key);
            }
        }

        if randomization_enabled {
            self.history.spawn_record(page_key, media.id);
        }

        histogram!(METRIC_LOAD_MS).record(guard.elapsed().as_secs_f64() * 1000.0);
        debug!(target = SOURCE, media_id = %media.id, "background ready");
        Some(media)
    }

    /// Warm several page keys at once. One key failing never affects the others.
    pub async fn preload_multiple(&self, page_keys: &[String]) {
        let loads = page_keys.iter().map(|page_key| {
            AssertUnwindSafe(self.preload_for_page(page_key, false)).catch_unwind()
        });

        for (page_key, outcome) in page_keys.iter().zip(join_all(loads).await) {
            if outcome.is_err() {
                warn!(target = SOURCE, page_key = %page_key, "background preload panicked");
            }
        }
    }

    /// Decoded background of `page_key`, if one is cached and within the TTL.
    pub fn get_cached(&self, page_key: &str) -> Option<CachedBackground> {
        self.backgrounds.get_fresh(page_key)
    }

    /// Forget every decoded background, candidate pool and zone configuration.
    pub fn clear_cache(&self) {
        self.backgrounds.clear();
        self.pools.clear();
        self.zones.invalidate(None);
    }

    pub fn clear_page_cache(&self, page_key: &str) {
        self.backgrounds.remove(page_key);
    }

    /// Must be called after the admin console saves zone settings.
    pub fn refresh_zone_config(&self, page_key: Option<&str>) {
        self.zones.invalidate(page_key);
    }

    /// Item currently cached for `page_key`, expired or not.
    fn last_shown(&self, page_key: &str) -> Option<MediaItem> {
        self.backgrounds.get_any(page_key).map(|entry| entry.media)
    }

    /// Recently viewed ids plus the background cached right now. Read under the
    /// page's load guard.
    async fn exclusions(&self, page_key: &str) -> HashSet<MediaId> {
        let cached = self.backgrounds.get_fresh(page_key);
        let mut exclusions: HashSet<MediaId> = self
            .history
            .get_recent_background_ids(page_key)
            .await
            .into_iter()
            .collect();
        if let Some(entry) = cached {
            exclusions.insert(entry.media.id);
        }
        exclusions
    }

    async fn choose_media(
        &self,
        page_key: &str,
        config: &ZoneConfig,
        exclusions: &HashSet<MediaId>,
        force_refresh: bool,
    ) -> Option<MediaItem> {
        if !config.randomization_enabled
            && let Some(static_id) = config.static_media_id
        {
            match self.media.find_media(static_id).await {
                Ok(Some(media)) if media.active => return Some(media),
                Ok(_) => warn!(
                    target = SOURCE,
                    media_id = %static_id,
                    "static background missing or inactive; using candidate pool"
                ),
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        media_id = %static_id,
                        error = %err,
                        "static background lookup failed"
                    );
                    return None;
                }
            }
        }

        if config.randomization_mode == RandomizationMode::Weighted {
            debug!(target = SOURCE, "weighted randomization is not supported; picking uniformly");
        }

        let pool = match config.source.as_ref() {
            Some(source) => {
                self.pools
                    .fetch_pool(source, config.pool_size, force_refresh)
                    .await
            }
            None => {
                self.pools
                    .fetch_legacy_pool(page_key, config.pool_size, force_refresh)
                    .await
            }
        };

        pick_candidate(&pool, exclusions)
    }
}

/// Uniform pick among candidates that are not excluded.
///
/// When the exclusions remove every candidate the pick is made from the whole
/// pool instead: showing a repeat beats showing nothing.
fn pick_candidate(pool: &[MediaItem], exclusions: &HashSet<MediaId>) -> Option<MediaItem> {
    let mut rng = rand::rng();
    let eligible: Vec<&MediaItem> = pool
        .iter()
        .filter(|media| !exclusions.contains(&media.id))
        .collect();

    match eligible.choose(&mut rng) {
        Some(media) => Some((*media).clone()),
        None => pool.choose(&mut rng).cloned(),
    }
}
