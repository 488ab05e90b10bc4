//! Candidate pool retrieval.
//!
//! Pools are cached per source descriptor for the life of the engine. Empty
//! results are never cached so a source that has no media yet is asked again
//! on the next load.

use std::{future::Future, sync::Arc};

use tracing::{debug, warn};

use crate::application::repos::{MediaRepo, RepoError};
use crate::cache::{CandidatePool, PoolCache};
use crate::domain::{
    media::MediaItem,
    zones::{SourceDescriptor, SourceKind},
};

const SOURCE: &str = "application::pool::CandidatePoolFetcher";

pub const LEGACY_FOLDER_NAME: &str = "backgrounds";
pub const GENERIC_BACKGROUND_TAG: &str = "background";
pub const LEGACY_FALLBACK_TAG: &str = "homebg";

#[derive(Clone)]
pub struct CandidatePoolFetcher {
    media: Arc<dyn MediaRepo>,
    cache: Arc<PoolCache>,
}

impl CandidatePoolFetcher {
    pub fn new(media: Arc<dyn MediaRepo>) -> Self {
        Self {
            media,
            cache: Arc::new(PoolCache::new()),
        }
    }

    pub async fn fetch_pool(
        &self,
        source: &SourceDescriptor,
        limit: u32,
        force_refresh: bool,
    ) -> CandidatePool {
        let key = source.to_string();
        let value = source.value.as_str();
        match source.kind {
            SourceKind::Tag => {
                self.cached_or_load(key, force_refresh, self.media.list_active_by_tag(value, limit))
                    .await
            }
            SourceKind::Folder => {
                self.cached_or_load(
                    key,
                    force_refresh,
                    self.media.list_active_by_folder(value, limit),
                )
                .await
            }
            SourceKind::Gallery => {
                self.cached_or_load(
                    key,
                    force_refresh,
                    self.media.list_gallery_media(value, limit),
                )
                .await
            }
        }
    }

    /// Candidates for a page without a configured source.
    ///
    /// Order: the `backgrounds` folder filtered by the page-key or generic
    /// `background` tag, then media tagged with the page key, then media tagged
    /// `homebg`. The first non-empty pool wins.
    pub async fn fetch_legacy_pool(
        &self,
        page_key: &str,
        limit: u32,
        force_refresh: bool,
    ) -> CandidatePool {
        let folder_pool = self
            .cached_or_load(
                format!("legacy:{LEGACY_FOLDER_NAME}:{page_key}"),
                force_refresh,
                self.load_backgrounds_folder(page_key, limit),
            )
            .await;
        if !folder_pool.is_empty() {
            return folder_pool;
        }

        let page_tag_pool = self
            .fetch_pool(&SourceDescriptor::tag(page_key), limit, force_refresh)
            .await;
        if !page_tag_pool.is_empty() {
            return page_tag_pool;
        }

        self.fetch_pool(
            &SourceDescriptor::tag(LEGACY_FALLBACK_TAG),
            limit,
            force_refresh,
        )
        .await
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    async fn load_backgrounds_folder(
        &self,
        page_key: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        let Some(folder) = self.media.find_folder_by_name(LEGACY_FOLDER_NAME).await? else {
            return Ok(Vec::new());
        };

        self.media
            .list_folder_by_any_tag(folder.id, &[page_key, GENERIC_BACKGROUND_TAG], limit)
            .await
    }

    async fn cached_or_load<F>(&self, key: String, force_refresh: bool, query: F) -> CandidatePool
    where
        F: Future<Output = Result<Vec<MediaItem>, RepoError>>,
    {
        if !force_refresh && let Some(pool) = self.cache.get(&key) {
            return pool;
        }

        match query.await {
            Ok(items) => {
                let pool: CandidatePool = items.into_iter().filter(|item| item.active).collect();
                debug!(
                    target = SOURCE,
                    pool = %key,
                    candidates = pool.len(),
                    "candidate pool fetched"
                );
                if !pool.is_empty() {
                    self.cache.set(key, pool.clone());
                }
                pool
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    pool = %key,
                    error = %err,
                    "candidate pool query failed"
                );
                CandidatePool::from(Vec::new())
            }
        }
    }
}
