//! In-memory store and decoder doubles shared by the application tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::decode::{DecodeError, DecodedImage, ImageDecoder};
use crate::application::repos::{
    BackgroundViewsRepo, MediaRepo, RepoError, ZoneConfigRepo, ZoneConfigRow,
};
use crate::domain::media::{MediaFolder, MediaId, MediaItem};

pub(crate) fn media(name: &str) -> MediaItem {
    MediaItem {
        id: Uuid::new_v4(),
        url: format!("https://cdn.example/{name}.jpg"),
        alt_text: Some(name.to_string()),
        active: true,
        tags: Vec::new(),
        folder_id: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

pub(crate) trait MediaFixture {
    fn tagged(self, tag: &str) -> Self;
    fn in_folder(self, folder_id: Uuid) -> Self;
    fn inactive(self) -> Self;
}

impl MediaFixture for MediaItem {
    fn tagged(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    fn in_folder(mut self, folder_id: Uuid) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedView {
    pub page_key: String,
    pub media_id: MediaId,
    pub session_id: Uuid,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    media: Mutex<Vec<MediaItem>>,
    folders: Mutex<Vec<MediaFolder>>,
    galleries: Mutex<HashMap<String, Vec<MediaId>>>,
    zones: Mutex<HashMap<String, ZoneConfigRow>>,
    views: Mutex<Vec<RecordedView>>,
    latency: Mutex<Option<Duration>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    pub zone_queries: AtomicUsize,
    pub pool_queries: AtomicUsize,
    pub media_lookups: AtomicUsize,
    pub recent_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn insert(&self, item: MediaItem) -> MediaItem {
        self.media.lock().unwrap().push(item.clone());
        item
    }

    pub fn add_folder(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.folders.lock().unwrap().push(MediaFolder {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_to_gallery(&self, gallery_id: &str, members: &[MediaId]) {
        self.galleries
            .lock()
            .unwrap()
            .entry(gallery_id.to_string())
            .or_default()
            .extend_from_slice(members);
    }

    pub fn set_zone(
        &self,
        key: &str,
        randomization_enabled: Option<bool>,
        static_media_id: Option<MediaId>,
        config_json: serde_json::Value,
    ) {
        self.zones.lock().unwrap().insert(
            key.to_string(),
            ZoneConfigRow {
                key: key.to_string(),
                randomization_enabled,
                static_media_id,
                config_json,
            },
        );
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_recording(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn recorded_views(&self) -> Vec<RecordedView> {
        self.views.lock().unwrap().clone()
    }

    async fn read(&self, counter: &AtomicUsize) -> Result<(), RepoError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("store unreachable"));
        }
        Ok(())
    }

    fn select(&self, limit: u32, predicate: impl Fn(&MediaItem) -> bool) -> Vec<MediaItem> {
        self.media
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.active && predicate(item))
            .take(limit as usize)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ZoneConfigRepo for MemoryStore {
    async fn find_zone_config(&self, key: &str) -> Result<Option<ZoneConfigRow>, RepoError> {
        self.read(&self.zone_queries).await?;
        Ok(self.zones.lock().unwrap().get(key).cloned())
    }
}

#[async_trait]
impl MediaRepo for MemoryStore {
    async fn find_media(&self, id: MediaId) -> Result<Option<MediaItem>, RepoError> {
        self.read(&self.media_lookups).await?;
        Ok(self
            .media
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id == id)
            .cloned())
    }

    async fn list_active_by_tag(
        &self,
        tag: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        self.read(&self.pool_queries).await?;
        Ok(self.select(limit, |item| item.has_tag(tag)))
    }

    async fn list_active_by_folder(
        &self,
        folder_id: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        self.read(&self.pool_queries).await?;
        Ok(self.select(limit, |item| {
            item.folder_id.map(|id| id.to_string()).as_deref() == Some(folder_id)
        }))
    }

    async fn find_folder_by_name(&self, name: &str) -> Result<Option<MediaFolder>, RepoError> {
        self.read(&self.pool_queries).await?;
        Ok(self
            .folders
            .lock()
            .unwrap()
            .iter()
            .find(|folder| folder.name == name)
            .cloned())
    }

    async fn list_folder_by_any_tag(
        &self,
        folder_id: Uuid,
        tags: &[&str],
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        self.read(&self.pool_queries).await?;
        Ok(self.select(limit, |item| {
            item.folder_id == Some(folder_id) && item.has_any_tag(tags)
        }))
    }

    async fn list_gallery_media(
        &self,
        gallery_id: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        self.read(&self.pool_queries).await?;
        let members = self
            .galleries
            .lock()
            .unwrap()
            .get(gallery_id)
            .cloned()
            .unwrap_or_default();
        let media = self.media.lock().unwrap();
        Ok(members
            .iter()
            .filter_map(|id| media.iter().find(|item| item.id == *id && item.active))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BackgroundViewsRepo for MemoryStore {
    async fn recent_background_views(
        &self,
        page_key: &str,
        limit: u32,
    ) -> Result<Vec<MediaId>, RepoError> {
        self.read(&self.recent_queries).await?;
        let mut seen = HashSet::new();
        Ok(self
            .views
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|view| view.page_key == page_key)
            .filter(|view| seen.insert(view.media_id))
            .take(limit as usize)
            .map(|view| view.media_id)
            .collect())
    }

    async fn record_background_view(
        &self,
        page_key: &str,
        media_id: MediaId,
        session_id: Uuid,
    ) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidInput {
                message: "unknown media id".to_string(),
            });
        }
        self.views.lock().unwrap().push(RecordedView {
            page_key: page_key.to_string(),
            media_id,
            session_id,
        });
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct StubDecoder {
    broken: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl StubDecoder {
    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }
}

#[async_trait]
impl ImageDecoder for StubDecoder {
    async fn decode(&self, media: &MediaItem) -> Result<DecodedImage, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().unwrap().contains(&media.url) {
            return Err(DecodeError::Decode {
                url: media.url.clone(),
                message: "corrupt image data".to_string(),
            });
        }
        Ok(DecodedImage::blank(4, 3))
    }
}
