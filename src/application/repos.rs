//! Repository traits describing the external data store.
//!
//! The engine never writes media or zone rows; the only write is the
//! background view log.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::media::{MediaFolder, MediaId, MediaItem};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Raw zone row as stored by the admin console.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneConfigRow {
    pub key: String,
    pub randomization_enabled: Option<bool>,
    pub static_media_id: Option<Uuid>,
    pub config_json: Value,
}

#[async_trait]
pub trait ZoneConfigRepo: Send + Sync {
    async fn find_zone_config(&self, key: &str) -> Result<Option<ZoneConfigRow>, RepoError>;
}

#[async_trait]
pub trait MediaRepo: Send + Sync {
    async fn find_media(&self, id: MediaId) -> Result<Option<MediaItem>, RepoError>;

    async fn list_active_by_tag(&self, tag: &str, limit: u32)
    -> Result<Vec<MediaItem>, RepoError>;

    async fn list_active_by_folder(
        &self,
        folder_id: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError>;

    async fn find_folder_by_name(&self, name: &str) -> Result<Option<MediaFolder>, RepoError>;

    /// Active media in `folder_id` carrying at least one of `tags`.
    async fn list_folder_by_any_tag(
        &self,
        folder_id: Uuid,
        tags: &[&str],
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError>;

    /// Gallery members in gallery order, projected to their media items.
    async fn list_gallery_media(
        &self,
        gallery_id: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError>;
}

#[async_trait]
pub trait BackgroundViewsRepo: Send + Sync {
    /// Up to `limit` distinct media ids most recently shown for `page_key`.
    async fn recent_background_views(
        &self,
        page_key: &str,
        limit: u32,
    ) -> Result<Vec<MediaId>, RepoError>;

    async fn record_background_view(
        &self,
        page_key: &str,
        media_id: MediaId,
        session_id: Uuid,
    ) -> Result<(), RepoError>;
}
