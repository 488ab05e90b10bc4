//! Background zones: per-page configuration of where a background comes from.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{error::DomainError, media::MediaId};

pub const HOME_PAGE_KEY: &str = "home";

pub const MIN_CAROUSEL_INTERVAL_MS: u64 = 3_000;
pub const MAX_CAROUSEL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_CAROUSEL_INTERVAL_MS: u64 = 8_000;

pub const MIN_POOL_SIZE: u32 = 1;
pub const MAX_POOL_SIZE: u32 = 100;
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Trimmed page key, rejecting blanks and keys that cannot form a zone key.
pub fn normalize_page_key(page_key: &str) -> Result<&str, DomainError> {
    let trimmed = page_key.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidPageKey(page_key.to_string()));
    }
    if trimmed.contains(['.', '/']) || trimmed.chars().any(char::is_whitespace) {
        return Err(DomainError::InvalidPageKey(trimmed.to_string()));
    }
    Ok(trimmed)
}

/// Storage key of the zone row for a page key.
///
/// The home page predates the per-page naming scheme and keeps its own key.
pub fn zone_lookup_key(page_key: &str) -> String {
    if page_key == HOME_PAGE_KEY {
        "home.background".to_string()
    } else {
        format!("page.{page_key}.background")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Tag,
    Folder,
    Gallery,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Tag => "tag",
            SourceKind::Folder => "folder",
            SourceKind::Gallery => "gallery",
        }
    }
}

impl FromStr for SourceKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tag" => Ok(SourceKind::Tag),
            "folder" => Ok(SourceKind::Folder),
            "gallery" => Ok(SourceKind::Gallery),
            other => Err(DomainError::UnknownSourceKind(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for SourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a randomized background draws its candidates from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub value: String,
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Self::new(SourceKind::Tag, value)
    }

    pub fn folder(value: impl Into<String>) -> Self {
        Self::new(SourceKind::Folder, value)
    }

    pub fn gallery(value: impl Into<String>) -> Self {
        Self::new(SourceKind::Gallery, value)
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarouselTransition {
    #[default]
    Fade,
    Slide,
    Zoom,
}

/// How a candidate is picked from the pool.
///
/// `Weighted` is accepted from stored configuration but picks uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RandomizationMode {
    #[default]
    Random,
    Weighted,
}

/// Fully merged configuration of one background zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneConfig {
    pub randomization_enabled: bool,
    pub randomization_mode: RandomizationMode,
    pub carousel_enabled: bool,
    pub carousel_interval_ms: u64,
    pub carousel_transition: CarouselTransition,
    pub static_media_id: Option<MediaId>,
    pub source: Option<SourceDescriptor>,
    pub pool_size: u32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            randomization_enabled: true,
            randomization_mode: RandomizationMode::Random,
            carousel_enabled: false,
            carousel_interval_ms: DEFAULT_CAROUSEL_INTERVAL_MS,
            carousel_transition: CarouselTransition::Fade,
            static_media_id: None,
            source: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl ZoneConfig {
    /// Merge the stored columns and the free-form `config_json` blob.
    ///
    /// Every blob field is read on its own: a malformed field falls back to its
    /// default without discarding the rest of the blob.
    pub fn from_stored(
        randomization_enabled: Option<bool>,
        static_media_id: Option<Uuid>,
        config_json: &Value,
    ) -> Self {
        let defaults = ZoneConfig::default();
        let empty = Map::new();
        let blob = config_json.as_object().unwrap_or(&empty);

        let carousel_interval_ms = field::<u64>(blob, "carousel_interval_ms")
            .or_else(|| field::<u64>(blob, "carousel_interval"))
            .map(clamp_interval)
            .unwrap_or(defaults.carousel_interval_ms);

        let pool_size = field::<u32>(blob, "pool_size")
            .or_else(|| field::<u32>(blob, "limit"))
            .map(clamp_pool_size)
            .unwrap_or(defaults.pool_size);

        let source = field::<SourceDescriptor>(blob, "source")
            .filter(|source| !source.value.trim().is_empty());

        Self {
            randomization_enabled: randomization_enabled.unwrap_or(true),
            randomization_mode: field(blob, "randomization_mode").unwrap_or_default(),
            carousel_enabled: field(blob, "carousel_enabled").unwrap_or(false),
            carousel_interval_ms,
            carousel_transition: field(blob, "carousel_transition").unwrap_or_default(),
            static_media_id,
            source,
            pool_size,
        }
    }

    /// Carousel rotation only runs for randomized zones.
    pub fn rotates(&self) -> bool {
        self.carousel_enabled && self.randomization_enabled
    }
}

pub fn clamp_interval(value: u64) -> u64 {
    value.clamp(MIN_CAROUSEL_INTERVAL_MS, MAX_CAROUSEL_INTERVAL_MS)
}

pub fn clamp_pool_size(value: u32) -> u32 {
    value.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE)
}

fn field<T: DeserializeOwned>(blob: &Map<String, Value>, name: &str) -> Option<T> {
    blob.get(name)
        .filter(|value| !value.is_null())
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}
