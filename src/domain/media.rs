//! Media library records as the background engine sees them.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

pub type MediaId = Uuid;

/// A photo from the media library. The engine only ever reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub url: String,
    pub alt_text: Option<String>,
    pub active: bool,
    pub tags: Vec<String>,
    pub folder_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl MediaItem {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    pub fn has_any_tag(&self, tags: &[&str]) -> bool {
        tags.iter().any(|tag| self.has_tag(tag))
    }
}

/// A media library folder, looked up by name for the legacy fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFolder {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tags: &[&str]) -> MediaItem {
        MediaItem {
            id: Uuid::new_v4(),
            url: "https://cdn.example/photo.jpg".to_string(),
            alt_text: None,
            active: true,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            folder_id: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn tag_matching_is_exact() {
        let media = item(&["homebg", "landscape"]);
        assert!(media.has_tag("homebg"));
        assert!(!media.has_tag("home"));
        assert!(media.has_any_tag(&["about", "landscape"]));
        assert!(!media.has_any_tag(&["about", "background"]));
    }
}
