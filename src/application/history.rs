//! Background view history used for repeat avoidance across page loads.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::BackgroundViewsRepo;
use crate::domain::media::MediaId;

const SOURCE: &str = "application::history::ViewHistory";

pub const DEFAULT_RECENT_VIEW_LIMIT: u32 = 5;

#[derive(Clone)]
pub struct ViewHistory {
    views: Arc<dyn BackgroundViewsRepo>,
    session_id: Uuid,
    recent_limit: u32,
}

impl ViewHistory {
    pub fn new(views: Arc<dyn BackgroundViewsRepo>, session_id: Uuid, recent_limit: u32) -> Self {
        Self {
            views,
            session_id,
            recent_limit,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Media recently shown for `page_key`. Best effort: empty on any failure.
    pub async fn get_recent_background_ids(&self, page_key: &str) -> Vec<MediaId> {
        match self
            .views
            .recent_background_views(page_key, self.recent_limit)
            .await
        {
            Ok(mut ids) => {
                ids.truncate(self.recent_limit as usize);
                ids
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    page_key,
                    error = %err,
                    "recent background lookup failed; no exclusions applied"
                );
                Vec::new()
            }
        }
    }

    /// Log that `media_id` was shown for `page_key`. Failures are only logged.
    pub async fn record_background_view(&self, page_key: &str, media_id: MediaId) {
        match self
            .views
            .record_background_view(page_key, media_id, self.session_id)
            .await
        {
            Ok(()) => debug!(
                target = SOURCE,
                page_key,
                media_id = %media_id,
                "background view recorded"
            ),
            Err(err) => warn!(
                target = SOURCE,
                page_key,
                media_id = %media_id,
                error = %err,
                "failed to record background view"
            ),
        }
    }

    /// Record a view on a detached task so the caller never waits on the store.
    pub fn spawn_record(&self, page_key: &str, media_id: MediaId) {
        let history = self.clone();
        let page_key = page_key.to_string();
        tokio::spawn(async move {
            history.record_background_view(&page_key, media_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::application::testing::{MemoryStore, media};

    #[tokio::test]
    async fn recent_ids_are_distinct_latest_first_and_limited() {
        let store = Arc::new(MemoryStore::default());
        let session = Uuid::new_v4();
        let history = ViewHistory::new(store.clone(), session, 2);
        let (a, b, c) = (media("a").id, media("b").id, media("c").id);

        for id in [a, b, a, c] {
            history.record_background_view("home", id).await;
        }
        history.record_background_view("about", b).await;

        assert_eq!(history.get_recent_background_ids("home").await, vec![c, a]);
        assert!(
            store
                .recorded_views()
                .iter()
                .all(|view| view.session_id == session)
        );
    }

    #[tokio::test]
    async fn failures_degrade_to_no_exclusions() {
        let store = Arc::new(MemoryStore::default());
        let history = ViewHistory::new(store.clone(), Uuid::new_v4(), DEFAULT_RECENT_VIEW_LIMIT);

        store.fail_recording(true);
        history.record_background_view("home", media("a").id).await;
        assert!(store.recorded_views().is_empty());

        store.fail_queries(true);
        assert!(history.get_recent_background_ids("home").await.is_empty());
        assert_eq!(store.recent_queries.load(Ordering::SeqCst), 1);
    }
}
