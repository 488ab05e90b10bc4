//! Navigation-driven background warming.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::engine::BackgroundEngine;
use crate::cache::mutex_lock;
use crate::domain::media::MediaItem;

const SOURCE: &str = "application::prefetch::PrefetchScheduler";

pub const DEFAULT_PREFETCH_DELAY: Duration = Duration::from_millis(500);

/// Warms the destination page on navigation and, after a short delay, every
/// other known page. A newer navigation supersedes a warm that is still pending.
pub struct PrefetchScheduler {
    engine: Arc<BackgroundEngine>,
    known_pages: Arc<[String]>,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl PrefetchScheduler {
    pub fn new(engine: Arc<BackgroundEngine>, known_pages: Vec<String>) -> Self {
        Self {
            engine,
            known_pages: known_pages.into(),
            delay: DEFAULT_PREFETCH_DELAY,
            pending: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn known_pages(&self) -> &[String] {
        &self.known_pages
    }

    pub async fn on_navigate(&self, page_key: &str) -> Option<MediaItem> {
        self.schedule_warm(page_key);
        self.engine.preload_for_page(page_key, false).await
    }

    /// Abort the pending delayed warm, if any.
    pub fn cancel(&self) {
        if let Some(handle) = mutex_lock(&self.pending, SOURCE, "cancel").take() {
            handle.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        mutex_lock(&self.pending, SOURCE, "has_pending")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn schedule_warm(&self, destination: &str) {
        let others: Vec<String> = self
            .known_pages
            .iter()
            .filter(|page_key| page_key.as_str() != destination)
            .cloned()
            .collect();
        if others.is_empty() {
            self.cancel();
            return;
        }

        let engine = Arc::clone(&self.engine);
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(target = SOURCE, pages = others.len(), "warming other pages");
            engine.preload_multiple(&others).await;
        });

        let previous = mutex_lock(&self.pending, SOURCE, "schedule").replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
