//! Presentation adapter: turns engine results into a stream of frames.
//!
//! A view owns one task per page. The task publishes the first background,
//! then, for zones that rotate, asks the engine for a fresh pick on every
//! carousel tick.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::application::engine::BackgroundEngine;
use crate::domain::{media::MediaItem, zones::CarouselTransition};

const SOURCE: &str = "application::view::BackgroundView";

/// What a page should display right now.
///
/// `current: None` is the placeholder state. `generation` increases by one on
/// every published change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackgroundFrame {
    pub current: Option<MediaItem>,
    pub previous: Option<MediaItem>,
    pub transition: CarouselTransition,
    pub generation: u64,
}

pub struct BackgroundView {
    page_key: String,
    frames: watch::Receiver<BackgroundFrame>,
    task: Option<JoinHandle<()>>,
}

impl BackgroundView {
    pub fn spawn(engine: Arc<BackgroundEngine>, page_key: impl Into<String>) -> Self {
        let page_key = page_key.into();
        let (sender, frames) = watch::channel(BackgroundFrame::default());
        let task = tokio::spawn(drive(engine, page_key.clone(), sender));

        Self {
            page_key,
            frames,
            task: Some(task),
        }
    }

    pub fn page_key(&self) -> &str {
        &self.page_key
    }

    pub fn subscribe(&self) -> watch::Receiver<BackgroundFrame> {
        self.frames.clone()
    }

    pub fn current(&self) -> BackgroundFrame {
        self.frames.borrow().clone()
    }

    /// Stop the carousel. The last published frame stays readable.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(target = SOURCE, page_key = %self.page_key, "background view stopped");
        }
    }
}

impl Drop for BackgroundView {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drive(
    engine: Arc<BackgroundEngine>,
    page_key: String,
    frames: watch::Sender<BackgroundFrame>,
) {
    let config = engine.zone_config(&page_key).await;
    let first = engine.preload_for_page(&page_key, false).await;
    publish(&frames, first, config.carousel_transition);

    if !config.rotates() {
        return;
    }

    let period = Duration::from_millis(config.carousel_interval_ms);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        target = SOURCE,
        page_key = %page_key,
        interval_ms = config.carousel_interval_ms,
        "carousel started"
    );

    loop {
        ticker.tick().await;
        if frames.is_closed() {
            break;
        }
        // A failed tick keeps the current frame on screen.
        if let Some(next) = engine.preload_for_page(&page_key, true).await {
            publish(&frames, Some(next), config.carousel_transition);
        }
    }
}

/// Publish `next` unless it is already on display. Returns whether a frame went out.
fn publish(
    frames: &watch::Sender<BackgroundFrame>,
    next: Option<MediaItem>,
    transition: CarouselTransition,
) -> bool {
    frames.send_if_modified(|frame| {
        let unchanged = frame.current.as_ref().map(|media| media.id)
            == next.as_ref().map(|media| media.id);
        if frame.generation > 0 && unchanged {
            return false;
        }
        frame.previous = std::mem::replace(&mut frame.current, next);
        frame.transition = transition;
        frame.generation += 1;
        true
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::engine::{BackgroundStores, EngineConfig};
    use crate::application::testing::{MediaFixture, MemoryStore, StubDecoder, media};

    fn engine(store: &Arc<MemoryStore>) -> Arc<BackgroundEngine> {
        Arc::new(BackgroundEngine::new(
            BackgroundStores::shared(store.clone()),
            Arc::new(StubDecoder::default()),
            EngineConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn carousel_rotates_on_each_tick() {
        let store = Arc::new(MemoryStore::default());
        for name in ["a", "b", "c"] {
            store.insert(media(name).tagged("homebg"));
        }
        store.set_zone(
            "home.background",
            Some(true),
            None,
            json!({ "carousel_enabled": true, "carousel_interval_ms": 5_000, "carousel_transition": "zoom" }),
        );
        let view = BackgroundView::spawn(engine(&store), "home");

        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = view.current();
        assert_eq!(first.generation, 1);
        assert!(first.current.is_some());
        assert_eq!(first.transition, CarouselTransition::Zoom);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        let second = view.current();
        assert_eq!(second.generation, 2);
        assert_eq!(second.previous, first.current);
        assert_ne!(
            second.current.as_ref().map(|m| m.id),
            first.current.as_ref().map(|m| m.id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn static_zone_publishes_once() {
        let store = Arc::new(MemoryStore::default());
        let hero = store.insert(media("hero"));
        store.set_zone(
            "page.about.background",
            Some(false),
            Some(hero.id),
            json!({ "carousel_enabled": true }),
        );
        let view = BackgroundView::spawn(engine(&store), "about");

        tokio::time::sleep(Duration::from_secs(60)).await;
        let frame = view.current();
        assert_eq!(frame.generation, 1);
        assert_eq!(frame.current.map(|m| m.id), Some(hero.id));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_publishes_placeholder() {
        let store = Arc::new(MemoryStore::default());
        let view = BackgroundView::spawn(engine(&store), "about");

        tokio::time::sleep(Duration::from_millis(10)).await;
        let frame = view.current();
        assert_eq!(frame.generation, 1);
        assert!(frame.current.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_rotation() {
        let store = Arc::new(MemoryStore::default());
        for name in ["a", "b"] {
            store.insert(media(name).tagged("homebg"));
        }
        let mut view = BackgroundView::spawn(engine(&store), "home");

        tokio::time::sleep(Duration::from_millis(10)).await;
        view.stop();
        let receiver = view.subscribe();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(view.current().generation, 1);
        assert!(receiver.has_changed().is_err());
    }
}
