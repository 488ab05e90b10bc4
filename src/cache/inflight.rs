//! Per-page claim on the background load pipeline.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tracing::debug;

const SOURCE: &str = "cache::inflight";

/// Page keys with a background load in progress, keyed to when the load began.
#[derive(Default, Clone)]
pub struct InFlightLoads {
    started: Arc<DashMap<String, Instant>>,
}

#[derive(Debug, Error)]
pub enum InFlightError {
    #[error("background load for page `{page_key}` already running for {running_ms} ms")]
    AlreadyRunning { page_key: String, running_ms: u128 },
}

impl InFlightLoads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `page_key` for one load. The claim is released when the guard drops.
    pub fn acquire(&self, page_key: &str) -> Result<LoadGuard, InFlightError> {
        match self.started.entry(page_key.to_string()) {
            Entry::Vacant(vacant) => {
                let started = Instant::now();
                vacant.insert(started);
                Ok(LoadGuard {
                    page_key: page_key.to_string(),
                    started,
                    loads: Arc::clone(&self.started),
                })
            }
            Entry::Occupied(occupied) => Err(InFlightError::AlreadyRunning {
                page_key: page_key.to_string(),
                running_ms: occupied.get().elapsed().as_millis(),
            }),
        }
    }

    /// How long the load of `page_key` has been running, if one is.
    pub fn running_for(&self, page_key: &str) -> Option<Duration> {
        self.started.get(page_key).map(|started| started.elapsed())
    }
}

/// Exclusive claim on one page key's load.
pub struct LoadGuard {
    page_key: String,
    started: Instant,
    loads: Arc<DashMap<String, Instant>>,
}

impl LoadGuard {
    pub fn page_key(&self) -> &str {
        &self.page_key
    }

    /// Time since the claim was taken.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.loads.remove(&self.page_key);
        debug!(
            target = SOURCE,
            page_key = %self.page_key,
            held_ms = self.elapsed().as_millis() as u64,
            "background load released"
        );
    }
}
