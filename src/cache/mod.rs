//! Vitrine background caches.
//!
//! Three in-memory layers scoped to a single engine instance:
//!
//! - **Zone cache**: resolved zone configuration per lookup key
//! - **Pool cache**: candidate media per source descriptor
//! - **Background cache**: decoded backgrounds per page key, with a TTL
//!
//! plus the per-page in-flight guard that keeps at most one load running per
//! page key.

mod inflight;
mod lock;
mod store;

pub use inflight::{InFlightError, InFlightLoads, LoadGuard};
pub(crate) use lock::mutex_lock;
pub use store::{BackgroundCache, CachedBackground, CandidatePool, PoolCache, ZoneCache};
