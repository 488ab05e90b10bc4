//! Application services: background resolution, caching and scheduling.

pub mod decode;
pub mod engine;
pub mod error;
pub mod history;
pub mod pool;
pub mod prefetch;
pub mod repos;
pub mod view;
pub mod zones;

#[cfg(test)]
pub(crate) mod testing;
