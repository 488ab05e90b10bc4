//! Page background resolution and caching engine for a photography portfolio site.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
