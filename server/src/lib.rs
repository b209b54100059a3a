//! `imgcache` server library — HTTP surface over [`imgcache_core::Engine`].
//!
//! Deliberately thin per SPEC_FULL's C11: query-string decoding and preset
//! alias lookup live here because the core crate scopes them out, but every
//! handler only ever calls the engine's public operations.

pub mod config;
pub mod error;
pub mod routes;

use imgcache_core::Engine;
use std::sync::Arc;

/// Shared application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}
