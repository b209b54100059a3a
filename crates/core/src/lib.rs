//! Core caching and transformation engine for `imgcache`.
//!
//! Owns the on-disk store of originals, the bounded LRU derived-artifact
//! cache, fingerprinting, the decode → crop → resize → encode pipeline, and
//! the asynchronous file remover. Everything outside this crate — HTTP
//! routing, query-string parsing, preset *resolution*, configuration
//! loading — talks to the engine only through [`Engine`]'s public methods.

mod engine;
mod error;
mod fingerprint;
mod format;
mod lru;
mod originals;
mod params;
mod pipeline;
mod remover;
mod size;

pub use engine::{Engine, EngineOptions, IdStat, Stat};
pub use error::{Error, Result};
pub use format::{Format, Interpolation};
pub use originals::ORIGINAL_EXT;
pub use params::{ImageDefaults, Preset, RenditionParams, RequestParams};
pub use size::{ParseSizeError, Size};
