//! Rendition parameters, defaults, and named presets (spec §3, §6).

use crate::format::{Format, Interpolation};
use crate::size::Size;
use serde::{Deserialize, Serialize};

/// A fully resolved rendition request: every field has a concrete value.
/// Produced by [`crate::Engine::normalize`] by overlaying [`ImageDefaults`]
/// onto a [`RequestParams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionParams {
    pub id: u64,
    pub format: Format,
    pub quality: u32,
    pub width: u32,
    pub height: u32,
    pub max_bytes: u64,
    pub interpolation: Interpolation,
}

impl RenditionParams {
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }
}

/// A caller-supplied, possibly-partial rendition request. Unset fields are
/// filled in from the engine's [`ImageDefaults`] before fingerprinting.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub id: u64,
    pub format: Option<Format>,
    pub quality: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_bytes: Option<u64>,
    pub interpolation: Option<Interpolation>,
}

impl RequestParams {
    pub fn new(id: u64) -> Self {
        Self { id, ..Default::default() }
    }
}

/// Default rendition parameters applied when a request omits a field
/// (spec §6 `imageDefaults`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDefaults {
    pub format: Format,
    pub quality_jpeg: u32,
    pub quality_gif: u32,
    pub width: u32,
    pub height: u32,
    pub max_bytes: Size,
    pub interpolation: Interpolation,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            format: Format::Jpeg,
            quality_jpeg: 80,
            quality_gif: 256,
            width: 0,
            height: 0,
            max_bytes: Size::bytes(0),
            interpolation: Interpolation::default(),
        }
    }
}

/// A named rendition-parameter template, resolvable by any of its aliases
/// (spec §4.1 `GetPreset`, §6 `imagePresets`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub format: Option<Format>,
    pub quality: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_bytes: Option<u64>,
    #[serde(default)]
    pub interpolation: Option<Interpolation>,
}

impl Preset {
    /// Apply this preset's fields onto a request, preferring fields the
    /// request already set explicitly.
    pub fn apply(&self, mut req: RequestParams) -> RequestParams {
        req.format = req.format.or(self.format);
        req.quality = req.quality.or(self.quality);
        req.width = req.width.or(self.width);
        req.height = req.height.or(self.height);
        req.max_bytes = req.max_bytes.or(self.max_bytes);
        req.interpolation = req.interpolation.or(self.interpolation);
        req
    }
}
