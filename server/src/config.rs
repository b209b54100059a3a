//! Configuration loading (SPEC_FULL §6, C10): an `imgcache.toml` file,
//! overridden by CLI flags, validated once at startup into
//! [`imgcache_core::EngineOptions`].
//!
//! Grounded on the teacher's `parse_repos_toml`/`.codescope.toml` loading in
//! `server/src/main.rs` (parse a TOML file, fall back to defaults on a
//! missing file, abort with a logged error on a malformed one) and on the
//! original Go system's `config.go`, which loads server options from a YAML
//! file the same way.

use imgcache_core::{Format, ImageDefaults, Interpolation, Preset, Size};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk shape of `imgcache.toml`. Every field is optional; absent fields
/// take the engine's own defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub originals_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cache_capacity: Option<usize>,
    pub cache_max_size: Option<String>,
    pub create_dirs: Option<bool>,
    pub set_permissions: Option<bool>,
    pub defaults: Option<DefaultsConfig>,
    #[serde(default)]
    pub presets: Vec<PresetConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DefaultsConfig {
    pub format: Option<String>,
    pub quality_jpeg: Option<u32>,
    pub quality_gif: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_bytes: Option<String>,
    pub interpolation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PresetConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub format: Option<String>,
    pub quality: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_bytes: Option<String>,
    pub interpolation: Option<String>,
}

/// Fully resolved server configuration, ready to build an
/// [`imgcache_core::EngineOptions`] and bind an HTTP listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub originals_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub cache_capacity: usize,
    pub cache_max_size: Size,
    pub create_dirs: bool,
    pub set_permissions: bool,
    pub defaults: ImageDefaults,
    pub presets: Vec<Preset>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            originals_dir: PathBuf::from("originals"),
            cache_dir: PathBuf::from("cache"),
            cache_capacity: 1000,
            cache_max_size: Size::bytes(1024 * 1024 * 1024),
            create_dirs: true,
            set_permissions: false,
            defaults: ImageDefaults::default(),
            presets: Vec::new(),
        }
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// CLI overrides layered on top of a loaded (or default) [`FileConfig`].
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub originals_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cache_capacity: Option<usize>,
    pub cache_max_size: Option<String>,
    pub create_dirs: Option<bool>,
    pub set_permissions: Option<bool>,
}

/// Loads `path` if it exists (an absent file is not an error — the binary
/// runs on defaults), then applies `overrides`.
pub fn load(path: &Path, overrides: CliOverrides) -> Result<ServerConfig, ConfigError> {
    let file_config = if path.exists() {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })?
    } else {
        FileConfig::default()
    };

    resolve(file_config, overrides)
}

fn resolve(file: FileConfig, overrides: CliOverrides) -> Result<ServerConfig, ConfigError> {
    let base = ServerConfig::default();

    let defaults = match file.defaults {
        Some(d) => resolve_defaults(d)?,
        None => ImageDefaults::default(),
    };

    let mut presets = Vec::with_capacity(file.presets.len());
    for p in file.presets {
        presets.push(resolve_preset(p)?);
    }

    let cache_max_size = match overrides.cache_max_size.or(file.cache_max_size) {
        Some(s) => s.parse().map_err(|e: imgcache_core::ParseSizeError| ConfigError::Invalid(e.to_string()))?,
        None => base.cache_max_size,
    };

    Ok(ServerConfig {
        bind: overrides.bind.or(file.bind).unwrap_or(base.bind),
        port: overrides.port.or(file.port).unwrap_or(base.port),
        originals_dir: overrides.originals_dir.or(file.originals_dir).unwrap_or(base.originals_dir),
        cache_dir: overrides.cache_dir.or(file.cache_dir).unwrap_or(base.cache_dir),
        cache_capacity: overrides.cache_capacity.or(file.cache_capacity).unwrap_or(base.cache_capacity),
        cache_max_size,
        create_dirs: overrides.create_dirs.or(file.create_dirs).unwrap_or(base.create_dirs),
        set_permissions: overrides.set_permissions.or(file.set_permissions).unwrap_or(base.set_permissions),
        defaults,
        presets,
    })
}

fn resolve_defaults(d: DefaultsConfig) -> Result<ImageDefaults, ConfigError> {
    let base = ImageDefaults::default();
    Ok(ImageDefaults {
        format: parse_opt(d.format, "defaults.format")?.unwrap_or(base.format),
        quality_jpeg: d.quality_jpeg.unwrap_or(base.quality_jpeg),
        quality_gif: d.quality_gif.unwrap_or(base.quality_gif),
        width: d.width.unwrap_or(base.width),
        height: d.height.unwrap_or(base.height),
        max_bytes: parse_opt(d.max_bytes, "defaults.max_bytes")?.unwrap_or(base.max_bytes),
        interpolation: parse_opt(d.interpolation, "defaults.interpolation")?.unwrap_or(base.interpolation),
    })
}

fn resolve_preset(p: PresetConfig) -> Result<Preset, ConfigError> {
    Ok(Preset {
        name: p.name,
        aliases: p.aliases,
        format: parse_opt::<Format>(p.format, "presets[].format")?,
        quality: p.quality,
        width: p.width,
        height: p.height,
        max_bytes: parse_opt::<imgcache_core::Size>(p.max_bytes, "presets[].max_bytes")?
            .map(|s| s.as_u64()),
        interpolation: parse_opt::<Interpolation>(p.interpolation, "presets[].interpolation")?,
    })
}

fn parse_opt<T>(value: Option<String>, field: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|e| ConfigError::Invalid(format!("{field}: {e}"))),
    }
}

impl From<&ServerConfig> for imgcache_core::EngineOptions {
    fn from(cfg: &ServerConfig) -> Self {
        imgcache_core::EngineOptions {
            originals_dir: cfg.originals_dir.clone(),
            cache_dir: cfg.cache_dir.clone(),
            cache_capacity: cfg.cache_capacity,
            cache_max_size: cfg.cache_max_size,
            create_dirs: cfg.create_dirs,
            set_permissions: cfg.set_permissions,
            defaults: cfg.defaults.clone(),
            presets: cfg.presets.clone(),
        }
    }
}
