//! Engine (spec §4.1, C6): coordinates the fingerprint, LRU, pipeline, and
//! originals store behind the public operations the HTTP surface calls.
//!
//! Grounded on `examples/original_source/images/images.go`'s
//! `ProcessAndCache`/`GetCachePath` gatekeeper flow, generalized with the
//! LRU index the Go revision in this snapshot didn't yet have, and on the
//! teacher's `ServerState` construction pattern in `server/src/types.rs`
//! (one struct owning every collaborator, built once at startup).

use crate::format::{Format, Interpolation};
use crate::fingerprint;
use crate::lru::{Lru, LruStat};
use crate::originals::OriginalsStore;
use crate::params::{ImageDefaults, Preset, RenditionParams, RequestParams};
use crate::pipeline;
use crate::size::Size;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Construction parameters (spec §6), reproduced field-for-field.
pub struct EngineOptions {
    pub originals_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Max number of cached renditions. Must be ≥1 (spec §6 `cacheMaxNum`).
    pub cache_capacity: usize,
    /// Advisory cap on total cache bytes (spec §6 `cacheMaxSize`; original
    /// `images/cache.go`'s `CacheRules.MaxSize`). Eviction stays governed by
    /// `cache_capacity` alone — this is carried for parity with the original
    /// but does not itself trigger eviction.
    pub cache_max_size: Size,
    /// Create `originals_dir`/`cache_dir` at construction if absent (spec §6
    /// `createDirs`; original `main.go`'s `WithCreateDirs`).
    pub create_dirs: bool,
    /// Walk both directories at startup and raise permissions to at least
    /// 0700 (dirs) / 0600 (files), never lowering them (spec §6
    /// `setPermissions`; original `routes_test.go`'s `images.WithSetPermissions`).
    pub set_permissions: bool,
    pub defaults: ImageDefaults,
    pub presets: Vec<Preset>,
}

/// Aggregate counters for [`Engine::stat`].
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub originals_count: usize,
    pub originals_bytes: u64,
    pub cache_items: usize,
    pub cache_capacity: usize,
    pub cache_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Per-id counters for [`Engine::stat_id`].
#[derive(Debug, Clone, Copy)]
pub struct IdStat {
    pub original_bytes: u64,
    pub cache_entries: usize,
    pub cache_bytes: u64,
}

pub struct Engine {
    originals: OriginalsStore,
    lru: Lru,
    cache_dir: PathBuf,
    defaults: ImageDefaults,
    presets: HashMap<String, Preset>,
    _remover: tokio::task::JoinHandle<()>,
}

impl Engine {
    /// Opens the originals and cache directories (creating them if absent),
    /// recovers monotonic id allocation, and spawns the file remover worker
    /// (spec §4.5).
    pub fn new(opts: EngineOptions) -> Result<Self> {
        if opts.cache_capacity < 1 {
            return Err(Error::invalid_params("cache_capacity must be >= 1"));
        }

        if opts.create_dirs {
            std::fs::create_dir_all(&opts.cache_dir)?;
        }
        let originals = OriginalsStore::open(&opts.originals_dir, opts.create_dirs)?;

        if opts.set_permissions {
            enforce_minimum_permissions(&opts.originals_dir)?;
            enforce_minimum_permissions(&opts.cache_dir)?;
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let remover = crate::remover::spawn(rx);
        let lru = Lru::new(opts.cache_capacity, opts.cache_dir.clone(), tx);

        let mut presets = HashMap::new();
        for preset in opts.presets {
            for alias in std::iter::once(preset.name.clone()).chain(preset.aliases.iter().cloned()) {
                presets.insert(alias, preset.clone());
            }
        }

        tracing::info!(
            originals_dir = %opts.originals_dir.display(),
            cache_dir = %opts.cache_dir.display(),
            capacity = opts.cache_capacity,
            "engine constructed"
        );

        Ok(Self { originals, lru, cache_dir: opts.cache_dir, defaults: opts.defaults, presets, _remover: remover })
    }

    /// Overlays `req` onto the engine's defaults to produce a fully
    /// resolved [`RenditionParams`] (spec §4.1 `Get`).
    pub fn normalize(&self, req: RequestParams) -> RenditionParams {
        let format = req.format.unwrap_or(self.defaults.format);
        let quality = req.quality.unwrap_or_else(|| match format {
            Format::Jpeg => self.defaults.quality_jpeg,
            Format::Gif => self.defaults.quality_gif,
            Format::Png => 0,
        });
        RenditionParams {
            id: req.id,
            format,
            quality,
            width: req.width.unwrap_or(self.defaults.width),
            height: req.height.unwrap_or(self.defaults.height),
            max_bytes: req.max_bytes.unwrap_or(self.defaults.max_bytes.as_u64()),
            interpolation: req.interpolation.unwrap_or(self.defaults.interpolation),
        }
    }

    /// Returns the absolute path of the requested rendition, producing and
    /// caching it on a miss (spec §4.1 `Get`).
    pub fn get(&self, req: RequestParams) -> Result<PathBuf> {
        let id = req.id;
        if !self.originals.contains(id) {
            return Err(Error::IdNotFound { id });
        }
        let params = self.normalize(req);
        let fp = fingerprint::compute(&params);
        let out_path = self.cache_dir.join(&fp);

        // The LRU entry is created before the pipeline runs (rather than
        // after, as a literal reading of the data-flow prose in spec.md
        // would suggest) so two concurrent misses for the same fingerprint
        // both observe a miss and race on the same output path instead of
        // each producing and registering their own entry — both write
        // byte-identical content since the pipeline is deterministic, so
        // the race is harmless (see SPEC_FULL.md / DESIGN.md).
        let was_present = self.lru.add_or_update(id, &fp);
        if was_present && out_path.exists() {
            return Ok(out_path);
        }

        let original = self.originals.read(id)?;
        pipeline::run(&original, &params, &out_path)?;
        tracing::debug!(id, fingerprint = %fp, "cache miss: rendition produced");
        Ok(out_path)
    }

    /// Validates and stores a new original (spec §4.1 `Add`).
    pub fn add(&self, data: &[u8]) -> Result<u64> {
        let id = self.originals.add(data)?;
        tracing::info!(id, bytes = data.len(), "original added");
        Ok(id)
    }

    /// Removes the original and every cache entry derived from it (spec
    /// §4.1 `Delete`).
    pub fn delete(&self, id: u64) -> Result<()> {
        self.originals.delete(id)?;
        let evicted = self.lru.delete(id);
        tracing::info!(id, evicted, "original deleted");
        Ok(())
    }

    /// All ids currently present in the originals store, ascending (spec
    /// §4.1 `Ids`).
    pub fn ids(&self) -> Result<Vec<u64>> {
        self.originals.enumerate()
    }

    /// Aggregate counters across originals and the cache index (spec §4.1
    /// `Stat`).
    pub fn stat(&self) -> Result<Stat> {
        let originals_count = self.originals.enumerate()?.len();
        let originals_bytes = self.originals.aggregate_size()?;
        let LruStat { items, capacity, hits, misses, evictions } = self.lru.stat();
        let mut cache_bytes = 0u64;
        for fp in self.lru.all_fingerprints() {
            if let Ok(meta) = std::fs::metadata(self.cache_dir.join(&fp)) {
                cache_bytes += meta.len();
            }
        }
        Ok(Stat {
            originals_count,
            originals_bytes,
            cache_items: items,
            cache_capacity: capacity,
            cache_bytes,
            hits,
            misses,
            evictions,
        })
    }

    /// Per-id counters (spec §4.1 `StatId`).
    pub fn stat_id(&self, id: u64) -> Result<IdStat> {
        let original_bytes = self.originals.size(id)?;
        let fingerprints = self.lru.get(id);
        let mut cache_bytes = 0u64;
        for fp in &fingerprints {
            if let Ok(meta) = std::fs::metadata(self.cache_dir.join(fp)) {
                cache_bytes += meta.len();
            }
        }
        Ok(IdStat { original_bytes, cache_entries: fingerprints.len(), cache_bytes })
    }

    /// Looks up a named rendition preset by name or alias (spec §4.1
    /// `GetPreset`).
    pub fn get_preset(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }
}

/// Walks `root` and raises every directory to at least 0700 and every file
/// to at least 0600, never lowering an existing mode that is already more
/// permissive (spec §6 `setPermissions`).
#[cfg(unix)]
fn enforce_minimum_permissions(root: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fn raise_mode(path: &std::path::Path, minimum: u32) -> Result<()> {
        let meta = std::fs::metadata(path)?;
        let current = meta.permissions().mode() & 0o777;
        let wanted = current | minimum;
        if wanted != current {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(wanted))?;
        }
        Ok(())
    }

    fn walk(dir: &std::path::Path) -> Result<()> {
        raise_mode(dir, 0o700)?;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                walk(&path)?;
            } else {
                raise_mode(&path, 0o600)?;
            }
        }
        Ok(())
    }

    walk(root)
}

#[cfg(not(unix))]
fn enforce_minimum_permissions(_root: &std::path::Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let mut img = image::RgbImage::new(100, 40);
        for (i, p) in img.pixels_mut().enumerate() {
            *p = image::Rgb([(i % 256) as u8, 10, 200]);
        }
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn test_engine(dir: &std::path::Path, capacity: usize) -> Engine {
        Engine::new(EngineOptions {
            originals_dir: dir.join("originals"),
            cache_dir: dir.join("cache"),
            cache_capacity: capacity,
            cache_max_size: Size::bytes(0),
            create_dirs: true,
            set_permissions: false,
            defaults: ImageDefaults::default(),
            presets: Vec::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn cache_hit_after_miss() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 4);
        let id = engine.add(&tiny_png()).unwrap();

        let req = || RequestParams {
            id,
            format: Some(Format::Jpeg),
            quality: Some(80),
            width: Some(100),
            height: Some(100),
            max_bytes: None,
            interpolation: None,
        };

        let path1 = engine.get(req()).unwrap();
        assert!(path1.exists());
        assert!(std::fs::metadata(&path1).unwrap().len() > 0);

        let path2 = engine.get(req()).unwrap();
        assert_eq!(path1, path2);

        let stat = engine.stat().unwrap();
        assert_eq!(stat.hits, 1);
        assert_eq!(stat.misses, 1);
        assert_eq!(stat.evictions, 0);
        assert_eq!(stat.cache_items, 1);
        assert_eq!(stat.cache_bytes, std::fs::metadata(&path1).unwrap().len());
    }

    #[tokio::test]
    async fn lru_eviction_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 3);
        let id_a = engine.add(&tiny_png()).unwrap();
        let id_b = engine.add(&tiny_png()).unwrap();
        let id_c = engine.add(&tiny_png()).unwrap();

        let req = |id: u64, w: u32| RequestParams {
            id,
            format: Some(Format::Jpeg),
            quality: Some(80),
            width: Some(w),
            height: Some(w),
            max_bytes: None,
            interpolation: None,
        };

        engine.get(req(id_a, 10)).unwrap(); // A
        engine.get(req(id_b, 20)).unwrap(); // B
        engine.get(req(id_c, 30)).unwrap(); // C (head)
        engine.get(req(id_a, 10)).unwrap(); // promote A to head (hit)
        engine.get(req(1_000_000, 40)).unwrap_err(); // no-op: invalid id, must not disturb LRU

        // fourth distinct fingerprint evicts the tail (B)
        let id_d = engine.add(&tiny_png()).unwrap();
        engine.get(req(id_d, 50)).unwrap();

        let stat = engine.stat().unwrap();
        assert_eq!(stat.evictions, 1);
        assert_eq!(stat.cache_items, 3);
        assert!(engine.lru.get(id_b).is_empty());
    }

    #[tokio::test]
    async fn delete_removes_all_derived_entries() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);
        let id = engine.add(&tiny_png()).unwrap();

        for w in [10u32, 20, 30] {
            engine
                .get(RequestParams {
                    id,
                    format: Some(Format::Jpeg),
                    quality: Some(80),
                    width: Some(w),
                    height: Some(w),
                    max_bytes: None,
                    interpolation: None,
                })
                .unwrap();
        }

        engine.delete(id).unwrap();
        let stat = engine.stat().unwrap();
        assert_eq!(stat.cache_items, 0);
        assert_eq!(stat.evictions, 3);
        assert!(!engine.ids().unwrap().contains(&id));
    }

    #[tokio::test]
    async fn invalid_upload_does_not_allocate_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);
        let before = engine.ids().unwrap();
        let err = engine.add(b"not an image").unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
        assert_eq!(engine.ids().unwrap(), before);

        let id = engine.add(&tiny_png()).unwrap();
        assert_eq!(id, 1, "allocator must not have advanced past the failed attempt");
    }

    #[tokio::test]
    async fn monotonic_ids_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = test_engine(dir.path(), 10);
            for _ in 0..3 {
                engine.add(&tiny_png()).unwrap();
            }
        }
        let engine2 = test_engine(dir.path(), 10);
        let id = engine2.add(&tiny_png()).unwrap();
        assert_eq!(id, 4);
    }

    #[tokio::test]
    async fn get_missing_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);
        let err = engine.get(RequestParams::new(999)).unwrap_err();
        assert!(matches!(err, Error::IdNotFound { id: 999 }));
    }

    #[test]
    fn preset_lookup_resolves_by_alias() {
        let dir = tempfile::tempdir().unwrap();
        let preset = Preset {
            name: "thumbnail".to_string(),
            aliases: vec!["thumb".to_string()],
            format: Some(Format::Jpeg),
            quality: Some(70),
            width: Some(128),
            height: Some(128),
            max_bytes: None,
            interpolation: Some(Interpolation::Lanczos3),
        };
        let engine = Engine::new(EngineOptions {
            originals_dir: dir.path().join("originals"),
            cache_dir: dir.path().join("cache"),
            cache_capacity: 10,
            cache_max_size: Size::bytes(0),
            create_dirs: true,
            set_permissions: false,
            defaults: ImageDefaults::default(),
            presets: vec![preset],
        })
        .unwrap();

        assert!(engine.get_preset("thumbnail").is_some());
        assert!(engine.get_preset("thumb").is_some());
        assert!(engine.get_preset("nonexistent").is_none());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Engine::new(EngineOptions {
            originals_dir: dir.path().join("originals"),
            cache_dir: dir.path().join("cache"),
            cache_capacity: 0,
            cache_max_size: Size::bytes(0),
            create_dirs: true,
            set_permissions: false,
            defaults: ImageDefaults::default(),
            presets: Vec::new(),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }
}
