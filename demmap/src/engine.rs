//! High-level elevation engine.
//!
//! [`DemEngine`] owns a [`DirectorySource`], the [`TileIndex`] built from it
//! and a [`TileSampler`], and offers point queries, batched queries and
//! height map rendering over them.
//!
//! ```ignore
//! use demmap::{DemEngineBuilder, GeoCoord, PolicyKind};
//!
//! let engine = DemEngineBuilder::new(["/data/srtm", "/data/bil"])
//!     .cache_budget(demmap::cache::mib(256))
//!     .eviction(PolicyKind::Lfu)
//!     .build()?;
//!
//! println!("{:?}", engine.elevation(35.3606, 138.7274));
//!
//! let map = engine.build_map::<u8>(1024, 1024, GeoCoord::new(35.0, 138.0), GeoCoord::new(36.0, 139.0), true);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::builder::{ElevationRange, HeightMap, HeightMapBuilder, RasterValue};
use crate::cache::{mib, CacheStats, PolicyKind};
use crate::coord::GeoCoord;
use crate::error::{DemError, Result};
use crate::index::{ScanReport, TileId, TileIndex};
use crate::manifest;
use crate::projection::ProjectionKind;
use crate::sampler::TileSampler;
use crate::source::{ByteSource, DirectorySource};

/// Default cache budget in MiB.
pub const DEFAULT_CACHE_MB: u64 = 512;

/// Tile engine over one or more data directories.
pub struct DemEngine {
    roots: Vec<PathBuf>,
    index: TileIndex,
    sampler: TileSampler,
    report: ScanReport,
    elevation_range: Option<ElevationRange>,
    projection: ProjectionKind,
}

impl DemEngine {
    /// Create a builder for the given data directories.
    pub fn builder<I, P>(data_dirs: I) -> DemEngineBuilder
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        DemEngineBuilder::new(data_dirs)
    }

    /// The tile index built at startup.
    pub fn index(&self) -> &TileIndex {
        &self.index
    }

    /// The shared sampler and its tile cache.
    pub fn sampler(&self) -> &TileSampler {
        &self.sampler
    }

    /// Data directories in precedence order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Counters of the scan or manifest import that built the index.
    pub fn scan_report(&self) -> &ScanReport {
        &self.report
    }

    /// Elevation at a coordinate.
    ///
    /// Returns `None` when no tile covers the point or its tile cannot be
    /// read. Voids and other negative samples read as 0.
    pub fn elevation(&self, lat: f64, lon: f64) -> Option<i16> {
        let coord = GeoCoord::new(lat, lon);
        let descriptor = self.index.find_tile(coord)?;
        let data = self.sampler.load(descriptor)?;
        Some(data.sample(descriptor, coord))
    }

    /// Elevations for a batch of `(lat, lon)` pairs.
    ///
    /// Coordinates are grouped by tile so each tile is loaded once. Points
    /// without data get `default`.
    pub fn elevations_batch(&self, coords: &[(f64, f64)], default: i16) -> Vec<i16> {
        let mut results = vec![default; coords.len()];

        let mut groups: BTreeMap<TileId, Vec<usize>> = BTreeMap::new();
        for (i, &c) in coords.iter().enumerate() {
            if let Some(id) = self.index.locate(c.into()) {
                groups.entry(id).or_default().push(i);
            }
        }

        for (id, indices) in &groups {
            let Some(descriptor) = self.index.get(*id) else {
                continue;
            };
            let Some(data) = self.sampler.load(descriptor) else {
                continue; // missing tile → all coords get default
            };
            for &i in indices {
                results[i] = data.sample(descriptor, coords[i].into());
            }
        }

        results
    }

    /// A height map builder preconfigured with this engine's projection and
    /// elevation range.
    pub fn map_builder(&self) -> HeightMapBuilder<'_> {
        HeightMapBuilder::new(&self.index, &self.sampler)
            .projection(self.projection)
            .elevation_range(self.elevation_range)
    }

    /// Render a height map; see [`HeightMapBuilder::build`].
    pub fn build_map<T: RasterValue>(
        &self,
        width: u32,
        height: u32,
        min: GeoCoord,
        max: GeoCoord,
        keep_aspect_ratio: bool,
    ) -> Option<HeightMap<T>> {
        self.map_builder()
            .build(width, height, min, max, keep_aspect_ratio)
    }

    /// Write the tile manifest of the current index.
    pub fn export_manifest<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        manifest::export(&self.index, path)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.sampler.stats()
    }

    /// Drop a cached tile by its logical path.
    pub fn invalidate_tile(&self, path: &str) -> bool {
        self.sampler.invalidate(path)
    }

    /// Clear all tiles from the cache.
    pub fn clear_cache(&self) {
        self.sampler.clear_cache();
    }
}

/// Builder for creating a [`DemEngine`] with custom configuration.
#[derive(Debug, Clone)]
pub struct DemEngineBuilder {
    data_dirs: Vec<PathBuf>,
    cache_budget: u64,
    eviction: PolicyKind,
    manifest: Option<PathBuf>,
    elevation_range: Option<(f64, f64)>,
    projection: ProjectionKind,
}

impl DemEngineBuilder {
    /// Create a builder reading tiles from `data_dirs`.
    pub fn new<I, P>(data_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let range = ElevationRange::default();
        Self {
            data_dirs: data_dirs
                .into_iter()
                .map(|p| p.as_ref().to_path_buf())
                .collect(),
            cache_budget: mib(DEFAULT_CACHE_MB),
            eviction: PolicyKind::default(),
            manifest: None,
            elevation_range: Some((range.min, range.max)),
            projection: ProjectionKind::default(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DEMMAP_DATA_DIR` | Data directories, separated like `PATH` | Required |
    /// | `DEMMAP_CACHE_MB` | Cache budget in MiB | 512 |
    /// | `DEMMAP_CACHE_POLICY` | `lru` or `lfu` | `lru` |
    /// | `DEMMAP_MANIFEST` | Tile manifest to import instead of scanning | None |
    ///
    /// # Errors
    ///
    /// Returns an error if `DEMMAP_DATA_DIR` is not set or a value does not
    /// parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dirs = lookup("DEMMAP_DATA_DIR").ok_or_else(|| {
            DemError::Config("DEMMAP_DATA_DIR environment variable not set".to_string())
        })?;
        let mut builder = Self::new(std::env::split_paths(&dirs));

        if let Some(mb) = lookup("DEMMAP_CACHE_MB") {
            let mb: u64 = mb.trim().parse().map_err(|_| {
                DemError::Config(format!("DEMMAP_CACHE_MB must be an integer, got '{}'", mb))
            })?;
            builder.cache_budget = mib(mb);
        }
        if let Some(policy) = lookup("DEMMAP_CACHE_POLICY") {
            builder.eviction = policy.trim().parse()?;
        }
        if let Some(manifest) = lookup("DEMMAP_MANIFEST") {
            builder.manifest = Some(PathBuf::from(manifest));
        }
        Ok(builder)
    }

    /// Add a data directory after the existing ones.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Cache budget in bytes.
    pub fn cache_budget(mut self, bytes: u64) -> Self {
        self.cache_budget = bytes;
        self
    }

    /// Eviction policy of the tile cache.
    pub fn eviction(mut self, policy: PolicyKind) -> Self {
        self.eviction = policy;
        self
    }

    /// Import the index from a manifest instead of scanning.
    ///
    /// If the manifest cannot be read the directories are scanned.
    pub fn manifest<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.manifest = Some(path.as_ref().to_path_buf());
        self
    }

    /// Scan the data directories even if a manifest was configured.
    pub fn skip_manifest(mut self) -> Self {
        self.manifest = None;
        self
    }

    /// Elevation range mapped onto the output type. Default is 0 to 9000 m.
    pub fn elevation_range(mut self, min: f64, max: f64) -> Self {
        self.elevation_range = Some((min, max));
        self
    }

    /// Write raw elevations instead of mapping a range.
    pub fn passthrough(mut self) -> Self {
        self.elevation_range = None;
        self
    }

    pub fn projection(mut self, kind: ProjectionKind) -> Self {
        self.projection = kind;
        self
    }

    /// Build the [`DemEngine`].
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory is configured or the elevation
    /// range is empty.
    pub fn build(self) -> Result<DemEngine> {
        if self.data_dirs.is_empty() {
            return Err(DemError::Config("no data directory configured".to_string()));
        }
        let elevation_range = self
            .elevation_range
            .map(|(min, max)| ElevationRange::new(min, max))
            .transpose()?;

        let source = DirectorySource::new(&self.data_dirs);
        let (index, report) = match &self.manifest {
            Some(path) => match manifest::import(path) {
                Ok(imported) => imported,
                Err(e) => {
                    warn!(
                        manifest = %path.display(),
                        error = %e,
                        "cannot use tile manifest, scanning data directories"
                    );
                    TileIndex::scan(&source)
                }
            },
            None => TileIndex::scan(&source),
        };

        info!(
            tiles = index.len(),
            roots = self.data_dirs.len(),
            cache_mb = self.cache_budget / mib(1),
            policy = %self.eviction,
            "elevation engine ready"
        );

        let source: Arc<dyn ByteSource> = Arc::new(source);
        Ok(DemEngine {
            roots: self.data_dirs,
            index,
            sampler: TileSampler::new(source, self.cache_budget, self.eviction),
            report,
            elevation_range,
            projection: self.projection,
        })
    }
}
