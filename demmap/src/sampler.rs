//! Lazy tile decoding.
//!
//! [`TileSampler`] turns a descriptor and a coordinate into an elevation. Raw
//! tile bytes are read from the [`ByteSource`] on first use and kept in a
//! [`BoundedCache`] keyed by the tile path. Buffers are shared as
//! `Arc<TileData>`, so evicting a tile never frees memory a reader still
//! holds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{BoundedCache, CacheStats, PolicyKind};
use crate::coord::GeoCoord;
use crate::error::{DemError, Result};
use crate::source::ByteSource;
use crate::tile::{SampleFormat, TileDescriptor};

/// Raw bytes of one tile.
#[derive(Debug, Clone)]
pub struct TileData {
    bytes: Vec<u8>,
}

impl TileData {
    /// Wrap a tile buffer as read from its source.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Buffer length in bytes, which is also its cache weight.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw, undecoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode sample number `index`, without clamping.
    ///
    /// HGT samples are big-endian, BIL samples are in host byte order. A
    /// 1-byte legacy sample is the byte value itself. Returns `None` past
    /// the end of the buffer.
    pub fn raw_value(&self, index: usize, format: SampleFormat, bytes_per_sample: u8) -> Option<i16> {
        match bytes_per_sample {
            1 => self.bytes.get(index).map(|&b| b as i16),
            _ => {
                let offset = index.checked_mul(2)?;
                let pair = self.bytes.get(offset..offset + 2)?;
                let pair = [pair[0], pair[1]];
                Some(match format {
                    SampleFormat::Hgt => i16::from_be_bytes(pair),
                    SampleFormat::Bil => i16::from_ne_bytes(pair),
                })
            }
        }
    }

    /// Elevation at `coord` in this tile.
    ///
    /// Points outside the footprint, samples past the end of a truncated
    /// buffer and negative values (including voids) all read as 0.
    pub fn sample(&self, descriptor: &TileDescriptor, coord: GeoCoord) -> i16 {
        let Some(index) = sample_index(descriptor, coord) else {
            return 0;
        };
        self.raw_value(index, descriptor.format, descriptor.bytes_per_sample)
            .unwrap_or(0)
            .max(0)
    }
}

/// Sample index of `coord`, or `None` outside the footprint.
///
/// Row 0 of a tile file is its northern edge.
pub fn sample_index(d: &TileDescriptor, coord: GeoCoord) -> Option<usize> {
    let d_lon = coord.lon - d.min_lon;
    let d_lat = coord.lat - d.min_lat;

    if !(0.0..=d.step_lon).contains(&d_lon) || !(0.0..=d.step_lat).contains(&d_lat) {
        return None;
    }
    if d.width == 0 || d.height == 0 {
        return None;
    }

    let x = (d_lon / d.pixel_step_lon).floor() as i64;
    let y = (d_lat / d.pixel_step_lat).floor() as i64;

    let col = x.clamp(0, d.width as i64 - 1);
    let row = (d.height as i64 - 1 - y).clamp(0, d.height as i64 - 1);

    Some((col + row * d.width as i64) as usize)
}

/// Cached access to tile samples.
pub struct TileSampler {
    source: Arc<dyn ByteSource>,
    cache: BoundedCache<String, Arc<TileData>>,
    loads: AtomicU64,
}

impl TileSampler {
    /// Create a sampler reading from `source` with a cache of
    /// `cache_budget_bytes`.
    pub fn new(source: Arc<dyn ByteSource>, cache_budget_bytes: u64, policy: PolicyKind) -> Self {
        Self {
            source,
            cache: BoundedCache::with_policy(cache_budget_bytes, policy),
            loads: AtomicU64::new(0),
        }
    }

    /// Elevation at `coord` in the tile `descriptor`.
    ///
    /// Returns 0 outside the footprint and when the tile cannot be loaded.
    pub fn sample(&self, descriptor: &TileDescriptor, coord: GeoCoord) -> i16 {
        if sample_index(descriptor, coord).is_none() {
            return 0;
        }
        match self.load(descriptor) {
            Some(data) => data.sample(descriptor, coord),
            None => 0,
        }
    }

    /// Buffer of a tile, from cache or source. Failures are logged.
    pub fn load(&self, descriptor: &TileDescriptor) -> Option<Arc<TileData>> {
        match self.try_load(descriptor) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(path = %descriptor.path, error = %e, "tile unavailable, sampling as 0");
                None
            }
        }
    }

    /// Buffer of a tile, from cache or source.
    pub fn try_load(&self, descriptor: &TileDescriptor) -> Result<Arc<TileData>> {
        if let Some(data) = self.cache.get(&descriptor.path) {
            return Ok(data);
        }

        let bytes = self
            .source
            .read_all(&descriptor.path)
            .ok_or_else(|| DemError::TileUnavailable {
                path: descriptor.path.clone(),
            })?;
        self.loads.fetch_add(1, Ordering::Relaxed);

        if (bytes.len() as u64) < descriptor.byte_len() {
            warn!(
                path = %descriptor.path,
                expected = descriptor.byte_len(),
                actual = bytes.len(),
                "tile file is truncated"
            );
        }

        let size = bytes.len() as u64;
        let data = Arc::new(TileData::new(bytes));
        let outcome = self
            .cache
            .insert(descriptor.path.clone(), Arc::clone(&data), size);

        for evicted in &outcome.evicted {
            if Arc::ptr_eq(evicted, &data) {
                warn!(path = %descriptor.path, "releasing currently loaded tile data");
            }
        }
        debug!(
            path = %descriptor.path,
            bytes = size,
            evicted = outcome.evicted.len(),
            "loaded tile"
        );

        Ok(data)
    }

    /// Number of reads issued to the byte source.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop a cached tile, e.g. after its file changed.
    pub fn invalidate(&self, path: &str) -> bool {
        self.cache.remove(&path.to_string())
    }

    /// Drop every cached tile.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
