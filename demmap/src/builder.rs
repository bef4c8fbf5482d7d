//! Height map rendering.
//!
//! [`HeightMapBuilder`] rasterizes a geographic frame. Every output pixel is
//! inverse-projected at its centre and assigned to the tile covering it.
//! Pixels are then processed tile by tile, so each tile's bytes are loaded
//! at most once per build no matter how many pixels it covers.
//!
//! ```ignore
//! use demmap::{GeoCoord, HeightMapBuilder, ElevationRange};
//!
//! let map = HeightMapBuilder::new(&index, &sampler)
//!     .elevation_range(Some(ElevationRange::default()))
//!     .build::<u8>(512, 512, GeoCoord::new(45.0, 5.0), GeoCoord::new(48.0, 11.0), true);
//!
//! match map {
//!     Some(map) => std::fs::write("alps.raw", map.to_le_bytes())?,
//!     None => println!("no data in region"),
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::coord::GeoCoord;
use crate::error::{DemError, Result};
use crate::index::{TileId, TileIndex};
use crate::projection::{Projection, ProjectionKind};
use crate::sampler::TileSampler;

/// Default elevation range mapped onto the output type, in meters.
pub const DEFAULT_MIN_ELEVATION: f64 = 0.0;
pub const DEFAULT_MAX_ELEVATION: f64 = 9000.0;

/// Numeric type of a raster cell.
///
/// Integer types round to nearest and saturate at their bounds. With an
/// [`ElevationRange`], elevations are mapped linearly onto
/// `[MAP_MIN, MAP_MAX]`: the full non-negative range for integers, `[0, 1]`
/// for floats.
pub trait RasterValue: Copy + Default + Send + Sync + PartialEq + std::fmt::Debug + 'static {
    const MAP_MIN: f64;
    const MAP_MAX: f64;

    /// Convert a value, saturating at the bounds of the type.
    fn from_f64(v: f64) -> Self;

    /// Append the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! integer_raster_value {
    ($($t:ty),*) => {$(
        impl RasterValue for $t {
            const MAP_MIN: f64 = 0.0;
            const MAP_MAX: f64 = <$t>::MAX as f64;

            fn from_f64(v: f64) -> Self {
                // `as` saturates out-of-range values and maps NaN to 0
                v.round() as $t
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

macro_rules! float_raster_value {
    ($($t:ty),*) => {$(
        impl RasterValue for $t {
            const MAP_MIN: f64 = 0.0;
            const MAP_MAX: f64 = 1.0;

            fn from_f64(v: f64) -> Self {
                v as $t
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

integer_raster_value!(u8, u16, i16, i32);
float_raster_value!(f32, f64);

/// Elevation interval mapped onto the output type's range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ElevationRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_ELEVATION,
            max: DEFAULT_MAX_ELEVATION,
        }
    }
}

impl ElevationRange {
    /// Create a range. `max` must be greater than `min`.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(DemError::Config(format!(
                "invalid elevation range [{}, {}]",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Map `elevation` linearly onto `T`'s output range, clamped.
    pub fn map<T: RasterValue>(&self, elevation: i16) -> T {
        let t = (elevation as f64 - self.min) * (T::MAP_MAX - T::MAP_MIN) / (self.max - self.min);
        T::from_f64((T::MAP_MIN + t).clamp(T::MAP_MIN, T::MAP_MAX))
    }
}

/// Counters from one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Distinct tiles that covered at least one pixel.
    pub tiles_used: usize,
    /// Covering tiles whose bytes could not be loaded.
    pub tiles_failed: usize,
    /// Pixels that fell inside some tile.
    pub covered_pixels: usize,
    /// Wall time of the build in milliseconds.
    pub elapsed_ms: u64,
}

/// A rendered raster, row-major with row 0 at the north.
#[derive(Debug, Clone)]
pub struct HeightMap<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
    stats: BuildStats,
}

impl<T: RasterValue> HeightMap<T> {
    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All cells, row-major from the north-west corner.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Cell at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Tile and coverage counters from the build.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Take the cell vector without copying.
    pub fn into_raw(self) -> Vec<T> {
        self.data
    }

    /// Raw little-endian cell bytes, row-major.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * std::mem::size_of::<T>());
        for v in &self.data {
            v.write_le(&mut out);
        }
        out
    }
}

/// Renders height maps from an index and a sampler.
pub struct HeightMapBuilder<'a> {
    index: &'a TileIndex,
    sampler: &'a TileSampler,
    projection: ProjectionKind,
    range: Option<ElevationRange>,
    parallel: bool,
    cancel: Option<CancellationToken>,
}

impl<'a> HeightMapBuilder<'a> {
    pub fn new(index: &'a TileIndex, sampler: &'a TileSampler) -> Self {
        Self {
            index,
            sampler,
            projection: ProjectionKind::default(),
            range: None,
            parallel: true,
            cancel: None,
        }
    }

    /// Projection used to place pixels. Default is Mercator.
    pub fn projection(mut self, kind: ProjectionKind) -> Self {
        self.projection = kind;
        self
    }

    /// Map elevations linearly from `range`, or pass them through with `None`.
    pub fn elevation_range(mut self, range: Option<ElevationRange>) -> Self {
        self.range = range;
        self
    }

    /// Use the rayon thread pool for classification and sampling.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Token checked before each tile group is processed.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Render a `width`×`height` raster of the box spanned by `min` and `max`.
    ///
    /// Returns `None` when no tile covers any pixel. Invalid frames and
    /// cancellation are logged and also yield `None`; use
    /// [`try_build`](Self::try_build) to tell them apart.
    pub fn build<T: RasterValue>(
        &self,
        width: u32,
        height: u32,
        min: GeoCoord,
        max: GeoCoord,
        keep_aspect_ratio: bool,
    ) -> Option<HeightMap<T>> {
        match self.try_build(width, height, min, max, keep_aspect_ratio) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "height map build failed");
                None
            }
        }
    }

    /// Like [`build`](Self::build), reporting invalid frames and cancellation.
    pub fn try_build<T: RasterValue>(
        &self,
        width: u32,
        height: u32,
        min: GeoCoord,
        max: GeoCoord,
        keep_aspect_ratio: bool,
    ) -> Result<Option<HeightMap<T>>> {
        let start = Instant::now();
        let (min, max) = self.validate_frame(width, height, min, max)?;

        let mut projection = self.projection.build();
        projection.set_frame(min, max, width, height, keep_aspect_ratio);
        let projection: &dyn Projection = projection.as_ref();

        debug!(
            width,
            height,
            min = %min,
            max = %max,
            projection = %self.projection,
            "building height map"
        );

        let groups = self.classify(projection, width, height);
        if groups.is_empty() {
            debug!("no tile covers the frame");
            return Ok(None);
        }

        let mut data = vec![T::default(); width as usize * height as usize];
        let mut stats = BuildStats {
            tiles_used: groups.len(),
            covered_pixels: groups.values().map(Vec::len).sum(),
            ..BuildStats::default()
        };

        if self.parallel {
            let filled: Vec<(&Vec<usize>, Option<Vec<T>>)> = groups
                .par_iter()
                .map(|(&id, pixels)| -> Result<(&Vec<usize>, Option<Vec<T>>)> {
                    self.check_cancelled()?;
                    Ok((pixels, self.sample_group(projection, width, id, pixels)))
                })
                .collect::<Result<_>>()?;

            for (pixels, values) in filled {
                match values {
                    Some(values) => {
                        for (&p, v) in pixels.iter().zip(values) {
                            data[p] = v;
                        }
                    }
                    None => stats.tiles_failed += 1,
                }
            }
        } else {
            for (&id, pixels) in &groups {
                self.check_cancelled()?;
                match self.sample_group::<T>(projection, width, id, pixels) {
                    Some(values) => {
                        for (&p, v) in pixels.iter().zip(values) {
                            data[p] = v;
                        }
                    }
                    None => stats.tiles_failed += 1,
                }
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            tiles = stats.tiles_used,
            failed = stats.tiles_failed,
            pixels = stats.covered_pixels,
            elapsed_ms = stats.elapsed_ms,
            "height map built"
        );

        Ok(Some(HeightMap {
            width,
            height,
            data,
            stats,
        }))
    }

    fn validate_frame(
        &self,
        width: u32,
        height: u32,
        a: GeoCoord,
        b: GeoCoord,
    ) -> Result<(GeoCoord, GeoCoord)> {
        if width == 0 || height == 0 {
            return Err(DemError::InvalidFrame(format!(
                "raster size {}x{} has no pixels",
                width, height
            )));
        }
        if !(a.is_finite() && b.is_finite()) {
            return Err(DemError::InvalidFrame("non-finite frame corner".to_string()));
        }

        let min = a.min(b);
        let max = a.max(b);
        if min.lat == max.lat || min.lon == max.lon {
            return Err(DemError::InvalidFrame(format!(
                "frame {} - {} has zero extent",
                min, max
            )));
        }

        if !(self.projection.represents_lat(min.lat) && self.projection.represents_lat(max.lat)) {
            return Err(DemError::InvalidFrame(format!(
                "latitude range [{}, {}] exceeds {} limits",
                min.lat, max.lat, self.projection
            )));
        }
        Ok((min, max))
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(DemError::Cancelled),
            _ => Ok(()),
        }
    }

    fn pixel_coord(projection: &dyn Projection, width: u32, pixel: usize) -> GeoCoord {
        let x = (pixel % width as usize) as f64 + 0.5;
        let y = (pixel / width as usize) as f64 + 0.5;
        projection.project_inverse(x, y)
    }

    /// Group pixel indices by covering tile, in ascending pixel order.
    fn classify(&self, projection: &dyn Projection, width: u32, height: u32) -> BTreeMap<TileId, Vec<usize>> {
        let count = width as usize * height as usize;
        let locate = |p: usize| self.index.locate(Self::pixel_coord(projection, width, p));

        let ids: Vec<Option<TileId>> = if self.parallel {
            (0..count).into_par_iter().map(locate).collect()
        } else {
            (0..count).map(locate).collect()
        };

        let mut groups: BTreeMap<TileId, Vec<usize>> = BTreeMap::new();
        for (pixel, id) in ids.into_iter().enumerate() {
            if let Some(id) = id {
                groups.entry(id).or_default().push(pixel);
            }
        }
        groups
    }

    /// Values for every pixel of one group, or `None` if the tile is unavailable.
    fn sample_group<T: RasterValue>(
        &self,
        projection: &dyn Projection,
        width: u32,
        id: TileId,
        pixels: &[usize],
    ) -> Option<Vec<T>> {
        let descriptor = self.index.get(id)?;
        let data = self.sampler.load(descriptor)?;

        let values = pixels
            .iter()
            .map(|&p| {
                let elevation = data.sample(descriptor, Self::pixel_coord(projection, width, p));
                match &self.range {
                    Some(range) => range.map::<T>(elevation),
                    None => T::from_f64(elevation as f64),
                }
            })
            .collect();
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PolicyKind;
    use crate::source::MemorySource;
    use crate::tile::{SampleFormat, TileDescriptor};
    use std::sync::Arc;

    const SAMPLES: u32 = 21;

    fn constant_tile(value: i16) -> Vec<u8> {
        (0..SAMPLES * SAMPLES).flat_map(|_| value.to_be_bytes()).collect()
    }

    fn descriptor(path: &str, lat: f64, lon: f64, step: f64) -> TileDescriptor {
        TileDescriptor::new(path, lat, lon, step, step, SAMPLES, SAMPLES, SampleFormat::Hgt, 2)
    }

    /// One 2°×2° tile at (10, 10) of constant 500m.
    fn single_tile() -> (TileIndex, TileSampler) {
        let mut index = TileIndex::new();
        index.add_tile(descriptor("big.hgt", 10.0, 10.0, 2.0));
        let source = MemorySource::new().with_file("big.hgt", constant_tile(500));
        let sampler = TileSampler::new(Arc::new(source), 1 << 20, PolicyKind::Lru);
        (index, sampler)
    }

    fn frame(lo: f64, hi: f64) -> (GeoCoord, GeoCoord) {
        (GeoCoord::new(lo, lo), GeoCoord::new(hi, hi))
    }

    #[test]
    fn test_covered_frame_maps_range() {
        let (index, sampler) = single_tile();
        let (min, max) = frame(10.0, 12.0);

        let map = HeightMapBuilder::new(&index, &sampler)
            .elevation_range(Some(ElevationRange::new(0.0, 1000.0).unwrap()))
            .build::<u8>(4, 4, min, max, false)
            .unwrap();

        assert_eq!(map.data().len(), 16);
        assert!(map.data().iter().all(|&v| v == 127 || v == 128), "{:?}", map.data());
        assert_eq!(map.stats().tiles_used, 1);
        assert_eq!(map.stats().covered_pixels, 16);
    }

    #[test]
    fn test_uncovered_frame_is_none() {
        let (index, sampler) = single_tile();
        let (min, max) = frame(50.0, 52.0);

        let map = HeightMapBuilder::new(&index, &sampler).build::<u8>(4, 4, min, max, false);
        assert!(map.is_none());
        assert_eq!(sampler.loads(), 0);
    }

    #[test]
    fn test_passthrough() {
        let (index, sampler) = single_tile();
        let (min, max) = frame(10.0, 12.0);

        let map = HeightMapBuilder::new(&index, &sampler)
            .projection(ProjectionKind::Equirectangular)
            .build::<i16>(3, 3, min, max, true)
            .unwrap();
        assert!(map.data().iter().all(|&v| v == 500));

        // Saturates at the type bound
        let map = HeightMapBuilder::new(&index, &sampler)
            .build::<u8>(3, 3, min, max, false)
            .unwrap();
        assert!(map.data().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_partial_coverage_leaves_default() {
        let (index, sampler) = single_tile();
        // Western half of the frame lies outside the tile
        let min = GeoCoord::new(10.0, 8.0);
        let max = GeoCoord::new(12.0, 12.0);

        let map = HeightMapBuilder::new(&index, &sampler)
            .projection(ProjectionKind::Equirectangular)
            .build::<i32>(4, 2, min, max, false)
            .unwrap();

        assert_eq!(map.get(0, 0), Some(0));
        assert_eq!(map.get(1, 1), Some(0));
        assert_eq!(map.get(2, 0), Some(500));
        assert_eq!(map.get(3, 1), Some(500));
        assert_eq!(map.get(4, 0), None);
        assert_eq!(map.stats().covered_pixels, 4);
    }

    #[test]
    fn test_each_tile_loaded_once() {
        let mut index = TileIndex::new();
        let mut source = MemorySource::new();
        for (i, (lat, lon)) in [(10.0, 10.0), (10.0, 11.0), (11.0, 10.0), (11.0, 11.0)].iter().enumerate() {
            let path = format!("t{}.hgt", i);
            index.add_tile(descriptor(&path, *lat, *lon, 1.0));
            source.insert(path, constant_tile(100 * (i as i16 + 1)));
        }
        // Budget fits a single tile, so nothing survives between groups
        let tile_bytes = (SAMPLES * SAMPLES * 2) as u64;
        let sampler = TileSampler::new(Arc::new(source), tile_bytes, PolicyKind::Lfu);
        let (min, max) = frame(10.0, 12.0);

        for parallel in [false, true] {
            sampler.clear_cache();
            let before = sampler.loads();
            let map = HeightMapBuilder::new(&index, &sampler)
                .parallel(parallel)
                .build::<u16>(16, 16, min, max, false)
                .unwrap();

            assert_eq!(sampler.loads() - before, 4);
            assert_eq!(map.stats().tiles_used, 4);
            assert_eq!(map.stats().covered_pixels, 256);
        }
        assert!(sampler.stats().resident_bytes <= tile_bytes);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (index, sampler) = single_tile();
        let min = GeoCoord::new(9.5, 9.0);
        let max = GeoCoord::new(12.5, 11.0);

        let seq = HeightMapBuilder::new(&index, &sampler)
            .parallel(false)
            .elevation_range(Some(ElevationRange::default()))
            .build::<f32>(7, 5, min, max, true)
            .unwrap();
        let par = HeightMapBuilder::new(&index, &sampler)
            .elevation_range(Some(ElevationRange::default()))
            .build::<f32>(7, 5, min, max, true)
            .unwrap();

        assert_eq!(seq.data(), par.data());
    }

    #[test]
    fn test_missing_tile_counts_as_failed() {
        let mut index = TileIndex::new();
        index.add_tile(descriptor("gone.hgt", 10.0, 10.0, 2.0));
        let sampler = TileSampler::new(Arc::new(MemorySource::new()), 1 << 20, PolicyKind::Lru);
        let (min, max) = frame(10.0, 12.0);

        let map = HeightMapBuilder::new(&index, &sampler)
            .build::<u8>(2, 2, min, max, false)
            .unwrap();
        assert_eq!(map.stats().tiles_failed, 1);
        assert!(map.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_cancelled_build() {
        let (index, sampler) = single_tile();
        let (min, max) = frame(10.0, 12.0);
        let token = CancellationToken::new();
        token.cancel();

        let result = HeightMapBuilder::new(&index, &sampler)
            .cancel_token(token)
            .try_build::<u8>(4, 4, min, max, false);
        assert!(matches!(result, Err(DemError::Cancelled)));
        assert_eq!(sampler.loads(), 0);
    }

    #[test]
    fn test_invalid_frames() {
        let (index, sampler) = single_tile();
        let builder = HeightMapBuilder::new(&index, &sampler);
        let (min, max) = frame(10.0, 12.0);

        assert!(matches!(
            builder.try_build::<u8>(0, 4, min, max, false),
            Err(DemError::InvalidFrame(_))
        ));
        assert!(matches!(
            builder.try_build::<u8>(4, 4, min, min, false),
            Err(DemError::InvalidFrame(_))
        ));
        assert!(matches!(
            builder.try_build::<u8>(4, 4, GeoCoord::new(80.0, 0.0), GeoCoord::new(90.0, 1.0), false),
            Err(DemError::InvalidFrame(_))
        ));
        assert!(builder.build::<u8>(0, 0, min, max, false).is_none());
    }

    #[test]
    fn test_mercator_builds_above_85_degrees() {
        let mut index = TileIndex::new();
        index.add_tile(descriptor("N85E010.hgt", 85.0, 10.0, 1.0));
        let source = MemorySource::new().with_file("N85E010.hgt", constant_tile(300));
        let sampler = TileSampler::new(Arc::new(source), 1 << 20, PolicyKind::Lru);

        let map = HeightMapBuilder::new(&index, &sampler)
            .projection(ProjectionKind::Mercator)
            .try_build::<i16>(4, 4, GeoCoord::new(85.0, 10.0), GeoCoord::new(86.0, 11.0), false)
            .unwrap()
            .expect("tile covers the frame");

        assert_eq!(map.stats().covered_pixels, 16);
        assert!(map.data().iter().all(|&v| v == 300));
    }

    #[test]
    fn test_swapped_corners_are_normalized() {
        let (index, sampler) = single_tile();
        let (min, max) = frame(10.0, 12.0);

        let map = HeightMapBuilder::new(&index, &sampler)
            .build::<i16>(2, 2, max, min, false)
            .unwrap();
        assert_eq!(map.stats().covered_pixels, 4);
    }

    #[test]
    fn test_elevation_range_mapping() {
        let range = ElevationRange::new(0.0, 1000.0).unwrap();
        assert_eq!(range.map::<u8>(0), 0);
        assert_eq!(range.map::<u8>(1000), 255);
        assert_eq!(range.map::<u8>(5000), 255);
        assert_eq!(range.map::<u8>(500), 128);
        assert_eq!(range.map::<u16>(1000), u16::MAX);
        assert!((range.map::<f64>(250) - 0.25).abs() < 1e-12);

        assert!(ElevationRange::new(10.0, 10.0).is_err());
        assert_eq!(ElevationRange::default().max, 9000.0);
    }

    #[test]
    fn test_to_le_bytes() {
        let map = HeightMap {
            width: 2,
            height: 1,
            data: vec![0x0102u16, 0x0304],
            stats: BuildStats::default(),
        };
        assert_eq!(map.to_le_bytes(), vec![0x02, 0x01, 0x04, 0x03]);
        assert_eq!(map.into_raw(), vec![0x0102, 0x0304]);
    }
}
