//! Tile metadata.
//!
//! A [`TileDescriptor`] describes where a tile lies on the globe, how its
//! samples are laid out and how to obtain its bytes. Descriptors carry no
//! sample data; decoding happens in [`crate::sampler`].

use crate::coord::GeoCoord;
use crate::filename::TileName;

/// Number of samples per row/column for 1 arc-second tiles
const ARC1_SAMPLES: usize = 3601;

/// Number of samples per row/column for 3 arc-second tiles
const ARC3_SAMPLES: usize = 1201;

/// Value indicating no data (void) in SRTM files
pub const VOID_VALUE: i16 = -32768;

/// Binary encoding of the samples in a tile file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// SRTM `.hgt`: big-endian signed 16-bit samples.
    Hgt,
    /// ESRI `.bil`: host-order signed 16-bit samples.
    Bil,
}

impl SampleFormat {
    /// Name used in tile manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleFormat::Hgt => "hgt",
            SampleFormat::Bil => "bil",
        }
    }

    /// Parse a manifest `source` attribute (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("hgt") {
            Some(SampleFormat::Hgt)
        } else if s.eq_ignore_ascii_case("bil") {
            Some(SampleFormat::Bil)
        } else {
            None
        }
    }
}

/// Resolution class of a 1°×1° tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileResolution {
    /// 1 arc-second (~30m), 3601×3601 samples
    Arc1,
    /// 3 arc-second (~90m), 1201×1201 samples
    Arc3,
}

impl TileResolution {
    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> usize {
        match self {
            TileResolution::Arc1 => ARC1_SAMPLES,
            TileResolution::Arc3 => ARC3_SAMPLES,
        }
    }

    /// Returns the approximate resolution in meters.
    pub fn meters(&self) -> f64 {
        match self {
            TileResolution::Arc1 => 30.0,
            TileResolution::Arc3 => 90.0,
        }
    }

    /// Detect resolution and bytes per sample from a file length.
    ///
    /// Recognizes 2-byte tiles and the legacy 1-byte variant of both sizes.
    pub fn from_file_len(len: u64) -> Option<(TileResolution, u8)> {
        let arc1 = (ARC1_SAMPLES * ARC1_SAMPLES) as u64;
        let arc3 = (ARC3_SAMPLES * ARC3_SAMPLES) as u64;

        match len {
            l if l == 2 * arc1 => Some((TileResolution::Arc1, 2)),
            l if l == arc1 => Some((TileResolution::Arc1, 1)),
            l if l == 2 * arc3 => Some((TileResolution::Arc3, 2)),
            l if l == arc3 => Some((TileResolution::Arc3, 1)),
            _ => None,
        }
    }
}

/// Immutable metadata for one elevation tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDescriptor {
    /// Logical path of the tile: cache key and handle for the byte source.
    pub path: String,
    /// Latitude of the southwest corner.
    pub min_lat: f64,
    /// Longitude of the southwest corner.
    pub min_lon: f64,
    /// Angular extent in latitude.
    pub step_lat: f64,
    /// Angular extent in longitude.
    pub step_lon: f64,
    /// Angular distance between two sample rows.
    pub pixel_step_lat: f64,
    /// Angular distance between two sample columns.
    pub pixel_step_lon: f64,
    /// Samples per row.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Sample encoding.
    pub format: SampleFormat,
    /// Bytes per sample (2, or 1 for legacy tiles).
    pub bytes_per_sample: u8,
}

impl TileDescriptor {
    /// Create a descriptor, deriving pixel steps from extent and size.
    ///
    /// Edge rows and columns are shared with neighbouring tiles, so a tile of
    /// `n` samples spans `n - 1` pixel steps.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: impl Into<String>,
        min_lat: f64,
        min_lon: f64,
        step_lat: f64,
        step_lon: f64,
        width: u32,
        height: u32,
        format: SampleFormat,
        bytes_per_sample: u8,
    ) -> Self {
        Self {
            path: path.into(),
            min_lat,
            min_lon,
            step_lat,
            step_lon,
            pixel_step_lat: pixel_step(step_lat, height),
            pixel_step_lon: pixel_step(step_lon, width),
            width,
            height,
            format,
            bytes_per_sample,
        }
    }

    /// Descriptor for a standard 1°×1° tile discovered by name and size.
    ///
    /// Returns `None` when the length matches no known tile size.
    pub fn from_file_len(path: impl Into<String>, name: TileName, len: u64) -> Option<Self> {
        let (resolution, bytes_per_sample) = TileResolution::from_file_len(len)?;
        let samples = resolution.samples() as u32;

        Some(Self::new(
            path,
            name.lat as f64,
            name.lon as f64,
            1.0,
            1.0,
            samples,
            samples,
            name.format,
            bytes_per_sample,
        ))
    }

    /// Northern edge latitude.
    pub fn max_lat(&self) -> f64 {
        self.min_lat + self.step_lat
    }

    /// Eastern edge longitude.
    pub fn max_lon(&self) -> f64 {
        self.min_lon + self.step_lon
    }

    /// Number of samples in the tile.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Expected byte length of the tile file.
    pub fn byte_len(&self) -> u64 {
        self.area() * self.bytes_per_sample as u64
    }

    /// Bit pattern of the minimum corner; equal keys mean the same tile slot.
    pub fn slot_key(&self) -> (u64, u64) {
        (self.min_lat.to_bits(), self.min_lon.to_bits())
    }

    /// Returns `true` if both tiles occupy the same slot.
    pub fn same_slot(&self, other: &TileDescriptor) -> bool {
        self.slot_key() == other.slot_key()
    }

    /// Point-in-footprint test, inclusive on all four edges.
    pub fn contains(&self, coord: GeoCoord) -> bool {
        coord.lon >= self.min_lon
            && coord.lat >= self.min_lat
            && coord.lon <= self.min_lon + self.step_lon
            && coord.lat <= self.min_lat + self.step_lat
    }

    /// Returns `true` if the footprint intersects the box `[min, max]`.
    pub fn intersects(&self, min: GeoCoord, max: GeoCoord) -> bool {
        self.min_lat <= max.lat
            && self.max_lat() >= min.lat
            && self.min_lon <= max.lon
            && self.max_lon() >= min.lon
    }
}

fn pixel_step(step: f64, samples: u32) -> f64 {
    if samples > 1 {
        step / (samples - 1) as f64
    } else {
        step
    }
}
