//! # demmap - Tiled Elevation Engine
//!
//! Indexes directories of digital elevation tiles, samples them through a
//! memory-bounded cache and renders rectangular geographic regions into
//! projected height maps.
//!
//! ## Features
//!
//! - **Mixed sources**: SRTM `.hgt` and `.bil` tiles, loose, inside `.zip`
//!   archives or gzip-compressed
//! - **Bounded memory**: tile buffers live in a byte-budgeted cache with LRU
//!   or LFU eviction
//! - **Parallel rendering**: pixels are grouped by tile and tiles are sampled
//!   concurrently with rayon
//! - **Manifests**: an index can be exported to XML and imported later to
//!   skip the directory scan
//!
//! ## Quick Start
//!
//! ```ignore
//! use demmap::{DemEngineBuilder, GeoCoord};
//!
//! let engine = DemEngineBuilder::new(["/data/srtm"]).build()?;
//!
//! let elevation = engine.elevation(35.3606, 138.7274);
//!
//! let map = engine
//!     .build_map::<u16>(2048, 2048, GeoCoord::new(35.0, 138.0), GeoCoord::new(36.0, 139.0), true)
//!     .expect("region has data");
//! std::fs::write("fuji.raw", map.to_le_bytes())?;
//! ```
//!
//! ## Tile Data Format
//!
//! - **SRTM1**: 3601×3601 samples, 1 arc-second resolution
//! - **SRTM3**: 1201×1201 samples, 3 arc-second resolution
//!
//! Samples are 16-bit signed integers, big-endian in `.hgt` files and in
//! host byte order in `.bil` files. The value -32768 marks a void. Row 0 of a
//! tile is its northern edge.

pub mod builder;
pub mod cache;
pub mod coord;
pub mod engine;
pub mod error;
pub mod filename;
pub mod index;
pub mod manifest;
pub mod projection;
pub mod sampler;
pub mod source;
pub mod tile;

// Re-export main types at crate root for convenience
pub use builder::{
    BuildStats, ElevationRange, HeightMap, HeightMapBuilder, RasterValue, DEFAULT_MAX_ELEVATION,
    DEFAULT_MIN_ELEVATION,
};
pub use cache::{BoundedCache, CacheStats, PolicyKind};
pub use coord::GeoCoord;
pub use engine::{DemEngine, DemEngineBuilder};
pub use error::{DemError, Result};
pub use index::{AddOutcome, ScanReport, TileId, TileIndex};
pub use projection::{PixelStepKind, Projection, ProjectionKind};
pub use sampler::{TileData, TileSampler};
pub use source::{ByteSource, DirectorySource, MemorySource, SourceEntry};
pub use tile::{SampleFormat, TileDescriptor, TileResolution, VOID_VALUE};
