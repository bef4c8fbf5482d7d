//! Spatial index of tile descriptors.
//!
//! The globe is divided into 360×180 one-degree buckets. A descriptor is
//! stored in the bucket of its southwest corner; a lookup probes the bucket
//! of the query point and its eight neighbours, which covers every tile
//! whose footprint reaches into the query cell.

use tracing::{debug, info, warn};

use crate::coord::GeoCoord;
use crate::filename::{is_sidecar_file, parse_tile_name};
use crate::source::ByteSource;
use crate::tile::TileDescriptor;

const LON_BUCKETS: usize = 360;
const LAT_BUCKETS: usize = 180;

/// Stable handle of a descriptor inside a [`TileIndex`].
///
/// Ids survive replacement: a higher-resolution tile takes over the id of
/// the tile it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(u32);

impl TileId {
    /// Position of the descriptor in insertion order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What [`TileIndex::add_tile`] did with a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The slot was free.
    Inserted,
    /// An existing lower-resolution tile in the same slot was replaced.
    Replaced,
    /// The slot already holds a tile of equal or higher resolution.
    Discarded,
}

/// Counters collected while scanning a byte source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub added: usize,
    pub replaced: usize,
    pub discarded: usize,
    /// Files whose name is not a tile name (including BIL sidecars).
    pub skipped_name: usize,
    /// Tile-named files with an unrecognized size.
    pub skipped_size: usize,
}

/// In-memory spatial index of [`TileDescriptor`]s.
pub struct TileIndex {
    tiles: Vec<TileDescriptor>,
    buckets: Vec<Vec<TileId>>,
}

impl Default for TileIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TileIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            buckets: vec![Vec::new(); LON_BUCKETS * LAT_BUCKETS],
        }
    }

    /// Build an index from every tile file visible in `source`.
    pub fn scan(source: &dyn ByteSource) -> (Self, ScanReport) {
        let mut index = Self::new();
        let report = index.scan_into(source);
        (index, report)
    }

    /// Add every tile file visible in `source` to this index.
    ///
    /// A file is a tile when its name follows the tile naming convention and
    /// its size matches a 1201² or 3601² grid at one or two bytes per sample.
    pub fn scan_into(&mut self, source: &dyn ByteSource) -> ScanReport {
        let mut report = ScanReport::default();

        for entry in source.entries() {
            if is_sidecar_file(&entry.name) {
                report.skipped_name += 1;
                continue;
            }
            let Some(name) = parse_tile_name(&entry.name) else {
                debug!(path = %entry.path, "not a tile file name");
                report.skipped_name += 1;
                continue;
            };
            let Some(descriptor) = TileDescriptor::from_file_len(&entry.path, name, entry.size)
            else {
                warn!(
                    path = %entry.path,
                    size = entry.size,
                    "skipping tile with unrecognized size (wrong format)"
                );
                report.skipped_size += 1;
                continue;
            };

            match self.add_tile(descriptor) {
                AddOutcome::Inserted => report.added += 1,
                AddOutcome::Replaced => report.replaced += 1,
                AddOutcome::Discarded => report.discarded += 1,
            }
        }

        info!(
            tiles = self.len(),
            added = report.added,
            replaced = report.replaced,
            discarded = report.discarded,
            skipped = report.skipped_name + report.skipped_size,
            "tile scan complete"
        );
        report
    }

    /// Insert a descriptor, resolving same-slot collisions by resolution.
    ///
    /// When a tile with a bit-identical southwest corner exists, the one with
    /// more samples is kept. On a tie the existing tile stays.
    pub fn add_tile(&mut self, descriptor: TileDescriptor) -> AddOutcome {
        let bucket = bucket_of(descriptor.min_lat, descriptor.min_lon);

        let existing = self.buckets[bucket]
            .iter()
            .copied()
            .find(|id| self.tiles[id.index()].same_slot(&descriptor));

        match existing {
            Some(id) => {
                let current = &self.tiles[id.index()];
                if descriptor.area() > current.area() {
                    debug!(
                        old = %current.path,
                        new = %descriptor.path,
                        "replacing tile with higher resolution"
                    );
                    self.tiles[id.index()] = descriptor;
                    AddOutcome::Replaced
                } else {
                    debug!(
                        kept = %current.path,
                        dropped = %descriptor.path,
                        "discarding duplicate tile"
                    );
                    AddOutcome::Discarded
                }
            }
            None => {
                let id = TileId(self.tiles.len() as u32);
                self.tiles.push(descriptor);
                self.buckets[bucket].push(id);
                AddOutcome::Inserted
            }
        }
    }

    /// Find the tile covering `coord`, if any.
    pub fn find_tile(&self, coord: GeoCoord) -> Option<&TileDescriptor> {
        self.locate(coord).map(|id| &self.tiles[id.index()])
    }

    /// Id of the tile covering `coord`.
    ///
    /// Probes the 3×3 bucket neighbourhood in row-major order, lowest bucket
    /// first, and returns the first tile whose footprint contains the point.
    /// The neighbourhood is cut at the grid edges, never wrapped.
    pub fn locate(&self, coord: GeoCoord) -> Option<TileId> {
        if !coord.is_finite() {
            return None;
        }
        let (bx, by) = bucket_xy(coord.lat, coord.lon);

        let y_range = by.saturating_sub(1)..=(by + 1).min(LAT_BUCKETS - 1);
        for y in y_range {
            let x_range = bx.saturating_sub(1)..=(bx + 1).min(LON_BUCKETS - 1);
            for x in x_range {
                for &id in &self.buckets[y * LON_BUCKETS + x] {
                    if self.tiles[id.index()].contains(coord) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    /// Descriptor for an id returned by this index.
    pub fn get(&self, id: TileId) -> Option<&TileDescriptor> {
        self.tiles.get(id.index())
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns `true` if the index holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// All tiles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TileId, &TileDescriptor)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, d)| (TileId(i as u32), d))
    }

    /// Tiles whose footprint intersects the box spanned by `a` and `b`.
    pub fn tiles_in_area(&self, a: GeoCoord, b: GeoCoord) -> Vec<&TileDescriptor> {
        let min = a.min(b);
        let max = a.max(b);
        self.tiles
            .iter()
            .filter(|d| d.intersects(min, max))
            .collect()
    }
}

fn bucket_xy(lat: f64, lon: f64) -> (usize, usize) {
    let x = (lon.floor() + 180.0).clamp(0.0, (LON_BUCKETS - 1) as f64) as usize;
    let y = (lat.floor() + 90.0).clamp(0.0, (LAT_BUCKETS - 1) as f64) as usize;
    (x, y)
}

fn bucket_of(lat: f64, lon: f64) -> usize {
    let (x, y) = bucket_xy(lat, lon);
    y * LON_BUCKETS + x
}
