//! Tile manifest import and export.
//!
//! A manifest records the descriptors of an index so later runs can skip
//! the directory scan:
//!
//! ```xml
//! <dem>
//!   <tile name="N35E138.hgt" lat="35" lon="138" step_lat="1" step_lon="1"
//!         pixel_step_lat="0.000833" pixel_step_lon="0.000833"
//!         w="1201" h="1201" b="2" source="hgt"/>
//! </dem>
//! ```
//!
//! `pixel_step_*` and `source` are optional on import. Missing pixel steps
//! are derived from extent and size, a missing source from the tile name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DemError, Result};
use crate::filename::parse_tile_name;
use crate::index::{AddOutcome, ScanReport, TileIndex};
use crate::tile::{SampleFormat, TileDescriptor};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "dem")]
struct ManifestDoc {
    #[serde(rename = "tile", default)]
    tiles: Vec<ManifestTile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestTile {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
    #[serde(rename = "@step_lat")]
    step_lat: f64,
    #[serde(rename = "@step_lon")]
    step_lon: f64,
    #[serde(rename = "@pixel_step_lat", default, skip_serializing_if = "Option::is_none")]
    pixel_step_lat: Option<f64>,
    #[serde(rename = "@pixel_step_lon", default, skip_serializing_if = "Option::is_none")]
    pixel_step_lon: Option<f64>,
    #[serde(rename = "@w")]
    width: u32,
    #[serde(rename = "@h")]
    height: u32,
    #[serde(rename = "@b")]
    bytes_per_sample: u8,
    #[serde(rename = "@source", default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl From<&TileDescriptor> for ManifestTile {
    fn from(d: &TileDescriptor) -> Self {
        Self {
            name: d.path.clone(),
            lat: d.min_lat,
            lon: d.min_lon,
            step_lat: d.step_lat,
            step_lon: d.step_lon,
            pixel_step_lat: Some(d.pixel_step_lat),
            pixel_step_lon: Some(d.pixel_step_lon),
            width: d.width,
            height: d.height,
            bytes_per_sample: d.bytes_per_sample,
            source: Some(d.format.as_str().to_string()),
        }
    }
}

impl ManifestTile {
    fn into_descriptor(self) -> Result<TileDescriptor> {
        if !(self.lat.is_finite() && self.lon.is_finite()) {
            return Err(invalid(&self.name, "non-finite corner"));
        }
        if !(self.step_lat > 0.0 && self.step_lon > 0.0) {
            return Err(invalid(&self.name, "extent must be positive"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid(&self.name, "zero-sized grid"));
        }
        if !matches!(self.bytes_per_sample, 1 | 2) {
            return Err(invalid(&self.name, "bytes per sample must be 1 or 2"));
        }

        let format = match &self.source {
            Some(s) => SampleFormat::parse(s)
                .ok_or_else(|| invalid(&self.name, &format!("unknown source '{}'", s)))?,
            None => parse_tile_name(&self.name)
                .map(|t| t.format)
                .unwrap_or(SampleFormat::Hgt),
        };

        let mut descriptor = TileDescriptor::new(
            self.name,
            self.lat,
            self.lon,
            self.step_lat,
            self.step_lon,
            self.width,
            self.height,
            format,
            self.bytes_per_sample,
        );
        if let Some(p) = self.pixel_step_lat {
            descriptor.pixel_step_lat = p;
        }
        if let Some(p) = self.pixel_step_lon {
            descriptor.pixel_step_lon = p;
        }
        Ok(descriptor)
    }
}

fn invalid(name: &str, reason: &str) -> DemError {
    DemError::Manifest(format!("tile '{}': {}", name, reason))
}

/// Serialize every descriptor of `index` to manifest XML.
pub fn to_xml(index: &TileIndex) -> Result<String> {
    let doc = ManifestDoc {
        tiles: index.iter().map(|(_, d)| ManifestTile::from(d)).collect(),
    };
    let body = quick_xml::se::to_string(&doc).map_err(|e| DemError::Manifest(e.to_string()))?;
    Ok(format!("{}{}\n", XML_DECLARATION, body))
}

/// Parse manifest XML into descriptors, in document order.
pub fn from_xml(xml: &str) -> Result<Vec<TileDescriptor>> {
    let doc: ManifestDoc =
        quick_xml::de::from_str(xml).map_err(|e| DemError::Manifest(e.to_string()))?;
    doc.tiles
        .into_iter()
        .map(ManifestTile::into_descriptor)
        .collect()
}

/// Build an index from manifest XML.
///
/// Descriptors go through [`TileIndex::add_tile`], so duplicate slots are
/// resolved exactly as during a scan.
pub fn index_from_xml(xml: &str) -> Result<(TileIndex, ScanReport)> {
    let mut index = TileIndex::new();
    let mut report = ScanReport::default();

    for descriptor in from_xml(xml)? {
        match index.add_tile(descriptor) {
            AddOutcome::Inserted => report.added += 1,
            AddOutcome::Replaced => report.replaced += 1,
            AddOutcome::Discarded => report.discarded += 1,
        }
    }
    Ok((index, report))
}

/// Write the manifest of `index` to `path`.
pub fn export<P: AsRef<Path>>(index: &TileIndex, path: P) -> Result<()> {
    let xml = to_xml(index)?;
    std::fs::write(path.as_ref(), xml)?;
    debug!(path = %path.as_ref().display(), tiles = index.len(), "exported tile manifest");
    Ok(())
}

/// Read a manifest file into a new index.
pub fn import<P: AsRef<Path>>(path: P) -> Result<(TileIndex, ScanReport)> {
    let xml = std::fs::read_to_string(path.as_ref())?;
    let result = index_from_xml(&xml)?;
    debug!(path = %path.as_ref().display(), tiles = result.0.len(), "imported tile manifest");
    Ok(result)
}
