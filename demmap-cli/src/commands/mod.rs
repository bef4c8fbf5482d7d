pub mod batch;
pub mod build;
pub mod index;
pub mod info;
pub mod list;
pub mod query;

use anyhow::{Context, Result};
use demmap::{cache::mib, DemEngine, DemEngineBuilder, PolicyKind};
use std::path::PathBuf;

/// Engine options shared by every command.
pub struct EngineArgs {
    pub data_dirs: Vec<PathBuf>,
    pub cache_mb: Option<u64>,
    pub policy: Option<PolicyKind>,
    pub manifest: Option<PathBuf>,
}

impl EngineArgs {
    /// Command-line values override the `DEMMAP_*` environment.
    pub fn builder(&self) -> Result<DemEngineBuilder> {
        let mut builder = if self.data_dirs.is_empty() {
            DemEngineBuilder::from_env().context(
                "DEMMAP_DATA_DIR environment variable not set. Use --data-dir or set DEMMAP_DATA_DIR",
            )?
        } else {
            DemEngineBuilder::new(&self.data_dirs)
        };

        if let Some(mb) = self.cache_mb {
            builder = builder.cache_budget(mib(mb));
        }
        if let Some(policy) = self.policy {
            builder = builder.eviction(policy);
        }
        if let Some(manifest) = &self.manifest {
            builder = builder.manifest(manifest);
        }
        Ok(builder)
    }

    pub fn engine(&self) -> Result<DemEngine> {
        self.builder()?
            .build()
            .context("Failed to create elevation engine")
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// "N35-N36, E138-E139" style footprint of a tile.
pub fn format_coverage(d: &demmap::TileDescriptor) -> String {
    fn lat(v: f64) -> String {
        format!("{}{}", if v >= 0.0 { "N" } else { "S" }, v.abs())
    }
    fn lon(v: f64) -> String {
        format!("{}{}", if v >= 0.0 { "E" } else { "W" }, v.abs())
    }
    format!(
        "{}-{}, {}-{}",
        lat(d.min_lat),
        lat(d.max_lat()),
        lon(d.min_lon),
        lon(d.max_lon())
    )
}
