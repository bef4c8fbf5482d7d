use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use demmap::{BuildStats, ElevationRange, GeoCoord, HeightMap, ProjectionKind, RasterValue};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::{format_size, EngineArgs};

/// Pixel type of a rendered height map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    U8,
    U16,
    I16,
    F32,
}

pub struct BuildArgs {
    pub min: GeoCoord,
    pub max: GeoCoord,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
    pub format: RasterFormat,
    pub projection: ProjectionKind,
    pub keep_aspect_ratio: bool,
    pub range: Option<(f64, f64)>,
    pub parallel: bool,
}

#[derive(Serialize)]
struct BuildSummary {
    output: String,
    width: u32,
    height: u32,
    format: RasterFormat,
    projection: String,
    bytes: u64,
    tiles_used: usize,
    tiles_failed: usize,
    covered_pixels: usize,
    elapsed_ms: u64,
}

pub fn run(engine_args: &EngineArgs, args: BuildArgs) -> Result<()> {
    let engine = engine_args.engine()?;

    let range = args
        .range
        .map(|(min, max)| ElevationRange::new(min, max))
        .transpose()
        .context("Invalid elevation range")?;

    let builder = engine
        .map_builder()
        .projection(args.projection)
        .elevation_range(range)
        .parallel(args.parallel);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("building {}x{} height map", args.width, args.height));
    pb.enable_steady_tick(Duration::from_millis(100));

    let rendered = match args.format {
        RasterFormat::U8 => render::<u8>(&builder, &args)?,
        RasterFormat::U16 => render::<u16>(&builder, &args)?,
        RasterFormat::I16 => render::<i16>(&builder, &args)?,
        RasterFormat::F32 => render::<f32>(&builder, &args)?,
    };
    pb.finish_and_clear();

    let Some((bytes, stats)) = rendered else {
        bail!(
            "No data in region {} .. {} under {}",
            args.min,
            args.max,
            engine
                .roots()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let summary = BuildSummary {
        output: args.output.display().to_string(),
        width: args.width,
        height: args.height,
        format: args.format,
        projection: args.projection.to_string(),
        bytes: bytes.len() as u64,
        tiles_used: stats.tiles_used,
        tiles_failed: stats.tiles_failed,
        covered_pixels: stats.covered_pixels,
        elapsed_ms: stats.elapsed_ms,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!(
        output = %args.output.display(),
        size = %format_size(summary.bytes),
        "height map written"
    );

    Ok(())
}

fn render<T: RasterValue>(
    builder: &demmap::HeightMapBuilder<'_>,
    args: &BuildArgs,
) -> Result<Option<(Vec<u8>, BuildStats)>> {
    let map: Option<HeightMap<T>> = builder
        .try_build(
            args.width,
            args.height,
            args.min,
            args.max,
            args.keep_aspect_ratio,
        )
        .context("Failed to build height map")?;
    Ok(map.map(|m| (m.to_le_bytes(), m.stats().clone())))
}
