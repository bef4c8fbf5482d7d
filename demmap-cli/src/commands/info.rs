use anyhow::{bail, Context, Result};
use demmap::{GeoCoord, TileDescriptor, TileResolution, VOID_VALUE};
use std::path::Path;

use super::{format_coverage, format_size, EngineArgs};

pub fn run(args: &EngineArgs, tile: Option<String>, lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    let engine = args.engine()?;
    let index = engine.index();

    let descriptor = match (tile, lat, lon) {
        (_, Some(lat), Some(lon)) => index
            .find_tile(GeoCoord::new(lat, lon))
            .with_context(|| format!("No tile covers {}, {}", lat, lon))?,
        (Some(tile), _, _) => find_by_name(index.iter().map(|(_, d)| d), &tile)
            .with_context(|| format!("Tile not found: {}", tile))?,
        _ => bail!("Specify a tile name or --lat and --lon"),
    };

    let data = engine
        .sampler()
        .try_load(descriptor)
        .context("Failed to load tile")?;

    // Scan every sample in file order
    let (mut min_elev, mut max_elev) = (i16::MAX, i16::MIN);
    let mut void_count = 0u64;
    let total_samples = descriptor.area();
    for i in 0..total_samples as usize {
        match data.raw_value(i, descriptor.format, descriptor.bytes_per_sample) {
            Some(VOID_VALUE) => void_count += 1,
            Some(elev) => {
                min_elev = min_elev.min(elev);
                max_elev = max_elev.max(elev);
            }
            None => break,
        }
    }

    let resolution_str = resolution_label(TileResolution::from_file_len(descriptor.byte_len()).map(|(r, _)| r));

    println!("Tile: {}", descriptor.path);
    println!();
    println!(
        "Resolution: {} ({}x{} samples, {} byte{})",
        resolution_str,
        descriptor.width,
        descriptor.height,
        descriptor.bytes_per_sample,
        if descriptor.bytes_per_sample == 1 { "" } else { "s" }
    );
    println!("Format: {}", descriptor.format.as_str());
    println!("Coverage: {}", format_coverage(descriptor));
    println!(
        "Pixel step: {:.6}° x {:.6}°",
        descriptor.pixel_step_lat, descriptor.pixel_step_lon
    );
    println!("Data size: {}", format_size(data.len() as u64));
    if (data.len() as u64) < descriptor.byte_len() {
        println!("Truncated: expected {}", format_size(descriptor.byte_len()));
    }
    println!();

    if min_elev <= max_elev {
        println!("Min elevation: {}m", min_elev);
        println!("Max elevation: {}m", max_elev);
    }

    if void_count > 0 {
        let void_pct = (void_count as f64 / total_samples as f64) * 100.0;
        println!("Void samples: {} ({:.1}%)", void_count, void_pct);
    }

    Ok(())
}

fn resolution_label(resolution: Option<TileResolution>) -> String {
    match resolution {
        Some(res) => {
            let arc = match res {
                TileResolution::Arc1 => 1,
                TileResolution::Arc3 => 3,
            };
            format!("{} arc-second (~{}m)", arc, res.meters())
        }
        None => "custom".to_string(),
    }
}

/// Match a logical path exactly, or a file name with or without extension.
fn find_by_name<'a>(
    mut tiles: impl Iterator<Item = &'a TileDescriptor>,
    name: &str,
) -> Option<&'a TileDescriptor> {
    tiles.find(|d| {
        let path = Path::new(&d.path);
        d.path == name
            || path.file_name().is_some_and(|f| f.eq_ignore_ascii_case(name))
            || path.file_stem().is_some_and(|f| f.eq_ignore_ascii_case(name))
    })
}
