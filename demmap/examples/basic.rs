//! Basic example rendering a height map around Mount Fuji.
//!
//! Run with: cargo run --example basic -- /path/to/tiles [output.raw]

use demmap::{DemEngineBuilder, DemError, GeoCoord};
use std::env;

fn main() -> Result<(), DemError> {
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/tiles [output.raw]");
        std::process::exit(1);
    });
    let output = env::args().nth(2).unwrap_or_else(|| "fuji.raw".to_string());

    let engine = DemEngineBuilder::new([&data_dir]).build()?;
    println!("Indexed {} tiles", engine.index().len());

    // Point queries
    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Denali, Alaska", 63.0695, -151.0074),
    ];

    println!("Elevation queries:");
    println!("{:-<50}", "");
    for (name, lat, lon) in &locations {
        match engine.elevation(*lat, *lon) {
            Some(elevation) => println!("{}: {}m", name, elevation),
            None => println!("{}: tile not available locally", name),
        }
    }

    // 16-bit height map of the region, elevations 0..4000 m
    let min = GeoCoord::new(35.1, 138.5);
    let max = GeoCoord::new(35.6, 139.0);
    let map = engine
        .map_builder()
        .elevation_range(Some(demmap::ElevationRange::new(0.0, 4000.0)?))
        .build::<u16>(1024, 1024, min, max, true);

    match map {
        Some(map) => {
            std::fs::write(&output, map.to_le_bytes())?;
            println!(
                "\nWrote {}x{} height map to {} ({} tiles, {} ms)",
                map.width(),
                map.height(),
                output,
                map.stats().tiles_used,
                map.stats().elapsed_ms
            );
        }
        None => println!("\nNo data in region {} .. {}", min, max),
    }

    let stats = engine.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Resident: {} bytes", stats.resident_bytes);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
