use anyhow::Result;
use demmap::TileResolution;

use super::{format_coverage, format_size, EngineArgs};

pub fn run(args: &EngineArgs) -> Result<()> {
    let engine = args.engine()?;
    let index = engine.index();

    if index.is_empty() {
        println!("No tiles found");
        return Ok(());
    }

    let mut tiles: Vec<_> = index.iter().map(|(_, d)| d).collect();
    tiles.sort_by(|a, b| a.path.cmp(&b.path));

    let mut arc1_count = 0;
    let mut arc3_count = 0;
    let mut other_count = 0;
    let mut total_size: u64 = 0;

    println!(
        "{:<32} {:>6} {:>11} {:>24}",
        "TILE", "FORMAT", "SAMPLES", "COVERAGE"
    );
    println!("{}", "-".repeat(76));

    for d in &tiles {
        total_size += d.byte_len();
        match TileResolution::from_file_len(d.byte_len()) {
            Some((TileResolution::Arc1, _)) => arc1_count += 1,
            Some((TileResolution::Arc3, _)) => arc3_count += 1,
            None => other_count += 1,
        }

        println!(
            "{:<32} {:>6} {:>11} {:>24}",
            d.path,
            d.format.as_str(),
            format!("{}x{}", d.width, d.height),
            format_coverage(d)
        );
    }

    let report = engine.scan_report();

    // Summary
    println!();
    println!("Summary:");
    println!("  Total tiles: {}", tiles.len());
    if arc1_count > 0 {
        println!("  1 arc-second (30m): {}", arc1_count);
    }
    if arc3_count > 0 {
        println!("  3 arc-second (90m): {}", arc3_count);
    }
    if other_count > 0 {
        println!("  Other: {}", other_count);
    }
    if report.replaced + report.discarded > 0 {
        println!(
            "  Duplicate slots: {} replaced, {} discarded",
            report.replaced, report.discarded
        );
    }
    if report.skipped_name + report.skipped_size > 0 {
        println!(
            "  Skipped files: {} unrecognized names, {} unexpected sizes",
            report.skipped_name, report.skipped_size
        );
    }
    println!("  Total size: {}", format_size(total_size));
    for root in engine.roots() {
        println!("  Data directory: {}", root.display());
    }

    Ok(())
}
