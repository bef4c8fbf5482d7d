use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::EngineArgs;

/// Coordinates looked up per engine call; each chunk is grouped by tile.
const CHUNK_SIZE: usize = 10_000;

/// Marks rows without data. Real samples are never negative.
const NO_DATA: i16 = i16::MIN;

pub fn run(
    args: &EngineArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: String,
    lon_col: String,
) -> Result<()> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension != "csv" {
        bail!("Unsupported file format: {}. Use .csv", extension);
    }

    let engine = args.engine()?;
    process_csv(&engine, &input, output, &lat_col, &lon_col)
}

fn process_csv(
    engine: &demmap::DemEngine,
    input: &Path,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == lon_col)
        .with_context(|| format!("Column '{}' not found in CSV", lon_col))?;

    let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    let coords = records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let lat: f64 = record
                .get(lat_idx)
                .context("Missing latitude")?
                .trim()
                .parse()
                .with_context(|| format!("Invalid latitude on row {}", row + 1))?;
            let lon: f64 = record
                .get(lon_idx)
                .context("Missing longitude")?
                .trim()
                .parse()
                .with_context(|| format!("Invalid longitude on row {}", row + 1))?;
            Ok((lat, lon))
        })
        .collect::<Result<Vec<_>>>()?;

    let pb = ProgressBar::new(coords.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut elevations = Vec::with_capacity(coords.len());
    for chunk in coords.chunks(CHUNK_SIZE) {
        elevations.extend(engine.elevations_batch(chunk, NO_DATA));
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("done");

    // Prepare output
    let output_path = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        input.with_file_name(format!("{}_elevation.csv", stem))
    });
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("elevation");
    writer.write_record(&new_headers)?;

    for (record, elevation) in records.iter().zip(&elevations) {
        let elevation = match *elevation {
            NO_DATA => String::new(),
            e => e.to_string(),
        };
        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&elevation);
        writer.write_record(&new_record)?;
    }

    writer.flush()?;

    let missing = elevations.iter().filter(|&&e| e == NO_DATA).count();
    if missing > 0 {
        eprintln!("{} of {} coordinates had no data", missing, elevations.len());
    }
    println!("Output written to: {}", output_path.display());
    Ok(())
}
