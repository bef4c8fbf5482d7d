//! End-to-end tests: directory scan, mixed sources, rendering and manifests.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use demmap::{DemEngine, DemEngineBuilder, GeoCoord, PolicyKind, ProjectionKind, SampleFormat};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

const SRTM3_SAMPLES: usize = 1201;
const SRTM3_SIZE: u64 = (SRTM3_SAMPLES * SRTM3_SAMPLES * 2) as u64;

fn constant_tile(elevation: i16, bil: bool) -> Vec<u8> {
    let bytes = if bil {
        elevation.to_ne_bytes()
    } else {
        elevation.to_be_bytes()
    };
    bytes.repeat(SRTM3_SAMPLES * SRTM3_SAMPLES)
}

fn write_zip(path: &Path, inner: &str, data: &[u8]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(inner, options).unwrap();
    zip.write_all(data).unwrap();
    zip.finish().unwrap();
}

fn write_gz(path: &Path, data: &[u8]) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap();
}

/// Two roots covering 35..37 N, 138..140 E with one tile per source kind:
///
/// ```text
///   N36E138 = 300 (loose hgt)    N36E139 = 400 (loose hgt, second root)
///   N35E138 = 100 (gzipped hgt)  N35E139 = 200 (bil inside a zip)
/// ```
fn mixed_roots() -> (TempDir, TempDir) {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();

    fs::write(first.path().join("N36E138.hgt"), constant_tile(300, false)).unwrap();
    write_zip(
        &first.path().join("bil.zip"),
        "N35_E139.bil",
        &constant_tile(200, true),
    );
    // Readme and sidecars next to tiles are ignored
    fs::write(first.path().join("N35_E139.hdr"), "BYTEORDER I").unwrap();
    fs::write(first.path().join("README.txt"), "tiles").unwrap();

    fs::create_dir(second.path().join("nested")).unwrap();
    write_gz(
        &second.path().join("nested").join("N35E138.hgt.gz"),
        &constant_tile(100, false),
    );
    fs::write(second.path().join("N36E139.hgt"), constant_tile(400, false)).unwrap();

    (first, second)
}

fn engine(first: &TempDir, second: &TempDir) -> DemEngine {
    DemEngineBuilder::new([first.path(), second.path()])
        .projection(ProjectionKind::Equirectangular)
        .build()
        .unwrap()
}

#[test]
fn test_scan_mixed_sources() {
    let (first, second) = mixed_roots();
    let engine = engine(&first, &second);

    assert_eq!(engine.index().len(), 4);
    assert_eq!(engine.scan_report().added, 4);
    assert!(engine.scan_report().skipped_name >= 2);

    let bil = engine.index().find_tile(GeoCoord::new(35.5, 139.5)).unwrap();
    assert_eq!(bil.path, "bil.zip/N35_E139.bil");
    assert_eq!(bil.format, SampleFormat::Bil);

    let gz = engine.index().find_tile(GeoCoord::new(35.5, 138.5)).unwrap();
    assert_eq!(gz.path, "nested/N35E138.hgt");
    assert_eq!(gz.byte_len(), SRTM3_SIZE);

    assert_eq!(engine.elevation(36.5, 138.5), Some(300));
    assert_eq!(engine.elevation(36.5, 139.5), Some(400));
    assert_eq!(engine.elevation(35.5, 138.5), Some(100));
    assert_eq!(engine.elevation(35.5, 139.5), Some(200));
    assert_eq!(engine.elevation(40.0, 138.5), None);
}

#[test]
fn test_build_map_across_tiles() {
    let (first, second) = mixed_roots();
    let engine = engine(&first, &second);

    let map = engine
        .map_builder()
        .elevation_range(None)
        .build::<i16>(
            4,
            4,
            GeoCoord::new(35.0, 138.0),
            GeoCoord::new(37.0, 140.0),
            true,
        )
        .unwrap();

    #[rustfmt::skip]
    let expected = vec![
        300, 300, 400, 400,
        300, 300, 400, 400,
        100, 100, 200, 200,
        100, 100, 200, 200,
    ];
    assert_eq!(map.data(), expected.as_slice());
    assert_eq!(map.stats().tiles_used, 4);
    assert_eq!(map.stats().tiles_failed, 0);
    assert_eq!(engine.sampler().loads(), 4);

    let bytes = map.to_le_bytes();
    assert_eq!(bytes.len(), 32);
    assert_eq!(&bytes[..2], &300i16.to_le_bytes());
}

#[test]
fn test_bounded_cache_evicts_while_rendering() {
    let (first, second) = mixed_roots();
    let engine = DemEngineBuilder::new([first.path(), second.path()])
        .cache_budget(SRTM3_SIZE)
        .eviction(PolicyKind::Lfu)
        .build()
        .unwrap();

    let map = engine
        .build_map::<u8>(
            32,
            32,
            GeoCoord::new(35.1, 138.1),
            GeoCoord::new(36.9, 139.9),
            false,
        )
        .unwrap();

    assert!(map.data().iter().all(|&v| v > 0));
    let stats = engine.cache_stats();
    assert!(stats.resident_bytes <= SRTM3_SIZE);
    assert!(stats.eviction_count >= 3);
}

#[test]
fn test_manifest_roundtrip_across_roots() {
    let (first, second) = mixed_roots();
    let manifest = first.path().join("tiles.xml");

    engine(&first, &second).export_manifest(&manifest).unwrap();
    let xml = fs::read_to_string(&manifest).unwrap();
    assert!(xml.contains("bil.zip/N35_E139.bil"));
    assert!(xml.contains("source=\"bil\""));

    let imported = DemEngineBuilder::new([first.path(), second.path()])
        .manifest(&manifest)
        .build()
        .unwrap();

    assert_eq!(imported.index().len(), 4);
    assert_eq!(imported.elevation(35.5, 138.5), Some(100));
    assert_eq!(imported.elevation(35.5, 139.5), Some(200));
}

#[test]
fn test_missing_root_is_skipped() {
    let (first, _second) = mixed_roots();
    let engine = DemEngineBuilder::new([first.path().join("missing").as_path(), first.path()])
        .build()
        .unwrap();

    assert_eq!(engine.index().len(), 2);
}

#[test]
fn test_earlier_root_shadows_same_path() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::write(first.path().join("N10E010.hgt"), constant_tile(11, false)).unwrap();
    fs::write(second.path().join("N10E010.hgt"), constant_tile(22, false)).unwrap();

    let engine = DemEngineBuilder::new([first.path(), second.path()])
        .build()
        .unwrap();
    assert_eq!(engine.index().len(), 1);
    assert_eq!(engine.elevation(10.5, 10.5), Some(11));
}
