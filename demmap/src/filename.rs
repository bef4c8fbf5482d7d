//! Tile filename utilities.
//!
//! This module converts between coordinates and tile file names and detects
//! the sample encoding from the naming convention.
//!
//! # Filename Format
//!
//! - HGT: `{N|S}{lat}{E|W}{lon}*`, e.g. `N35W001.hgt`
//! - BIL: `{N|S}{lat}_{E|W}{lon}*`, e.g. `N35_W001_1arc_v3.bil`
//!
//! Latitude has 2 digits, longitude 3. An underscore right after the
//! latitude field marks a BIL tile. Anything after the longitude digits is
//! ignored. The name represents the **southwest corner** of the tile.

use crate::tile::SampleFormat;

/// Extensions of sidecar files shipped next to BIL rasters. They share the
/// tile naming convention but hold no samples.
const SIDECAR_EXTENSIONS: [&str; 7] = ["hdr", "prj", "blw", "stx", "xml", "txt", "aux"];

/// Coordinates and encoding parsed from a tile file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileName {
    /// Latitude of the southwest corner.
    pub lat: i32,
    /// Longitude of the southwest corner.
    pub lon: i32,
    /// Sample encoding implied by the name.
    pub format: SampleFormat,
}

/// Convert latitude and longitude to an HGT filename.
///
/// # Examples
///
/// ```
/// use demmap::filename::lat_lon_to_filename;
///
/// assert_eq!(lat_lon_to_filename(35.5, 138.7), "N35E138.hgt");
/// assert_eq!(lat_lon_to_filename(-12.3, -77.1), "S13W078.hgt");
/// assert_eq!(lat_lon_to_filename(0.5, -0.5), "N00W001.hgt");
/// ```
pub fn lat_lon_to_filename(lat: f64, lon: f64) -> String {
    coords_to_filename(lat.floor() as i32, lon.floor() as i32, SampleFormat::Hgt)
}

/// Build the canonical file name for a tile corner and encoding.
///
/// ```
/// use demmap::filename::coords_to_filename;
/// use demmap::SampleFormat;
///
/// assert_eq!(coords_to_filename(35, -1, SampleFormat::Hgt), "N35W001.hgt");
/// assert_eq!(coords_to_filename(-12, 77, SampleFormat::Bil), "S12_E077.bil");
/// ```
pub fn coords_to_filename(lat: i32, lon: i32, format: SampleFormat) -> String {
    let lat_prefix = if lat >= 0 { 'N' } else { 'S' };
    let lon_prefix = if lon >= 0 { 'E' } else { 'W' };

    match format {
        SampleFormat::Hgt => format!(
            "{}{:02}{}{:03}.hgt",
            lat_prefix,
            lat.abs(),
            lon_prefix,
            lon.abs()
        ),
        SampleFormat::Bil => format!(
            "{}{:02}_{}{:03}.bil",
            lat_prefix,
            lat.abs(),
            lon_prefix,
            lon.abs()
        ),
    }
}

/// Parse a tile filename to extract its corner and encoding.
///
/// Accepts a bare name or a path with `/` or `\` separators.
///
/// # Examples
///
/// ```
/// use demmap::filename::parse_tile_name;
/// use demmap::SampleFormat;
///
/// let t = parse_tile_name("N35W001.hgt").unwrap();
/// assert_eq!((t.lat, t.lon, t.format), (35, -1, SampleFormat::Hgt));
///
/// let t = parse_tile_name("dem/S12_E077_3arc_v2.bil").unwrap();
/// assert_eq!((t.lat, t.lon, t.format), (-12, 77, SampleFormat::Bil));
///
/// assert!(parse_tile_name("invalid").is_none());
/// ```
pub fn parse_tile_name(filename: &str) -> Option<TileName> {
    let name = base_name(filename);
    let bytes = name.as_bytes();

    if bytes.len() < 7 || !name.is_ascii() {
        return None;
    }

    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lat = parse_digits(&name[1..3])?;

    let (format, lon_start) = if bytes[3] == b'_' {
        (SampleFormat::Bil, 4)
    } else {
        (SampleFormat::Hgt, 3)
    };

    if bytes.len() < lon_start + 4 {
        return None;
    }

    let lon_sign = match bytes[lon_start] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };
    let lon = parse_digits(&name[lon_start + 1..lon_start + 4])?;

    Some(TileName {
        lat: lat * lat_sign,
        lon: lon * lon_sign,
        format,
    })
}

/// Parse a tile filename to extract the southwest corner only.
///
/// ```
/// use demmap::filename::filename_to_lat_lon;
///
/// assert_eq!(filename_to_lat_lon("N35E138.hgt"), Some((35, 138)));
/// assert_eq!(filename_to_lat_lon("/path/to/S12W077.hgt"), Some((-12, -77)));
/// assert_eq!(filename_to_lat_lon("invalid"), None);
/// ```
pub fn filename_to_lat_lon(filename: &str) -> Option<(i32, i32)> {
    parse_tile_name(filename).map(|t| (t.lat, t.lon))
}

/// Returns `true` for BIL sidecar files (`.hdr`, `.prj`, ...) that follow
/// the tile naming convention but carry no elevation samples.
pub fn is_sidecar_file(filename: &str) -> bool {
    let name = base_name(filename);
    match name.rsplit_once('.') {
        Some((_, ext)) => SIDECAR_EXTENSIONS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

fn parse_digits(s: &str) -> Option<i32> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_coords() {
        assert_eq!(lat_lon_to_filename(35.5, 138.7), "N35E138.hgt");
        assert_eq!(lat_lon_to_filename(0.5, 0.5), "N00E000.hgt");
        assert_eq!(lat_lon_to_filename(59.9, 179.9), "N59E179.hgt");
    }

    #[test]
    fn test_negative_coords() {
        // floor(-12.3) = -13, floor(-77.1) = -78
        assert_eq!(lat_lon_to_filename(-12.3, -77.1), "S13W078.hgt");
        assert_eq!(lat_lon_to_filename(-0.5, -0.5), "S01W001.hgt");
        assert_eq!(lat_lon_to_filename(-1.0, -1.0), "S01W001.hgt");
    }

    #[test]
    fn test_bil_filename() {
        assert_eq!(coords_to_filename(35, 138, SampleFormat::Bil), "N35_E138.bil");
        assert_eq!(coords_to_filename(-1, -1, SampleFormat::Bil), "S01_W001.bil");
    }

    #[test]
    fn test_parse_hgt() {
        let t = parse_tile_name("N35E138.hgt").unwrap();
        assert_eq!(t, TileName { lat: 35, lon: 138, format: SampleFormat::Hgt });

        let t = parse_tile_name("S12W077.hgt").unwrap();
        assert_eq!((t.lat, t.lon), (-12, -77));

        // Anything after the longitude field is ignored
        let t = parse_tile_name("N35W001_voidfilled").unwrap();
        assert_eq!((t.lat, t.lon, t.format), (35, -1, SampleFormat::Hgt));
    }

    #[test]
    fn test_parse_bil() {
        let t = parse_tile_name("N35_W001.bil").unwrap();
        assert_eq!(t, TileName { lat: 35, lon: -1, format: SampleFormat::Bil });

        let t = parse_tile_name("s05_e100_1arc_v3.bil").unwrap();
        assert_eq!((t.lat, t.lon, t.format), (-5, 100, SampleFormat::Bil));
    }

    #[test]
    fn test_parse_with_path() {
        assert_eq!(
            filename_to_lat_lon("/path/to/data/N35E138.hgt"),
            Some((35, 138))
        );
        assert_eq!(filename_to_lat_lon("C:\\data\\S12W077.hgt"), Some((-12, -77)));
        assert_eq!(
            filename_to_lat_lon("archive.zip/inner/N01_E002.bil"),
            Some((1, 2))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_tile_name("invalid"), None);
        assert_eq!(parse_tile_name("N35E13"), None); // Too short
        assert_eq!(parse_tile_name("X35E138.hgt"), None); // Invalid prefix
        assert_eq!(parse_tile_name("N35X138.hgt"), None); // Invalid prefix
        assert_eq!(parse_tile_name("NAAE138.hgt"), None); // Non-numeric
        assert_eq!(parse_tile_name("N35_E13"), None); // BIL too short
        assert_eq!(parse_tile_name("N+5E138.hgt"), None);
    }

    #[test]
    fn test_roundtrip() {
        for (lat, lon) in [(35, 138), (-12, -77), (0, -1), (-60, 179)] {
            for format in [SampleFormat::Hgt, SampleFormat::Bil] {
                let name = coords_to_filename(lat, lon, format);
                let parsed = parse_tile_name(&name).unwrap();
                assert_eq!(parsed, TileName { lat, lon, format });
            }
        }
    }

    #[test]
    fn test_sidecar_files() {
        assert!(is_sidecar_file("N35_E138.hdr"));
        assert!(is_sidecar_file("dir/N35_E138.PRJ"));
        assert!(!is_sidecar_file("N35_E138.bil"));
        assert!(!is_sidecar_file("N35E138.hgt"));
        assert!(!is_sidecar_file("N35E138"));
    }
}
