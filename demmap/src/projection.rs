//! Map projections between geographic coordinates and raster pixels.
//!
//! A projection is configured with a frame: the geographic box to show and
//! the raster size. Forward projection maps a coordinate to a pixel position
//! with row 0 at the north; the inverse maps a pixel position back.
//!
//! The frame is fitted the same way for every projection. The two corners
//! are projected, the projected extent is scaled per axis to the raster
//! size (with a shared scale when the aspect ratio is kept), and whatever
//! space is left over is split evenly as padding on both sides.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;
use std::str::FromStr;

use crate::coord::GeoCoord;
use crate::error::DemError;

/// Which pixel size [`Projection::pixel_step`] reports.
///
/// Pixels of a non-linear projection differ in angular size across the
/// raster; these select the smallest, largest or mean size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelStepKind {
    Min,
    Max,
    Average,
}

/// Frame geometry plus forward and inverse transform.
pub trait Projection: Send + Sync {
    /// Fit the geographic box `[min, max]` into a `width`×`height` raster.
    fn set_frame(&mut self, min: GeoCoord, max: GeoCoord, width: u32, height: u32, keep_aspect_ratio: bool);

    /// Pixel position of `coord`.
    fn project(&self, coord: GeoCoord) -> (f64, f64);

    /// Geographic coordinate of pixel position `(x, y)`.
    fn project_inverse(&self, x: f64, y: f64) -> GeoCoord;

    /// Geographic box covered by the whole raster, padding included.
    fn axis_aligned_bounds(&self) -> (GeoCoord, GeoCoord);

    /// Angular size of one pixel as `(lat, lon)` degrees.
    fn pixel_step(&self, kind: PixelStepKind) -> GeoCoord;
}

/// Built-in projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionKind {
    #[default]
    Mercator,
    Equirectangular,
}

impl ProjectionKind {
    /// Create an unframed projection of this kind.
    pub fn build(self) -> Box<dyn Projection> {
        match self {
            ProjectionKind::Mercator => Box::new(FramedProjection::new(Mercator)),
            ProjectionKind::Equirectangular => Box::new(FramedProjection::new(Equirectangular)),
        }
    }

    /// Whether a frame may extend to `lat`.
    pub fn represents_lat(self, lat: f64) -> bool {
        match self {
            // tan(pi/4 + lat/2) is finite everywhere except the poles
            ProjectionKind::Mercator => lat.abs() < 90.0,
            ProjectionKind::Equirectangular => lat.abs() <= 90.0,
        }
    }
}

impl FromStr for ProjectionKind {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mercator" => Ok(ProjectionKind::Mercator),
            "equirectangular" | "plate-carree" => Ok(ProjectionKind::Equirectangular),
            other => Err(DemError::Config(format!("unknown projection '{}'", other))),
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionKind::Mercator => f.write_str("mercator"),
            ProjectionKind::Equirectangular => f.write_str("equirectangular"),
        }
    }
}

/// Raw projection onto an unscaled plane.
trait PlaneTransform: Send + Sync {
    fn forward(&self, coord: GeoCoord) -> (f64, f64);
    fn inverse(&self, x: f64, y: f64) -> GeoCoord;
}

struct Mercator;

impl PlaneTransform for Mercator {
    fn forward(&self, coord: GeoCoord) -> (f64, f64) {
        let x = coord.lon.to_radians();
        let y = (FRAC_PI_4 + 0.5 * coord.lat.to_radians()).tan().ln();
        (x, y)
    }

    fn inverse(&self, x: f64, y: f64) -> GeoCoord {
        let lat = 2.0 * y.exp().atan() - FRAC_PI_2;
        GeoCoord::new(lat.to_degrees(), x.to_degrees())
    }
}

struct Equirectangular;

impl PlaneTransform for Equirectangular {
    fn forward(&self, coord: GeoCoord) -> (f64, f64) {
        (coord.lon.to_radians(), coord.lat.to_radians())
    }

    fn inverse(&self, x: f64, y: f64) -> GeoCoord {
        GeoCoord::new(y.to_degrees(), x.to_degrees())
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    width: f64,
    height: f64,
    min_x: f64,
    min_y: f64,
    ratio_x: f64,
    ratio_y: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            min_x: 0.0,
            min_y: 0.0,
            ratio_x: 1.0,
            ratio_y: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }
}

struct FramedProjection<P> {
    plane: P,
    frame: Frame,
}

impl<P: PlaneTransform> FramedProjection<P> {
    fn new(plane: P) -> Self {
        Self {
            plane,
            frame: Frame::default(),
        }
    }
}

impl<P: PlaneTransform> Projection for FramedProjection<P> {
    fn set_frame(&mut self, min: GeoCoord, max: GeoCoord, width: u32, height: u32, keep_aspect_ratio: bool) {
        let (x1, y1) = self.plane.forward(min);
        let (x2, y2) = self.plane.forward(max);

        let min_x = x1.min(x2);
        let min_y = y1.min(y2);
        let extent_x = (x1 - min_x).max(x2 - min_x);
        let extent_y = (y1 - min_y).max(y2 - min_y);

        let width = width as f64;
        let height = height as f64;

        let mut ratio_x = width / extent_x;
        let mut ratio_y = height / extent_y;
        if keep_aspect_ratio {
            let shared = ratio_x.min(ratio_y);
            ratio_x = shared;
            ratio_y = shared;
        }

        self.frame = Frame {
            width,
            height,
            min_x,
            min_y,
            ratio_x,
            ratio_y,
            pad_x: (width - ratio_x * extent_x) * 0.5,
            pad_y: (height - ratio_y * extent_y) * 0.5,
        };
    }

    fn project(&self, coord: GeoCoord) -> (f64, f64) {
        let f = &self.frame;
        let (px, py) = self.plane.forward(coord);
        let x = f.pad_x + (px - f.min_x) * f.ratio_x;
        let y = f.height - f.pad_y - (py - f.min_y) * f.ratio_y;
        (x, y)
    }

    fn project_inverse(&self, x: f64, y: f64) -> GeoCoord {
        let f = &self.frame;
        let px = (x - f.pad_x) / f.ratio_x + f.min_x;
        let py = (f.height - f.pad_y - y) / f.ratio_y + f.min_y;
        self.plane.inverse(px, py)
    }

    fn axis_aligned_bounds(&self) -> (GeoCoord, GeoCoord) {
        let (w, h) = (self.frame.width, self.frame.height);
        let corners = [
            self.project_inverse(0.0, 0.0),
            self.project_inverse(w, 0.0),
            self.project_inverse(0.0, h),
            self.project_inverse(w, h),
        ];
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = min.min(*c);
            max = max.max(*c);
        }
        (min, max)
    }

    fn pixel_step(&self, kind: PixelStepKind) -> GeoCoord {
        let (w, h) = (self.frame.width, self.frame.height);
        if w < 1.0 || h < 1.0 {
            return GeoCoord::default();
        }

        let lon_step = (self.project_inverse(1.0, 0.0).lon - self.project_inverse(0.0, 0.0).lon).abs();
        let cx = w * 0.5;
        let rows = h as usize;

        let mut lat_min = f64::INFINITY;
        let mut lat_max = 0.0f64;
        let mut lat_sum = 0.0;
        for row in 0..rows {
            let a = self.project_inverse(cx, row as f64).lat;
            let b = self.project_inverse(cx, row as f64 + 1.0).lat;
            let step = (a - b).abs();
            lat_min = lat_min.min(step);
            lat_max = lat_max.max(step);
            lat_sum += step;
        }

        let lat_step = match kind {
            PixelStepKind::Min => lat_min,
            PixelStepKind::Max => lat_max,
            PixelStepKind::Average => lat_sum / rows as f64,
        };
        GeoCoord::new(lat_step, lon_step)
    }
}
