use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued texture raster (rows x columns)
pub type Raster = Array2<f32>;

/// Binary damage mask: 0 = intact, 1 = damaged, [`MASK_NODATA`] = no data
pub type BinaryMask = Array2<u8>;

/// NoData value used in binary masks
pub const MASK_NODATA: u8 = 255;

/// Identifier of a validation unit (the `FID` of the grid shapefile)
pub type Fid = i64;

/// Geospatial bounding box in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Overlap of two boxes, `None` when they are disjoint or only touch
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let bbox = BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        if bbox.min_x < bbox.max_x && bbox.min_y < bbox.max_y {
            Some(bbox)
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Geospatial transformation parameters (GDAL affine coefficients)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            top_left_x: coeffs[0],
            pixel_width: coeffs[1],
            rotation_x: coeffs[2],
            top_left_y: coeffs[3],
            rotation_y: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (
            self.top_left_x + c * self.pixel_width + r * self.rotation_x,
            self.top_left_y + c * self.rotation_y + r * self.pixel_height,
        )
    }

    /// Footprint of pixel (row, col); only valid for north-up transforms
    pub fn pixel_bounds(&self, row: usize, col: usize) -> BoundingBox {
        let x0 = self.top_left_x + col as f64 * self.pixel_width;
        let x1 = x0 + self.pixel_width;
        let y0 = self.top_left_y + row as f64 * self.pixel_height;
        let y1 = y0 + self.pixel_height;
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Fractional (row, col) of a map coordinate; only valid for north-up transforms
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (y - self.top_left_y) / self.pixel_height,
            (x - self.top_left_x) / self.pixel_width,
        )
    }

    pub fn is_north_up(&self) -> bool {
        self.rotation_x == 0.0 && self.rotation_y == 0.0 && self.pixel_height < 0.0
    }

    /// Extent covered by a raster of the given shape
    pub fn extent(&self, rows: usize, cols: usize) -> BoundingBox {
        let x0 = self.top_left_x;
        let x1 = self.top_left_x + cols as f64 * self.pixel_width;
        let y0 = self.top_left_y;
        let y1 = self.top_left_y + rows as f64 * self.pixel_height;
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

/// A raster together with its georeferencing
#[derive(Debug, Clone)]
pub struct GeoRaster {
    pub data: Raster,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
}

/// A raster mask together with its georeferencing
#[derive(Debug, Clone)]
pub struct GeoMask {
    pub data: BinaryMask,
    pub transform: GeoTransform,
}

/// Error types for damage-assessment processing
#[derive(Debug, thiserror::Error)]
pub enum DamageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot assess accuracy: no validation units")]
    DivisionUndefined,

    #[error("Label pair ({truth}, {predicted}) for unit {fid} is outside {{0,1}}x{{0,1}}")]
    OutOfDomainLabel { fid: Fid, truth: i64, predicted: i64 },

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for damage-assessment operations
pub type DamageResult<T> = Result<T, DamageError>;
