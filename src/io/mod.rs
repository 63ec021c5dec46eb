//! I/O modules for rasters, vector layers and tabular reports

pub mod report;
#[cfg(feature = "gdal")]
pub mod raster;
#[cfg(feature = "gdal")]
pub mod vector;

pub use report::{save_camp_damage_csv, save_metrics_csv, write_camp_damage_csv, write_metrics_csv};
#[cfg(feature = "gdal")]
pub use raster::RasterIo;
#[cfg(feature = "gdal")]
pub use vector::VectorIo;
