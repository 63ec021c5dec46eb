use crate::types::{BinaryMask, DamageError, DamageResult, GeoMask, GeoRaster, GeoTransform, MASK_NODATA};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// GeoTIFF reader and writer for texture rasters and damage masks
pub struct RasterIo;

impl RasterIo {
    /// Read the first band as f32 together with georeferencing and projection WKT
    pub fn read<P: AsRef<Path>>(path: P) -> DamageResult<(GeoRaster, String)> {
        log::info!("Reading raster: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let geo_transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        let projection = dataset.projection();

        log::debug!("Raster size: {}x{}", width, height);
        log::debug!("Raster geotransform: {:?}", geo_transform);

        let rasterband = dataset.rasterband(1)?;
        let nodata = rasterband.no_data_value();
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let data = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| DamageError::Processing(format!("Failed to reshape raster data: {}", e)))?;

        Ok((
            GeoRaster {
                data,
                transform: GeoTransform::from_gdal(geo_transform),
                nodata,
            },
            projection,
        ))
    }

    /// Read a binary mask; pixels other than 0 and 1 become NoData
    pub fn read_mask<P: AsRef<Path>>(path: P) -> DamageResult<(GeoMask, String)> {
        let (raster, projection) = Self::read(path)?;
        let nodata = raster.nodata.map(|v| v as f32);
        let data: BinaryMask = raster.data.mapv(|v| {
            if Some(v) == nodata {
                MASK_NODATA
            } else if v == 0.0 {
                0
            } else if v == 1.0 {
                1
            } else {
                MASK_NODATA
            }
        });
        Ok((
            GeoMask {
                data,
                transform: raster.transform,
            },
            projection,
        ))
    }

    /// Save a float raster as GeoTIFF with NaN NoData
    pub fn write<P: AsRef<Path>>(path: P, raster: &GeoRaster, projection: &str) -> DamageResult<()> {
        log::info!("Saving raster as GeoTIFF: {}", path.as_ref().display());

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = raster.data.dim();

        let mut dataset = driver.create_with_band_type::<f32, _>(
            path.as_ref(),
            width as isize,
            height as isize,
            1,
        )?;
        dataset.set_geo_transform(&raster.transform.to_gdal())?;
        if !projection.is_empty() {
            dataset.set_projection(projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<f32> = raster.data.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        rasterband.set_no_data_value(Some(raster.nodata.unwrap_or(f32::NAN as f64)))?;

        Ok(())
    }

    /// Save a binary mask as a byte GeoTIFF with NoData 255
    pub fn write_mask<P: AsRef<Path>>(path: P, mask: &GeoMask, projection: &str) -> DamageResult<()> {
        log::info!("Saving mask as GeoTIFF: {}", path.as_ref().display());

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = mask.data.dim();

        let mut dataset = driver.create_with_band_type::<u8, _>(
            path.as_ref(),
            width as isize,
            height as isize,
            1,
        )?;
        dataset.set_geo_transform(&mask.transform.to_gdal())?;
        if !projection.is_empty() {
            dataset.set_projection(projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<u8> = mask.data.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        rasterband.set_no_data_value(Some(MASK_NODATA as f64))?;

        Ok(())
    }
}
