use crate::core::geometry::Polygon;
use crate::types::{BoundingBox, DamageError, DamageResult, GeoRaster, GeoTransform, Raster};
use ndarray::{s, Array2};
use num_traits::Float;

/// Clipping and normalisation parameters
#[derive(Debug, Clone)]
pub struct NormalizeParams {
    /// Set pixels whose centre falls outside the AOI polygon to NaN
    pub mask_outside_aoi: bool,
    /// NoData value of the input raster, if any
    pub nodata: Option<f64>,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            mask_outside_aoi: true,
            nodata: None,
        }
    }
}

/// Min/max of the finite pixels that are not NoData
pub fn valid_min_max<T: Float>(values: &Array2<T>, nodata: Option<T>) -> Option<(T, T)> {
    values
        .iter()
        .filter(|v| v.is_finite() && Some(**v) != nodata)
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Clips texture rasters to an area of interest and stretches them to [0, 1]
pub struct Normalizer {
    params: NormalizeParams,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            params: NormalizeParams::default(),
        }
    }

    pub fn with_params(params: NormalizeParams) -> Self {
        Self { params }
    }

    /// Crop the raster to the window covered by `bbox`
    pub fn clip_to_bbox(
        &self,
        raster: &Raster,
        transform: &GeoTransform,
        bbox: &BoundingBox,
    ) -> DamageResult<(Raster, GeoTransform)> {
        if !transform.is_north_up() {
            return Err(DamageError::Processing(
                "Clipping requires a north-up raster without rotation".to_string(),
            ));
        }

        let (rows, cols) = raster.dim();
        let extent = transform.extent(rows, cols);
        let overlap = extent.intersection(bbox).ok_or_else(|| {
            DamageError::Processing(format!(
                "AOI {:?} does not overlap raster extent {:?}",
                bbox, extent
            ))
        })?;

        let (row_top, col_left) = transform.to_pixel(overlap.min_x, overlap.max_y);
        let (row_bottom, col_right) = transform.to_pixel(overlap.max_x, overlap.min_y);

        let row0 = (row_top.floor().max(0.0) as usize).min(rows);
        let col0 = (col_left.floor().max(0.0) as usize).min(cols);
        let row1 = (row_bottom.ceil().max(0.0) as usize).min(rows);
        let col1 = (col_right.ceil().max(0.0) as usize).min(cols);

        if row1 <= row0 || col1 <= col0 {
            return Err(DamageError::Processing(
                "AOI covers less than one pixel".to_string(),
            ));
        }

        log::debug!("Clip window rows {}..{}, cols {}..{}", row0, row1, col0, col1);

        let clipped = raster.slice(s![row0..row1, col0..col1]).to_owned();
        let clipped_transform = GeoTransform {
            top_left_x: transform.top_left_x + col0 as f64 * transform.pixel_width,
            top_left_y: transform.top_left_y + row0 as f64 * transform.pixel_height,
            ..*transform
        };

        Ok((clipped, clipped_transform))
    }

    /// Crop to the AOI envelope and, if enabled, blank pixels outside the polygon
    pub fn clip_to_aoi(
        &self,
        raster: &Raster,
        transform: &GeoTransform,
        aoi: &Polygon,
    ) -> DamageResult<(Raster, GeoTransform)> {
        let (mut clipped, clipped_transform) = self.clip_to_bbox(raster, transform, &aoi.bbox())?;

        if self.params.mask_outside_aoi {
            let mut masked = 0usize;
            for ((row, col), value) in clipped.indexed_iter_mut() {
                if !aoi.contains_point(clipped_transform.pixel_center(row, col)) {
                    *value = f32::NAN;
                    masked += 1;
                }
            }
            log::debug!("Masked {} pixels outside the AOI", masked);
        }

        Ok((clipped, clipped_transform))
    }

    /// Min-max stretch to [0, 1]; NoData and non-finite pixels become NaN
    pub fn normalize(&self, raster: &Raster) -> DamageResult<Raster> {
        let nodata = self.params.nodata.map(|v| v as f32);
        let (min, max) = valid_min_max(raster, nodata).ok_or_else(|| {
            DamageError::Processing("Raster has no valid pixels to normalize".to_string())
        })?;

        if max <= min {
            return Err(DamageError::Processing(format!(
                "Raster is constant ({}); cannot normalize",
                min
            )));
        }

        log::debug!("Normalizing with min={}, max={}", min, max);

        let range = max - min;
        Ok(raster.mapv(|v| {
            if v.is_finite() && Some(v) != nodata {
                (v - min) / range
            } else {
                f32::NAN
            }
        }))
    }

    /// Clip a raster to the AOI and normalize the clipped window
    pub fn clip_and_normalize(&self, raster: &GeoRaster, aoi: &Polygon) -> DamageResult<GeoRaster> {
        let (rows, cols) = raster.data.dim();
        log::info!("Clipping {}x{} raster to AOI", rows, cols);

        let params = NormalizeParams {
            nodata: raster.nodata.or(self.params.nodata),
            ..self.params.clone()
        };
        let normalizer = Normalizer::with_params(params);

        let (clipped, transform) = normalizer.clip_to_aoi(&raster.data, &raster.transform, aoi)?;
        let normalized = normalizer.normalize(&clipped)?;

        log::info!("Clipped and normalized raster: {}x{}", normalized.nrows(), normalized.ncols());
        Ok(GeoRaster {
            data: normalized,
            transform,
            nodata: Some(f64::NAN),
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}
