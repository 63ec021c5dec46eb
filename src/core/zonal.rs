use crate::core::accuracy::LabelPairs;
use crate::core::geometry::{MultiPolygon, Polygon};
use crate::types::{BinaryMask, DamageError, DamageResult, Fid, GeoTransform, Raster, MASK_NODATA};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validation grid cell with its ground-truth damage label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationUnit {
    pub fid: Fid,
    /// Ground truth as recorded in the grid attribute table
    pub damage: i64,
    pub geometry: MultiPolygon,
}

/// Maximum of the valid pixels whose centres fall inside `zone`
pub fn zonal_max(
    raster: &Raster,
    transform: &GeoTransform,
    nodata: Option<f64>,
    zone: &Polygon,
) -> DamageResult<Option<f32>> {
    if !transform.is_north_up() {
        return Err(DamageError::Processing(
            "Zonal statistics require a north-up raster".to_string(),
        ));
    }

    let (rows, cols) = raster.dim();
    let bbox = zone.bbox();
    let (row_top, col_left) = transform.to_pixel(bbox.min_x, bbox.max_y);
    let (row_bottom, col_right) = transform.to_pixel(bbox.max_x, bbox.min_y);

    let row0 = row_top.floor().max(0.0) as usize;
    let col0 = col_left.floor().max(0.0) as usize;
    let row1 = (row_bottom.ceil().max(0.0) as usize).min(rows);
    let col1 = (col_right.ceil().max(0.0) as usize).min(cols);

    let nodata = nodata.map(|v| v as f32);
    let mut max: Option<f32> = None;
    for i in row0..row1 {
        for j in col0..col1 {
            let value = raster[[i, j]];
            if !value.is_finite() || Some(value) == nodata {
                continue;
            }
            if zone.contains_point(transform.pixel_center(i, j)) {
                max = Some(max.map_or(value, |m| m.max(value)));
            }
        }
    }
    Ok(max)
}

/// Zonal maximum over every part of a multi-part zone
pub fn zonal_max_parts(
    raster: &Raster,
    transform: &GeoTransform,
    nodata: Option<f64>,
    zone: &MultiPolygon,
) -> DamageResult<Option<f32>> {
    let mut max: Option<f32> = None;
    for part in &zone.parts {
        if let Some(value) = zonal_max(raster, transform, nodata, part)? {
            max = Some(max.map_or(value, |m| m.max(value)));
        }
    }
    Ok(max)
}

/// Promote a binary mask to a float raster with NaN for NoData
pub fn mask_to_raster(mask: &BinaryMask) -> Raster {
    mask.mapv(|v| if v == MASK_NODATA { f32::NAN } else { v as f32 })
}

/// Predicted damage per unit: 1 when the zonal maximum equals 1, else 0
pub fn predict_labels(
    units: &[ValidationUnit],
    raster: &Raster,
    transform: &GeoTransform,
    nodata: Option<f64>,
) -> DamageResult<BTreeMap<Fid, i64>> {
    log::debug!("Computing zonal maximum for {} validation units", units.len());

    let mut predictions = BTreeMap::new();
    let mut empty_zones = 0usize;
    for unit in units {
        let max = zonal_max_parts(raster, transform, nodata, &unit.geometry)?;
        if max.is_none() {
            empty_zones += 1;
        }
        let predicted = if max == Some(1.0) { 1 } else { 0 };
        if predictions.insert(unit.fid, predicted).is_some() {
            return Err(DamageError::InvalidFormat(format!(
                "Duplicate validation unit FID {}",
                unit.fid
            )));
        }
    }

    if empty_zones > 0 {
        log::warn!("{} validation units contain no valid pixels; predicted as undamaged", empty_zones);
    }
    Ok(predictions)
}

/// Join ground truth and predictions on FID
pub fn pair_labels(
    units: &[ValidationUnit],
    predictions: &BTreeMap<Fid, i64>,
) -> DamageResult<LabelPairs> {
    units
        .iter()
        .map(|unit| {
            let predicted = predictions.get(&unit.fid).ok_or_else(|| {
                DamageError::InvalidFormat(format!("No prediction for validation unit {}", unit.fid))
            })?;
            Ok((unit.fid, (unit.damage, *predicted)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use ndarray::array;

    fn cell(fid: Fid, damage: i64, x: f64, y: f64, size: f64) -> ValidationUnit {
        ValidationUnit {
            fid,
            damage,
            geometry: Polygon::from_bbox(&BoundingBox::new(x, y, x + size, y + size)).into(),
        }
    }

    #[test]
    fn test_zonal_max_over_cell() {
        // 4x4 raster, 1 m pixels, top-left (0, 4)
        let raster = array![
            [0.0f32, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.3],
        ];
        let transform = GeoTransform::north_up(0.0, 4.0, 1.0);

        let top_left = Polygon::from_bbox(&BoundingBox::new(0.0, 2.0, 2.0, 4.0));
        assert_eq!(zonal_max(&raster, &transform, None, &top_left).unwrap(), Some(1.0));

        let bottom_right = Polygon::from_bbox(&BoundingBox::new(2.0, 0.0, 4.0, 2.0));
        assert_eq!(zonal_max(&raster, &transform, None, &bottom_right).unwrap(), Some(0.3));

        let outside = Polygon::from_bbox(&BoundingBox::new(10.0, 10.0, 12.0, 12.0));
        assert_eq!(zonal_max(&raster, &transform, None, &outside).unwrap(), None);
    }

    #[test]
    fn test_predict_and_pair_labels() {
        let mask = array![
            [1u8, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, MASK_NODATA, MASK_NODATA],
            [0, 0, MASK_NODATA, MASK_NODATA],
        ];
        let raster = mask_to_raster(&mask);
        let transform = GeoTransform::north_up(0.0, 4.0, 1.0);
        let units = vec![
            cell(0, 1, 0.0, 2.0, 2.0),
            cell(1, 1, 2.0, 2.0, 2.0),
            cell(2, 0, 0.0, 0.0, 2.0),
            cell(3, 0, 2.0, 0.0, 2.0),
        ];

        let predictions = predict_labels(&units, &raster, &transform, None).unwrap();
        assert_eq!(predictions.values().copied().collect::<Vec<_>>(), vec![1, 0, 0, 0]);

        let pairs = pair_labels(&units, &predictions).unwrap();
        assert_eq!(pairs[&0], (1, 1));
        assert_eq!(pairs[&1], (1, 0));
        assert_eq!(pairs[&3], (0, 0));
    }

    #[test]
    fn test_multipart_unit_uses_all_parts() {
        let mask = array![
            [0u8, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 1],
        ];
        let transform = GeoTransform::north_up(0.0, 4.0, 1.0);
        let unit = ValidationUnit {
            fid: 11,
            damage: 1,
            geometry: MultiPolygon::new(vec![
                Polygon::from_bbox(&BoundingBox::new(0.0, 2.0, 2.0, 4.0)),
                Polygon::from_bbox(&BoundingBox::new(2.0, 0.0, 4.0, 2.0)),
            ]),
        };

        let predictions = predict_labels(&[unit.clone()], &mask_to_raster(&mask), &transform, None).unwrap();
        assert_eq!(predictions[&11], 1);
        assert_eq!(pair_labels(&[unit], &predictions).unwrap()[&11], (1, 1));
    }

    #[test]
    fn test_duplicate_fid_rejected() {
        let raster = Raster::zeros((2, 2));
        let transform = GeoTransform::north_up(0.0, 2.0, 1.0);
        let units = vec![cell(5, 0, 0.0, 0.0, 1.0), cell(5, 1, 1.0, 1.0, 1.0)];
        assert!(predict_labels(&units, &raster, &transform, None).is_err());
    }

    #[test]
    fn test_rotated_raster_rejected() {
        let raster = Raster::zeros((2, 2));
        let transform = GeoTransform::from_gdal([0.0, 1.0, 0.2, 2.0, 0.0, -1.0]);
        let zone = Polygon::from_bbox(&BoundingBox::new(0.0, 0.0, 2.0, 2.0));
        assert!(matches!(
            zonal_max(&raster, &transform, None, &zone),
            Err(DamageError::Processing(_))
        ));
    }
}
