use crate::types::{BinaryMask, DamageError, DamageResult, Raster, MASK_NODATA};

/// Reclassify a normalized texture raster into a binary damage mask.
///
/// Values in `[0, threshold]` map to 0 and values in `(threshold, 1]` map to 1.
/// NaN and values outside `[0, 1]` fall outside both remap ranges and become
/// [`MASK_NODATA`].
pub fn binarize(raster: &Raster, threshold: f32) -> DamageResult<BinaryMask> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(DamageError::Processing(format!(
            "Threshold {} is outside the normalized range [0, 1]",
            threshold
        )));
    }

    log::debug!("Binarising {}x{} raster at threshold {}", raster.nrows(), raster.ncols(), threshold);

    let mask = raster.mapv(|v| {
        if !(0.0..=1.0).contains(&v) {
            MASK_NODATA
        } else if v <= threshold {
            0
        } else {
            1
        }
    });

    match damaged_fraction(&mask) {
        Some(fraction) => log::info!(
            "Threshold {} flagged {:.2}% of valid pixels as damaged",
            threshold,
            fraction * 100.0
        ),
        None => log::warn!("Binarised raster has no valid pixels"),
    }
    Ok(mask)
}

/// Fraction of valid pixels flagged as damaged
pub fn damaged_fraction(mask: &BinaryMask) -> Option<f64> {
    let (valid, damaged) = mask.iter().fold((0usize, 0usize), |(valid, damaged), &v| match v {
        0 => (valid + 1, damaged),
        1 => (valid + 1, damaged + 1),
        _ => (valid, damaged),
    });
    if valid == 0 {
        None
    } else {
        Some(damaged as f64 / valid as f64)
    }
}
