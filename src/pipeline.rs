//! File-driven post-processing stages
//!
//! Each stage reads its inputs from, and writes its outputs to, the locations
//! named in the [`WorkspaceConfig`]. Stages are independent and are normally
//! run in order: normalize, threshold, clean, grid, accuracy, damage.

use crate::config::WorkspaceConfig;
use crate::core::accuracy::{AccuracyAssessor, LabelPairs, ModelMetrics};
use crate::core::cleaning::{CleaningStats, MaskCleaner};
use crate::core::damage::{camp_damage_counts, damaged_buildings, polygonize_damage, CampDamage};
use crate::core::gridding::GridSampler;
use crate::core::normalize::Normalizer;
use crate::core::threshold::binarize;
use crate::core::zonal::{pair_labels, predict_labels};
use crate::io::{save_camp_damage_csv, save_metrics_csv, RasterIo, VectorIo};
use crate::types::{DamageError, DamageResult, GeoMask};
use std::path::{Path, PathBuf};

fn file_name(path: &Path) -> DamageResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| DamageError::Config(format!("Invalid raster path {}", path.display())))
}

/// Runs post-processing stages against one workspace
pub struct Pipeline<'a> {
    config: &'a WorkspaceConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a WorkspaceConfig) -> Self {
        Self { config }
    }

    fn ensure_output_dir(&self) -> DamageResult<PathBuf> {
        let dir = self.config.resolve(&self.config.output_dir);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Output path of the normalized version of a configured raster
    pub fn normalized_path(&self, raster: &Path) -> DamageResult<PathBuf> {
        Ok(self.config.output_path(format!("normalized_{}", file_name(raster)?)))
    }

    /// Output path of the binarised version of a configured raster
    pub fn binarised_path(&self, raster: &Path) -> DamageResult<PathBuf> {
        Ok(self.config.output_path(format!("binarised_normalized_{}", file_name(raster)?)))
    }

    /// Clip every configured raster to the AOI and stretch it to [0, 1]
    pub fn normalize_all(&self) -> DamageResult<Vec<PathBuf>> {
        log::info!("Normalizing {} rasters", self.config.rasters.len());
        self.ensure_output_dir()?;

        let aoi = VectorIo::read_aoi(self.config.resolve(&self.config.aoi))?;
        let normalizer = Normalizer::new();

        let mut outputs = Vec::new();
        for spec in &self.config.rasters {
            let (raster, projection) = RasterIo::read(self.config.resolve(&spec.file))?;
            let normalized = normalizer.clip_and_normalize(&raster, &aoi)?;

            let output = self.normalized_path(&spec.file)?;
            RasterIo::write(&output, &normalized, &projection)?;
            log::info!("Clipped and normalized raster saved: {}", output.display());
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Binarise every normalized raster at its configured threshold
    pub fn threshold_all(&self) -> DamageResult<Vec<PathBuf>> {
        log::info!("Thresholding {} rasters", self.config.rasters.len());
        self.ensure_output_dir()?;

        let mut outputs = Vec::new();
        for spec in &self.config.rasters {
            let (raster, projection) = RasterIo::read(self.normalized_path(&spec.file)?)?;
            let mask = GeoMask {
                data: binarize(&raster.data, spec.threshold)?,
                transform: raster.transform,
            };

            let output = self.binarised_path(&spec.file)?;
            RasterIo::write_mask(&output, &mask, &projection)?;
            log::info!("Binarised raster saved: {}", output.display());
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Remove isolated damage pixels from the configured mask
    pub fn clean(&self) -> DamageResult<(PathBuf, CleaningStats)> {
        let cleaning = &self.config.cleaning;
        let cleaner = MaskCleaner::with_params(cleaning.params())?;

        let (mask, projection) = RasterIo::read_mask(self.config.resolve(&cleaning.input))?;
        let (cleaned, stats) = cleaner.clean(&mask.data);

        let output = self.config.resolve(&cleaning.output);
        RasterIo::write_mask(
            &output,
            &GeoMask {
                data: cleaned,
                transform: mask.transform,
            },
            &projection,
        )?;
        log::info!("Cleaned raster saved: {}", output.display());
        Ok((output, stats))
    }

    /// Sample the random validation grid over the AOI
    pub fn generate_grid(&self) -> DamageResult<(PathBuf, usize)> {
        self.ensure_output_dir()?;

        let aoi_path = self.config.resolve(&self.config.aoi);
        let aoi = VectorIo::read_aoi(&aoi_path)?;
        let projection = VectorIo::projection(&aoi_path)?;

        let cells = GridSampler::new(self.config.grid.clone())?.sample(&aoi);

        let output = self.config.output_path("selected_grid.shp");
        VectorIo::write_grid(&output, &cells, &projection)?;
        log::info!("Random grid creation and selection completed: {}", output.display());
        Ok((output, cells.len()))
    }

    /// Zonal maximum of each model over the validation grid, scored against ground truth
    pub fn assess_accuracy(&self) -> DamageResult<Vec<ModelMetrics>> {
        let models = self.config.require_models()?;
        let validation = &self.config.validation;

        let units = VectorIo::read_validation_units(
            self.config.resolve(&validation.grid),
            &validation.truth_field,
        )?;
        log::info!("Loaded {} validation units", units.len());

        let mut labelled: Vec<(String, LabelPairs)> = Vec::with_capacity(models.len());
        for model in models {
            log::info!("Processing {}...", model.raster.display());
            let (raster, _) = RasterIo::read(self.config.resolve(&model.raster))?;
            let predictions = predict_labels(&units, &raster.data, &raster.transform, raster.nodata)?;
            labelled.push((model.name.clone(), pair_labels(&units, &predictions)?));
        }

        let results = AccuracyAssessor::assess(&labelled)?;
        save_metrics_csv(self.config.resolve(&validation.results_csv), &results)?;
        Ok(results)
    }

    /// Flag damaged buildings and count them per camp
    pub fn assess_damage(&self) -> DamageResult<Vec<CampDamage>> {
        let damage = &self.config.damage;

        let (mask, _) = RasterIo::read_mask(self.config.resolve(&damage.mask))?;
        let regions = polygonize_damage(&mask.data, &mask.transform)?;

        let buildings_path = self.config.resolve(&damage.buildings);
        let footprints = VectorIo::read_footprints(&buildings_path)?;
        let damaged = damaged_buildings(&regions, &footprints);

        let output = self.config.resolve(&damage.damaged_buildings);
        VectorIo::write_damaged_buildings(&output, &damaged, &VectorIo::projection(&buildings_path)?)?;
        log::info!("Damaged buildings footprints saved at {}", output.display());

        let camps = VectorIo::read_camps(self.config.resolve(&damage.camps), &damage.camp_name_field)?;
        let counts = camp_damage_counts(&damaged, &camps);
        save_camp_damage_csv(self.config.resolve(&damage.camp_csv), &counts)?;
        Ok(counts)
    }
}
