//! Workspace configuration
//!
//! Every stage receives its input and output locations from a
//! [`WorkspaceConfig`] loaded from TOML. Relative paths resolve against
//! `work_dir`.

use crate::core::cleaning::{CleaningParams, Connectivity};
use crate::core::gridding::GridParams;
use crate::types::{DamageError, DamageResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A texture raster to normalize and threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSpec {
    pub file: PathBuf,
    /// Damage threshold on the normalized [0, 1] scale
    pub threshold: f32,
}

impl RasterSpec {
    fn new(file: &str, threshold: f32) -> Self {
        Self { file: PathBuf::from(file), threshold }
    }
}

/// Thresholds tuned for the Al-Geneina texture difference maps
pub fn default_rasters() -> Vec<RasterSpec> {
    vec![
        RasterSpec::new("Al-Gineina_Planet_Dissimilarity.tif", 0.020),
        RasterSpec::new("Al-Gineina_Planet_Homogeneity.tif", 0.176),
        RasterSpec::new("S2_Dissimilarity_Difference_Map_Algenina.tif", 0.039),
        RasterSpec::new("S2_Homogeneity_Difference_Map_Algenina.tif", 0.21),
    ]
}

/// A damage mask evaluated against the validation grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub raster: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Validation grid with ground-truth labels
    pub grid: PathBuf,
    pub truth_field: String,
    pub results_csv: PathBuf,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            grid: PathBuf::from("comp_grid_sel.shp"),
            truth_field: "Damage".to_string(),
            results_csv: PathBuf::from("damage_assessment_results.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub min_component_size: usize,
    /// Use 4-connectivity instead of the full 3x3 neighbourhood
    pub four_connected: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("Phomgen_20.tif"),
            output: PathBuf::from("cleaned_raster.tif"),
            min_component_size: 2,
            four_connected: false,
        }
    }
}

impl CleaningConfig {
    pub fn params(&self) -> CleaningParams {
        CleaningParams {
            min_component_size: self.min_component_size,
            connectivity: if self.four_connected {
                Connectivity::Four
            } else {
                Connectivity::Eight
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Thresholded damage mask
    pub mask: PathBuf,
    pub buildings: PathBuf,
    pub camps: PathBuf,
    pub camp_name_field: String,
    pub damaged_buildings: PathBuf,
    pub camp_csv: PathBuf,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            mask: PathBuf::from("PS_Dissimilarity_Thresholded.tif"),
            buildings: PathBuf::from("AlGineina_buildings_footprints.shp"),
            camps: PathBuf::from("IDP_camps.shp"),
            camp_name_field: "Name".to_string(),
            damaged_buildings: PathBuf::from("Damaged_Buildings_Footprints.shp"),
            camp_csv: PathBuf::from("IDP_Camp_Damage_Assessment.csv"),
        }
    }
}

/// Paths and parameters shared by all pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub work_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_aoi")]
    pub aoi: PathBuf,
    #[serde(default = "default_rasters")]
    pub rasters: Vec<RasterSpec>,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub grid: GridParams,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub damage: DamageConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_aoi() -> PathBuf {
    PathBuf::from("AOI.shp")
}

impl WorkspaceConfig {
    /// Workspace rooted at `work_dir` with default file names
    pub fn new<P: Into<PathBuf>>(work_dir: P) -> Self {
        Self {
            work_dir: work_dir.into(),
            output_dir: default_output_dir(),
            aoi: default_aoi(),
            rasters: default_rasters(),
            models: Vec::new(),
            validation: ValidationConfig::default(),
            grid: GridParams::default(),
            cleaning: CleaningConfig::default(),
            damage: DamageConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> DamageResult<Self> {
        let config: WorkspaceConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> DamageResult<Self> {
        log::info!("Loading workspace configuration from {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> DamageResult<()> {
        for spec in &self.rasters {
            if !(0.0..=1.0).contains(&spec.threshold) {
                return Err(DamageError::Config(format!(
                    "Threshold {} for {} is outside [0, 1]",
                    spec.threshold,
                    spec.file.display()
                )));
            }
        }

        let mut names = std::collections::HashSet::new();
        for model in &self.models {
            if model.name.is_empty() {
                return Err(DamageError::Config(format!(
                    "Model for {} has an empty name",
                    model.raster.display()
                )));
            }
            if !names.insert(model.name.as_str()) {
                return Err(DamageError::Config(format!("Duplicate model name {}", model.name)));
            }
        }

        if !self.grid.cell_size.is_finite() || self.grid.cell_size <= 0.0 {
            return Err(DamageError::Config(format!(
                "Grid cell size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        if self.cleaning.min_component_size == 0 {
            return Err(DamageError::Config(
                "min_component_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a workspace-relative path
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Resolve a path inside the output directory
    pub fn output_path<P: AsRef<Path>>(&self, file: P) -> PathBuf {
        self.resolve(&self.output_dir).join(file)
    }

    /// Models to assess; fails when none are configured
    pub fn require_models(&self) -> DamageResult<&[ModelSpec]> {
        if self.models.is_empty() {
            return Err(DamageError::Config("No models configured for accuracy assessment".to_string()));
        }
        Ok(&self.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
work_dir = "/data/post-processing"
output_dir = "out"

[[rasters]]
file = "planet_dissimilarity.tif"
threshold = 0.35

[[models]]
raster = "S2_hom_15.tif"
name = "S2_Hom"

[[models]]
raster = "Phomgen_20.tif"
name = "PS_Hom"

[grid]
cell_size = 20.0
sample_size = 100
seed = 7

[damage]
camp_name_field = "CampName"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = WorkspaceConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.rasters.len(), 1);
        assert_eq!(config.models[1].name, "PS_Hom");
        assert_eq!(config.grid.seed, Some(7));
        assert_eq!(config.validation.truth_field, "Damage");
        assert_eq!(config.damage.camp_name_field, "CampName");
        assert_eq!(config.damage.camps, PathBuf::from("IDP_camps.shp"));
        assert_eq!(config.aoi, PathBuf::from("AOI.shp"));
    }

    #[test]
    fn test_default_rasters_when_omitted() {
        let config = WorkspaceConfig::from_toml_str("work_dir = \"/tmp\"").unwrap();
        assert_eq!(config.rasters, default_rasters());
        assert_eq!(config.grid.sample_size, 2800);
        assert!(config.require_models().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let config = WorkspaceConfig::new("/data/ws");
        assert_eq!(config.resolve("AOI.shp"), PathBuf::from("/data/ws/AOI.shp"));
        assert_eq!(config.resolve("/abs/x.tif"), PathBuf::from("/abs/x.tif"));
        assert_eq!(config.output_path("a.tif"), PathBuf::from("/data/ws/results/a.tif"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let bad_threshold = "work_dir = \"/tmp\"\n[[rasters]]\nfile = \"a.tif\"\nthreshold = 1.5\n";
        assert!(matches!(
            WorkspaceConfig::from_toml_str(bad_threshold),
            Err(DamageError::Config(_))
        ));

        let duplicate = "work_dir = \"/tmp\"\n[[models]]\nraster = \"a.tif\"\nname = \"A\"\n\
                         [[models]]\nraster = \"b.tif\"\nname = \"A\"\n";
        assert!(WorkspaceConfig::from_toml_str(duplicate).is_err());

        let bad_grid = "work_dir = \"/tmp\"\n[grid]\ncell_size = -5.0\nsample_size = 10\n";
        assert!(WorkspaceConfig::from_toml_str(bad_grid).is_err());
    }

    #[test]
    fn test_demo_workspace_parses() {
        let config = WorkspaceConfig::from_toml_str(include_str!("../demos/workspace.toml")).unwrap();

        for (parsed, expected) in config.rasters.iter().zip(default_rasters()) {
            assert_eq!(parsed.file, expected.file);
            assert!((parsed.threshold - expected.threshold).abs() < 1e-6);
        }
        let names: Vec<&str> = config.require_models().unwrap().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["S2_Hom", "S2_Diss", "PS_Hom", "PS_Diss"]);
        assert_eq!(config.cleaning.params().connectivity, Connectivity::Eight);
        assert_eq!(config.damage, DamageConfig::default());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            WorkspaceConfig::from_toml_str("work_dir = "),
            Err(DamageError::Toml(_))
        ));
    }
}
