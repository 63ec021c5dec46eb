//! Core damage-assessment processing modules

pub mod accuracy;
pub mod cleaning;
pub mod damage;
pub mod geometry;
pub mod gridding;
pub mod normalize;
pub mod threshold;
pub mod zonal;

// Re-export main types
pub use accuracy::{compute_metrics, AccuracyAssessor, ConfusionMatrix, LabelPairs, Metric, Metrics, ModelMetrics};
pub use cleaning::{label_components, remove_isolated_pixels, CleaningParams, CleaningStats, Connectivity, MaskCleaner};
pub use damage::{camp_damage_counts, damaged_buildings, polygonize_damage, Camp, CampDamage, DamageRegion, DamagedBuilding, Footprint};
pub use geometry::{MultiPolygon, Polygon};
pub use gridding::{GridCell, GridParams, GridSampler};
pub use normalize::{NormalizeParams, Normalizer};
pub use threshold::binarize;
pub use zonal::{pair_labels, predict_labels, zonal_max, zonal_max_parts, ValidationUnit};
