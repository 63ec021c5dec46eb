//! Confusion-matrix accuracy assessment of binary damage predictions
//!
//! Each validation unit contributes one `(truth, predicted)` label pair per
//! model. The pairs are counted into a confusion matrix from which the usual
//! map-accuracy statistics are derived. Ratios whose denominator is zero are
//! reported as [`Metric::Undefined`] rather than as zero.

use crate::types::{DamageError, DamageResult, Fid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ground-truth and predicted labels keyed by validation unit
pub type LabelPairs = BTreeMap<Fid, (i64, i64)>;

/// A derived statistic that may lack a defined value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Metric {
    Value(f64),
    Undefined,
}

impl Metric {
    /// `numerator / denominator`, undefined when the denominator is zero
    pub fn ratio(numerator: u64, denominator: u64) -> Self {
        if denominator > 0 {
            Metric::Value(numerator as f64 / denominator as f64)
        } else {
            Metric::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(*v),
            Metric::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Metric::Value(_))
    }
}

/// Counts of the four agreement classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_negative: u64,
}

impl ConfusionMatrix {
    /// Add one validation unit to the matrix
    pub fn record(&mut self, fid: Fid, truth: i64, predicted: i64) -> DamageResult<()> {
        match (truth, predicted) {
            (1, 1) => self.true_positive += 1,
            (0, 1) => self.false_positive += 1,
            (1, 0) => self.false_negative += 1,
            (0, 0) => self.true_negative += 1,
            _ => {
                return Err(DamageError::OutOfDomainLabel { fid, truth, predicted });
            }
        }
        Ok(())
    }

    pub fn from_pairs(pairs: &LabelPairs) -> DamageResult<Self> {
        let mut matrix = ConfusionMatrix::default();
        for (&fid, &(truth, predicted)) in pairs {
            matrix.record(fid, truth, predicted)?;
        }
        Ok(matrix)
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }
}

/// Accuracy statistics for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub confusion: ConfusionMatrix,
    pub overall_accuracy: f64,
    pub precision: Metric,
    /// Sensitivity
    pub recall: Metric,
    pub f1_score: Metric,
    pub specificity: Metric,
    pub omission_error: Metric,
    pub commission_error: Metric,
    /// Chance agreement p_e used by kappa
    pub expected_agreement: f64,
    pub kappa: Metric,
}

impl Metrics {
    pub fn from_confusion(confusion: ConfusionMatrix) -> DamageResult<Self> {
        let ConfusionMatrix {
            true_positive: tp,
            false_positive: fp,
            false_negative: fn_,
            true_negative: tn,
        } = confusion;

        let total = confusion.total();
        if total == 0 {
            return Err(DamageError::DivisionUndefined);
        }
        let n = total as f64;

        let overall_accuracy = (tp + tn) as f64 / n;
        let precision = Metric::ratio(tp, tp + fp);
        let recall = Metric::ratio(tp, tp + fn_);

        let f1_score = match (precision, recall) {
            (Metric::Value(p), Metric::Value(r)) if p + r > 0.0 => {
                Metric::Value(2.0 * p * r / (p + r))
            }
            _ => Metric::Undefined,
        };

        let specificity = Metric::ratio(tn, tn + fp);
        let omission_error = Metric::ratio(fn_, tp + fn_);
        let commission_error = Metric::ratio(fp, tp + fp);

        let expected_agreement = ((tp + fp) as f64 / n) * ((tp + fn_) as f64 / n)
            + ((tn + fp) as f64 / n) * ((tn + fn_) as f64 / n);

        let kappa = if expected_agreement < 1.0 {
            Metric::Value((overall_accuracy - expected_agreement) / (1.0 - expected_agreement))
        } else {
            Metric::Undefined
        };

        Ok(Self {
            confusion,
            overall_accuracy,
            precision,
            recall,
            f1_score,
            specificity,
            omission_error,
            commission_error,
            expected_agreement,
            kappa,
        })
    }
}

/// Compute accuracy statistics from labelled validation units
pub fn compute_metrics(pairs: &LabelPairs) -> DamageResult<Metrics> {
    let confusion = ConfusionMatrix::from_pairs(pairs)?;
    Metrics::from_confusion(confusion)
}

/// Metrics of one named model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    pub metrics: Metrics,
}

impl fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        let c = &m.confusion;
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "  True Positives: {}", c.true_positive)?;
        writeln!(f, "  False Positives: {}", c.false_positive)?;
        writeln!(f, "  False Negatives: {}", c.false_negative)?;
        writeln!(f, "  True Negatives: {}", c.true_negative)?;
        writeln!(f, "  Overall Accuracy: {:.2}%", m.overall_accuracy * 100.0)?;
        write_percent(f, "Precision", m.precision)?;
        write_percent(f, "Recall (Sensitivity)", m.recall)?;
        write_percent(f, "F1 Score", m.f1_score)?;
        write_percent(f, "Specificity", m.specificity)?;
        write_percent(f, "Omission Error Rate", m.omission_error)?;
        write_percent(f, "Commission Error Rate", m.commission_error)?;
        match m.kappa {
            Metric::Value(k) => write!(f, "  Kappa Coefficient: {:.2}", k),
            Metric::Undefined => write!(f, "  Kappa Coefficient: Not applicable"),
        }
    }
}

fn write_percent(f: &mut fmt::Formatter<'_>, label: &str, metric: Metric) -> fmt::Result {
    match metric {
        Metric::Value(v) => writeln!(f, "  {}: {:.2}%", label, v * 100.0),
        Metric::Undefined => writeln!(f, "  {}: Not applicable", label),
    }
}

/// Assesses several models against the same validation units
pub struct AccuracyAssessor;

impl AccuracyAssessor {
    /// Compute metrics for each `(model, pairs)` entry, preserving input order
    pub fn assess(models: &[(String, LabelPairs)]) -> DamageResult<Vec<ModelMetrics>> {
        log::info!("Assessing accuracy of {} models", models.len());

        let results = Self::assess_models(models)?;

        for result in &results {
            log::debug!(
                "{}: OA={:.4}, kappa={:?}",
                result.model,
                result.metrics.overall_accuracy,
                result.metrics.kappa.value()
            );
            if !result.metrics.kappa.is_defined() {
                log::warn!("{}: kappa is undefined (chance agreement is 1)", result.model);
            }
        }
        Ok(results)
    }

    fn assess_one(model: &str, pairs: &LabelPairs) -> DamageResult<ModelMetrics> {
        log::info!("Processing {} ({} validation units)", model, pairs.len());
        let metrics = compute_metrics(pairs).map_err(|e| {
            log::error!("Accuracy assessment failed for {}: {}", model, e);
            e
        })?;
        Ok(ModelMetrics { model: model.to_string(), metrics })
    }

    #[cfg(feature = "parallel")]
    fn assess_models(models: &[(String, LabelPairs)]) -> DamageResult<Vec<ModelMetrics>> {
        use rayon::prelude::*;

        models
            .par_iter()
            .map(|(model, pairs)| Self::assess_one(model, pairs))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn assess_models(models: &[(String, LabelPairs)]) -> DamageResult<Vec<ModelMetrics>> {
        models
            .iter()
            .map(|(model, pairs)| Self::assess_one(model, pairs))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pairs_from_counts(tp: usize, fp: usize, fn_: usize, tn: usize) -> LabelPairs {
        let mut pairs = LabelPairs::new();
        let mut fid = 0;
        for (count, pair) in [(tp, (1, 1)), (fp, (0, 1)), (fn_, (1, 0)), (tn, (0, 0))] {
            for _ in 0..count {
                pairs.insert(fid, pair);
                fid += 1;
            }
        }
        pairs
    }

    #[test]
    fn test_reference_scenario() {
        let pairs = pairs_from_counts(3, 1, 2, 4);
        let m = compute_metrics(&pairs).unwrap();

        assert_eq!(
            m.confusion,
            ConfusionMatrix {
                true_positive: 3,
                false_positive: 1,
                false_negative: 2,
                true_negative: 4,
            }
        );
        assert_eq!(m.confusion.total(), 10);
        assert_abs_diff_eq!(m.overall_accuracy, 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(m.precision.value().unwrap(), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(m.recall.value().unwrap(), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(m.specificity.value().unwrap(), 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(m.omission_error.value().unwrap(), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(m.commission_error.value().unwrap(), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(m.f1_score.value().unwrap(), 2.0 / 3.0, epsilon = 1e-12);

        // p_e = 0.4*0.5 + 0.6*0.5 = 0.5, kappa = (0.7-0.5)/0.5
        assert_abs_diff_eq!(m.expected_agreement, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.kappa.value().unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_all_true_negatives() {
        let pairs = pairs_from_counts(0, 0, 0, 25);
        let m = compute_metrics(&pairs).unwrap();

        assert_eq!(m.confusion.true_negative, 25);
        assert_eq!(m.overall_accuracy, 1.0);
        assert_eq!(m.precision, Metric::Undefined);
        assert_eq!(m.recall, Metric::Undefined);
        assert_eq!(m.f1_score, Metric::Undefined);
        assert_eq!(m.omission_error, Metric::Undefined);
        assert_eq!(m.commission_error, Metric::Undefined);
        assert_eq!(m.specificity, Metric::Value(1.0));
        assert_eq!(m.kappa, Metric::Undefined);
    }

    #[test]
    fn test_empty_input_is_division_undefined() {
        let result = compute_metrics(&LabelPairs::new());
        assert!(matches!(result, Err(DamageError::DivisionUndefined)));
    }

    #[test]
    fn test_out_of_domain_label_rejected() {
        let mut pairs = pairs_from_counts(2, 2, 2, 2);
        pairs.insert(100, (1, 2));

        match compute_metrics(&pairs) {
            Err(DamageError::OutOfDomainLabel { fid, truth, predicted }) => {
                assert_eq!((fid, truth, predicted), (100, 1, 2));
            }
            other => panic!("expected OutOfDomainLabel, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_precision_and_recall_leaves_f1_undefined() {
        // Only false positives and false negatives
        let pairs = pairs_from_counts(0, 3, 4, 0);
        let m = compute_metrics(&pairs).unwrap();

        assert_eq!(m.precision, Metric::Value(0.0));
        assert_eq!(m.recall, Metric::Value(0.0));
        assert_eq!(m.f1_score, Metric::Undefined);
        assert_eq!(m.overall_accuracy, 0.0);
    }

    #[test]
    fn test_no_predicted_damage() {
        let pairs = pairs_from_counts(0, 0, 5, 15);
        let m = compute_metrics(&pairs).unwrap();

        assert_eq!(m.precision, Metric::Undefined);
        assert_eq!(m.commission_error, Metric::Undefined);
        assert_eq!(m.recall, Metric::Value(0.0));
        assert_eq!(m.omission_error, Metric::Value(1.0));
        // p_e = 0*0.25 + 1*0.75 = 0.75, kappa = (0.75-0.75)/0.25 = 0
        assert_eq!(m.kappa, Metric::Value(0.0));
    }

    #[test]
    fn test_partition_and_accuracy_range() {
        for (tp, fp, fn_, tn) in [(1, 0, 0, 0), (0, 7, 0, 0), (5, 5, 5, 5), (13, 2, 9, 40)] {
            let pairs = pairs_from_counts(tp, fp, fn_, tn);
            let m = compute_metrics(&pairs).unwrap();
            assert_eq!(m.confusion.total() as usize, pairs.len());
            assert!((0.0..=1.0).contains(&m.overall_accuracy));
        }
    }

    #[test]
    fn test_metric_definedness() {
        assert!(Metric::ratio(1, 4).is_defined());
        assert!(!Metric::ratio(3, 0).is_defined());
        assert_eq!(Metric::ratio(1, 4).value(), Some(0.25));
    }

    #[test]
    fn test_compute_metrics_is_idempotent() {
        let pairs = pairs_from_counts(8, 3, 1, 20);
        let first = compute_metrics(&pairs).unwrap();
        let second = compute_metrics(&pairs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_assessor_preserves_model_order() {
        let models = vec![
            ("S2_Hom".to_string(), pairs_from_counts(3, 1, 2, 4)),
            ("S2_Diss".to_string(), pairs_from_counts(0, 0, 0, 4)),
            ("PS_Hom".to_string(), pairs_from_counts(1, 1, 1, 1)),
        ];

        let results = AccuracyAssessor::assess(&models).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(names, vec!["S2_Hom", "S2_Diss", "PS_Hom"]);
        assert_eq!(results[1].metrics.kappa, Metric::Undefined);
    }

    #[test]
    fn test_assessor_fails_on_empty_model() {
        let models = vec![
            ("PS_Hom".to_string(), pairs_from_counts(1, 1, 1, 1)),
            ("PS_Diss".to_string(), LabelPairs::new()),
        ];
        assert!(matches!(
            AccuracyAssessor::assess(&models),
            Err(DamageError::DivisionUndefined)
        ));
    }

    #[test]
    fn test_report_marks_undefined_metrics() {
        let report = ModelMetrics {
            model: "PS_Diss".to_string(),
            metrics: compute_metrics(&pairs_from_counts(0, 0, 0, 3)).unwrap(),
        }
        .to_string();

        assert!(report.contains("Overall Accuracy: 100.00%"));
        assert!(report.contains("Precision: Not applicable"));
        assert!(report.contains("Kappa Coefficient: Not applicable"));
        assert!(report.contains("Specificity: 100.00%"));
    }
}
