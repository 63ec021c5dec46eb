use crate::core::accuracy::{Metric, ModelMetrics};
use crate::core::damage::CampDamage;
use crate::types::DamageResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column order of the accuracy table
pub const METRICS_HEADER: [&str; 13] = [
    "Model",
    "True_Positive",
    "False_Positive",
    "False_Negative",
    "True_Negative",
    "Overall_Accuracy",
    "Precision",
    "Recall",
    "F1_Score",
    "Specificity",
    "Omission_Error",
    "Commission_Error",
    "Kappa",
];

pub const CAMP_DAMAGE_HEADER: [&str; 2] = ["IDP_Camp", "Damaged_Buildings"];

/// Quote a field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Rates always carry a decimal point, so `1` is written `1.0`
fn float_field(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Undefined metrics are written as empty fields
fn metric_field(metric: Metric) -> String {
    match metric {
        Metric::Value(v) => float_field(v),
        Metric::Undefined => String::new(),
    }
}

/// Write the accuracy table, one row per model in the given order
pub fn write_metrics_csv<W: Write>(writer: &mut W, results: &[ModelMetrics]) -> DamageResult<()> {
    writeln!(writer, "{}", METRICS_HEADER.join(","))?;

    for result in results {
        let m = &result.metrics;
        let c = &m.confusion;
        let row = [
            csv_field(&result.model),
            c.true_positive.to_string(),
            c.false_positive.to_string(),
            c.false_negative.to_string(),
            c.true_negative.to_string(),
            float_field(m.overall_accuracy),
            metric_field(m.precision),
            metric_field(m.recall),
            metric_field(m.f1_score),
            metric_field(m.specificity),
            metric_field(m.omission_error),
            metric_field(m.commission_error),
            metric_field(m.kappa),
        ];
        writeln!(writer, "{}", row.join(","))?;
    }
    Ok(())
}

pub fn save_metrics_csv<P: AsRef<Path>>(path: P, results: &[ModelMetrics]) -> DamageResult<()> {
    log::info!("Saving accuracy results to {}", path.as_ref().display());
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_metrics_csv(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

/// Write damaged-building counts per camp
pub fn write_camp_damage_csv<W: Write>(writer: &mut W, counts: &[CampDamage]) -> DamageResult<()> {
    writeln!(writer, "{}", CAMP_DAMAGE_HEADER.join(","))?;
    for entry in counts {
        writeln!(writer, "{},{}", csv_field(&entry.camp), entry.damaged_buildings)?;
    }
    Ok(())
}

pub fn save_camp_damage_csv<P: AsRef<Path>>(path: P, counts: &[CampDamage]) -> DamageResult<()> {
    log::info!("Saving camp damage counts to {}", path.as_ref().display());
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_camp_damage_csv(&mut writer, counts)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accuracy::{compute_metrics, LabelPairs};

    fn model(name: &str, pairs: &[(i64, i64)]) -> ModelMetrics {
        let pairs: LabelPairs = pairs.iter().copied().enumerate().map(|(i, p)| (i as i64, p)).collect();
        ModelMetrics {
            model: name.to_string(),
            metrics: compute_metrics(&pairs).unwrap(),
        }
    }

    #[test]
    fn test_metrics_csv_layout() {
        let results = vec![
            model("S2_Hom", &[(1, 1), (0, 1), (1, 0), (0, 0)]),
            model("PS_Diss", &[(0, 0), (0, 0)]),
        ];
        let mut buf = Vec::new();
        write_metrics_csv(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Model,True_Positive,False_Positive,False_Negative,True_Negative,Overall_Accuracy,\
             Precision,Recall,F1_Score,Specificity,Omission_Error,Commission_Error,Kappa"
        );
        assert_eq!(lines[1], "S2_Hom,1,1,1,1,0.5,0.5,0.5,0.5,0.5,0.5,0.5,0.0");
        assert_eq!(lines[2], "PS_Diss,0,0,0,2,1.0,,,,1.0,,,");
    }

    #[test]
    fn test_float_field_keeps_decimal_point() {
        assert_eq!(float_field(1.0), "1.0");
        assert_eq!(float_field(0.0), "0.0");
        assert_eq!(float_field(-1.0), "-1.0");
        assert_eq!(float_field(0.75), "0.75");
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Abu Shouk, North"), "\"Abu Shouk, North\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_camp_damage_csv() {
        let counts = vec![CampDamage {
            camp: "Ardamata".to_string(),
            damaged_buildings: 12,
        }];
        let mut buf = Vec::new();
        write_camp_damage_csv(&mut buf, &counts).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "IDP_Camp,Damaged_Buildings\nArdamata,12\n");
    }
}
