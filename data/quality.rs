//! Pre-flight checks deciding whether a study is fit for causal analysis.

use super::dataset::{Study, is_binary_coded};
use ndarray::ArrayView1;
use std::collections::HashSet;

/// Outcome of [`validate_study`]. Errors block the audit, warnings do not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StudyValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn missing_count(values: ArrayView1<f64>) -> usize {
    values.iter().filter(|v| !v.is_finite()).count()
}

fn distinct_count(values: ArrayView1<f64>) -> usize {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.to_bits())
        .collect::<HashSet<_>>()
        .len()
}

/// Checks sample size, missingness and variation of the core columns.
pub fn validate_study(study: &Study, min_samples: usize) -> StudyValidation {
    let mut report = StudyValidation::default();
    let n = study.n_samples();
    let data = study.data();

    if n < min_samples {
        report.errors.push(format!(
            "Insufficient samples: {n} < {min_samples} required for reliable causal inference."
        ));
    } else if n < min_samples * 2 {
        report.warnings.push(format!(
            "Small sample size ({n}). Causal estimates may have wide confidence intervals."
        ));
    }

    // Study construction guarantees both columns exist.
    if let Some(treatment) = data.column(study.treatment()) {
        let t = study.treatment();
        if missing_count(treatment) > 0 {
            report
                .errors
                .push(format!("Treatment column '{t}' contains missing values."));
        } else {
            let distinct = distinct_count(treatment);
            if distinct < 2 {
                report.errors.push(format!(
                    "Treatment column '{t}' has no variation (only {distinct} unique value)."
                ));
            }
            if distinct == 2 && !is_binary_coded(treatment) {
                report.warnings.push(format!(
                    "Treatment '{t}' is binary but not coded 0/1. Consider recoding for cleaner interpretation."
                ));
            }
        }
    }

    if let Some(outcome) = data.column(study.outcome()) {
        let y = study.outcome();
        if missing_count(outcome) > 0 {
            report
                .errors
                .push(format!("Outcome column '{y}' contains missing values."));
        } else if distinct_count(outcome) < 2 {
            report
                .errors
                .push(format!("Outcome column '{y}' has no variation."));
        }
    }

    for covariate in study.measured_covariates() {
        let Some(values) = data.column(covariate) else {
            continue;
        };
        if n == 0 {
            break;
        }
        let missing_fraction = missing_count(values) as f64 / n as f64;
        if missing_fraction > 0.5 {
            report.warnings.push(format!(
                "Covariate '{covariate}' is missing in {:.0}% of rows.",
                missing_fraction * 100.0
            ));
        } else if missing_fraction > 0.0 {
            report.warnings.push(format!(
                "Covariate '{covariate}' has missing values. Statistical detection may drop these rows."
            ));
        }
    }

    if !report.is_valid() {
        log::error!("Study validation failed with {} errors", report.errors.len());
    } else if !report.warnings.is_empty() {
        log::warn!(
            "Study validation passed with {} warnings",
            report.warnings.len()
        );
    } else {
        log::info!("Study validation passed.");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;

    fn study_from(columns: Vec<(&str, Vec<f64>)>, covariates: &[&str]) -> Study {
        Study::new(
            Dataset::from_columns(columns).unwrap(),
            "t",
            "y",
            covariates.iter().map(|c| c.to_string()).collect(),
            "q",
            None,
        )
        .unwrap()
    }

    #[test]
    fn clean_study_passes() {
        let t: Vec<f64> = (0..10).map(|i| (i % 2) as f64).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let report = validate_study(&study_from(vec![("t", t), ("y", y)], &[]), 5);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn too_few_samples_is_an_error_and_borderline_is_a_warning() {
        let t = vec![0.0, 1.0, 0.0, 1.0];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let study = study_from(vec![("t", t), ("y", y)], &[]);

        let report = validate_study(&study, 10);
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("Insufficient samples"));

        let report = validate_study(&study, 3);
        assert!(report.is_valid());
        assert!(report.warnings[0].contains("Small sample size"));
    }

    #[test]
    fn constant_treatment_and_missing_outcome_are_errors() {
        let t = vec![1.0; 4];
        let y = vec![1.0, f64::NAN, 3.0, 4.0];
        let report = validate_study(&study_from(vec![("t", t), ("y", y)], &[]), 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.contains("no variation")));
        assert!(report.errors.iter().any(|e| e.contains("missing values")));
    }

    #[test]
    fn non_zero_one_binary_treatment_and_sparse_covariate_warn() {
        let t = vec![1.0, 2.0, 1.0, 2.0];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let z = vec![f64::NAN, f64::NAN, f64::NAN, 1.0];
        let w = vec![f64::NAN, 1.0, 2.0, 3.0];
        let report = validate_study(
            &study_from(vec![("t", t), ("y", y), ("z", z), ("w", w)], &["z", "w"]),
            1,
        );
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 3);
        assert!(report.warnings.iter().any(|w| w.contains("not coded 0/1")));
        assert!(report.warnings.iter().any(|w| w.contains("missing in 75% of rows")));
        assert!(report.warnings.iter().any(|w| w.contains("'w' has missing values")));
    }
}
