//! # Bias Quantification
//!
//! Compares the naive treatment effect (outcome regressed on treatment alone)
//! with the effect after adjusting for one measured confounder. The difference
//! is the bias that confounder introduces when it is left out of the model.

use crate::association::MIN_TEST_ROWS;
use crate::data::{Study, is_binary_coded};
use crate::regression::{self, LinkFunction};
use crate::types::{AuditError, BiasEstimationResult, ValidatedConfounder};
use ndarray::{Axis, s};

const ZERO_EFFECT: f64 = 1e-10;

/// OLS coefficient of the column at index 1 of `rows` when column 0 is regressed
/// on all remaining columns plus an intercept.
fn treatment_coefficient(rows: &ndarray::Array2<f64>) -> Result<f64, regression::FitError> {
    let y = rows.index_axis(Axis(1), 0);
    let design = regression::with_intercept(rows.slice(s![.., 1..]));
    let fit = regression::fit(design.view(), y, LinkFunction::Identity)?;
    Ok(fit.coefficients[1])
}

/// Unadjusted treatment effect: OLS slope of outcome on treatment.
///
/// When the regression cannot be fitted and the treatment is coded 0/1 the
/// difference in mean outcome between treated and untreated rows is used
/// instead.
pub fn naive_effect(study: &Study) -> Result<f64, AuditError> {
    let (treatment, outcome) = (study.treatment(), study.outcome());
    let rows = study.data().complete_cases(&[outcome, treatment])?;

    let reason = if rows.nrows() < MIN_TEST_ROWS {
        format!(
            "{} complete rows, at least {MIN_TEST_ROWS} required",
            rows.nrows()
        )
    } else {
        match treatment_coefficient(&rows) {
            Ok(effect) => return Ok(effect),
            Err(e) => e.to_string(),
        }
    };

    let t = rows.index_axis(Axis(1), 1);
    if is_binary_coded(t) {
        let y = rows.index_axis(Axis(1), 0);
        let group_mean = |level: f64| {
            let (sum, count) = y
                .iter()
                .zip(t.iter())
                .filter(|(_, tv)| **tv == level)
                .fold((0.0, 0usize), |(s, c), (yv, _)| (s + yv, c + 1));
            (count > 0).then(|| sum / count as f64)
        };
        if let (Some(treated), Some(control)) = (group_mean(1.0), group_mean(0.0)) {
            log::warn!("Naive regression failed ({reason}); using difference in group means.");
            return Ok(treated - control);
        }
    }

    Err(AuditError::NaiveEstimateUnavailable {
        treatment: treatment.to_string(),
        reason,
    })
}

/// Relative bias in percent, with the adjusted effect as the reference and the
/// naive effect as a fallback when the adjusted effect is zero.
pub fn bias_percentage(naive: f64, adjusted: f64) -> f64 {
    let magnitude = naive - adjusted;
    if adjusted.abs() > ZERO_EFFECT {
        magnitude / adjusted.abs() * 100.0
    } else if naive.abs() > ZERO_EFFECT {
        magnitude / naive.abs() * 100.0
    } else {
        0.0
    }
}

/// Quantifies how much omitting `confounder` shifts the treatment effect.
///
/// `bias_threshold` is a fraction: the result is problematic when the absolute
/// bias percentage exceeds `bias_threshold * 100`.
pub fn estimate_bias(
    confounder: &ValidatedConfounder,
    study: &Study,
    bias_threshold: f64,
) -> Result<BiasEstimationResult, AuditError> {
    let Some(column) = confounder.matched_column() else {
        return Err(AuditError::UnmeasuredConfounder(
            confounder.name().to_string(),
        ));
    };
    if !study.data().has_column(column) {
        return Err(AuditError::UnknownColumn(column.to_string()));
    }

    let naive = naive_effect(study)?;

    let rows = study
        .data()
        .complete_cases(&[study.outcome(), study.treatment(), column])?;
    let adjusted = if rows.nrows() < MIN_TEST_ROWS + 1 {
        Err(format!(
            "{} complete rows, at least {} required",
            rows.nrows(),
            MIN_TEST_ROWS + 1
        ))
    } else {
        treatment_coefficient(&rows).map_err(|e| e.to_string())
    };

    let adjusted = match adjusted {
        Ok(value) => value,
        Err(reason) => {
            log::error!(
                "Adjusted estimate for '{}' failed: {reason}. Reporting zero bias.",
                confounder.name()
            );
            return Ok(BiasEstimationResult {
                naive_estimate: naive,
                adjusted_estimate: naive,
                bias_magnitude: 0.0,
                bias_percentage: 0.0,
                is_problematic: false,
            });
        }
    };

    let bias_magnitude = naive - adjusted;
    let bias_percentage = bias_percentage(naive, adjusted);
    let is_problematic = bias_percentage.abs() > bias_threshold * 100.0;

    log::info!(
        "{}: naive={naive:.4}, adjusted={adjusted:.4}, bias={bias_magnitude:.4} ({bias_percentage:+.1}%)",
        confounder.name()
    );

    Ok(BiasEstimationResult {
        naive_estimate: naive,
        adjusted_estimate: adjusted,
        bias_magnitude,
        bias_percentage,
        is_problematic,
    })
}
