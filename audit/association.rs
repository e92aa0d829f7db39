//! Association tests between dataset columns.
//!
//! Weak evidence never aborts an audit: too few rows, a zero-variance column or
//! a fit that fails to converge all produce a non-significant
//! [`AssociationOutcome`] with `p_value = 1.0` and a [`TestDetails`] entry
//! explaining why. Only a reference to a column that does not exist is an
//! error.

use crate::data::{Dataset, is_binary_coded};
use crate::regression::{self, LinkFunction};
use crate::types::AuditError;
use ndarray::{ArrayView1, Axis, s};
use serde::Serialize;

/// Fewest complete rows any test will run on.
pub const MIN_TEST_ROWS: usize = 5;

/// What a test measured, or why it could not measure anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestDetails {
    Correlation {
        r: f64,
        n: usize,
    },
    Fitted {
        coefficient: f64,
        std_err: f64,
        model: String,
        r_squared: f64,
    },
    InsufficientData {
        complete_rows: usize,
        required: usize,
    },
    FitFailed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationOutcome {
    pub p_value: f64,
    pub is_significant: bool,
    pub details: TestDetails,
}

impl AssociationOutcome {
    fn from_p(p_value: f64, alpha: f64, details: TestDetails) -> Self {
        Self {
            p_value,
            is_significant: p_value < alpha,
            details,
        }
    }

    fn not_significant(details: TestDetails) -> Self {
        Self {
            p_value: 1.0,
            is_significant: false,
            details,
        }
    }

    /// True when the test produced a statistic rather than a degraded marker.
    pub fn was_tested(&self) -> bool {
        matches!(
            self.details,
            TestDetails::Correlation { .. } | TestDetails::Fitted { .. }
        )
    }
}

/// Pearson correlation test on the pairwise-complete rows of `x` and `y`.
pub fn test_unconditional(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
) -> AssociationOutcome {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    let n = xs.len();
    if n < MIN_TEST_ROWS {
        return AssociationOutcome::not_significant(TestDetails::InsufficientData {
            complete_rows: n,
            required: MIN_TEST_ROWS,
        });
    }

    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;
    let (sxy, sxx, syy) = xs
        .iter()
        .zip(&ys)
        .fold((0.0, 0.0, 0.0), |(sxy, sxx, syy), (&a, &b)| {
            let (dx, dy) = (a - mean_x, b - mean_y);
            (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
        });
    if !(sxx > 0.0 && syy > 0.0) {
        log::warn!("Correlation test skipped: a variable has zero variance.");
        return AssociationOutcome::not_significant(TestDetails::FitFailed {
            reason: "zero variance".to_string(),
        });
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = nf - 2.0;
    let t = r * (df / (1.0 - r * r)).sqrt();
    match regression::two_sided_t_p(t, df) {
        Ok(p) => AssociationOutcome::from_p(p, alpha, TestDetails::Correlation { r, n }),
        Err(e) => {
            log::warn!("Correlation test failed: {e}");
            AssociationOutcome::not_significant(TestDetails::FitFailed {
                reason: e.to_string(),
            })
        }
    }
}

/// Tests whether `predictor` is associated with `target` after adjusting for
/// `controls`.
///
/// `binary_target` forces the model family; `None` picks logistic regression
/// when the observed target values are all 0 or 1 and OLS otherwise.
pub fn test_conditional(
    target: &str,
    predictor: &str,
    controls: &[String],
    data: &Dataset,
    alpha: f64,
    binary_target: Option<bool>,
) -> Result<AssociationOutcome, AuditError> {
    let mut columns: Vec<&str> = vec![target, predictor];
    columns.extend(controls.iter().map(String::as_str));
    if let Some(missing) = columns.iter().find(|c| !data.has_column(c)) {
        return Err(AuditError::UnknownColumn(missing.to_string()));
    }

    let rows = data.complete_cases(&columns)?;
    let required = columns.len() + MIN_TEST_ROWS;
    if rows.nrows() < required {
        log::warn!(
            "Insufficient data for {predictor} -> {target}: {} complete rows, {required} required.",
            rows.nrows()
        );
        return Ok(AssociationOutcome::not_significant(
            TestDetails::InsufficientData {
                complete_rows: rows.nrows(),
                required,
            },
        ));
    }

    let y = rows.index_axis(Axis(1), 0);
    let design = regression::with_intercept(rows.slice(s![.., 1..]));
    let link = if binary_target.unwrap_or_else(|| is_binary_coded(y)) {
        LinkFunction::Logit
    } else {
        LinkFunction::Identity
    };

    // Column 0 is the intercept, column 1 the predictor.
    match regression::fit(design.view(), y, link) {
        Ok(fit) => Ok(AssociationOutcome::from_p(
            fit.p_values[1],
            alpha,
            TestDetails::Fitted {
                coefficient: fit.coefficients[1],
                std_err: fit.std_errors[1],
                model: link.model_name().to_string(),
                r_squared: fit.r_squared,
            },
        )),
        Err(e) => {
            log::warn!("{} fit for {predictor} -> {target} failed: {e}", link.model_name());
            Ok(AssociationOutcome::not_significant(TestDetails::FitFailed {
                reason: e.to_string(),
            }))
        }
    }
}
