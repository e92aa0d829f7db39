//! # Unpenalized GLM Fitting
//!
//! The association tests need one thing from a regression: the coefficient of
//! a single predictor together with its standard error and a two-sided p-value.
//! This module provides exactly that for the two model families the audit uses:
//!
//! - `LinkFunction::Identity`: ordinary least squares, t-test on `n - p`
//!   residual degrees of freedom.
//! - `LinkFunction::Logit`: logistic regression fitted by iteratively
//!   reweighted least squares, Wald z-test from the inverse Fisher information.
//!
//! Every normal-equation solve goes through [`scaled_inverse`], which
//! equilibrates the Gram matrix to unit diagonal before an eigendecomposition so
//! that collinear or constant columns are reported as [`FitError::Singular`]
//! instead of producing meaningless coefficients.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::erfc;
use thiserror::Error;

/// Smallest eigenvalue of the equilibrated Gram matrix accepted as full rank.
const RANK_TOLERANCE: f64 = 1e-10;
const MAX_IRLS_ITERATIONS: usize = 35;
const IRLS_TOLERANCE: f64 = 1e-8;

/// Defines the link function, connecting the linear predictor to the mean response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFunction {
    /// The logit link, for binary outcomes (logistic regression).
    Logit,
    /// The identity link, for continuous outcomes (ordinary least squares).
    Identity,
}

impl LinkFunction {
    /// Conventional short name of the fitted model.
    pub fn model_name(&self) -> &'static str {
        match self {
            LinkFunction::Logit => "Logit",
            LinkFunction::Identity => "OLS",
        }
    }
}

#[derive(Error, Debug)]
pub enum FitError {
    #[error(
        "The design matrix is singular or collinear (smallest scaled eigenvalue {min_eigenvalue:.3e})."
    )]
    Singular { min_eigenvalue: f64 },

    #[error("Design column {0} is identically zero or contains non-finite values.")]
    DegenerateColumn(usize),

    #[error("Not enough residual degrees of freedom: {rows} rows for {params} parameters.")]
    NotEnoughRows { rows: usize, params: usize },

    #[error(
        "IRLS did not converge within {max_iterations} iterations. Last deviance change was {last_change:.6e}."
    )]
    DidNotConverge {
        max_iterations: usize,
        last_change: f64,
    },

    #[error("Perfect separation detected: the logistic maximum likelihood estimate does not exist.")]
    PerfectSeparation,

    #[error("Eigendecomposition failed: {0}")]
    EigendecompositionFailed(#[from] ndarray_linalg::error::LinalgError),

    #[error("Invalid reference distribution: {0}")]
    Distribution(String),
}

/// Coefficients and their inferential summaries, in design-column order.
#[derive(Debug, Clone)]
pub struct RegressionFit {
    pub link: LinkFunction,
    pub coefficients: Array1<f64>,
    pub std_errors: Array1<f64>,
    pub p_values: Array1<f64>,
    /// R² for OLS, McFadden's pseudo-R² for logit.
    pub r_squared: f64,
    pub iterations: usize,
}

/// Prepends a column of ones.
pub fn with_intercept(x: ArrayView2<f64>) -> Array2<f64> {
    let mut design = Array2::ones((x.nrows(), x.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(&x);
    design
}

/// Fits `y ~ x` with the given link. `x` must already contain any intercept column.
pub fn fit(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    link: LinkFunction,
) -> Result<RegressionFit, FitError> {
    let (rows, params) = x.dim();
    if rows <= params {
        return Err(FitError::NotEnoughRows { rows, params });
    }
    match link {
        LinkFunction::Identity => fit_ols(x, y),
        LinkFunction::Logit => fit_logit(x, y),
    }
}

fn fit_ols(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<RegressionFit, FitError> {
    let (rows, params) = x.dim();
    let gram = x.t().dot(&x);
    let gram_inv = scaled_inverse(&gram)?;
    let beta = gram_inv.dot(&x.t().dot(&y));

    let residuals = &y - &x.dot(&beta);
    let rss = residuals.dot(&residuals);
    let df = (rows - params) as f64;
    let sigma2 = rss / df;

    let std_errors = gram_inv.diag().mapv(|v| (v * sigma2).max(0.0).sqrt());
    let p_values = beta
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| two_sided_t_p(b / se, df))
        .collect::<Result<Array1<f64>, _>>()?;

    let mean = y.mean().unwrap_or(0.0);
    let tss = y.mapv(|v| (v - mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };

    log::debug!("OLS fit: n={rows}, p={params}, rss={rss:.4e}, r2={r_squared:.4}");

    Ok(RegressionFit {
        link: LinkFunction::Identity,
        coefficients: beta,
        std_errors,
        p_values,
        r_squared,
        iterations: 1,
    })
}

fn fit_logit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<RegressionFit, FitError> {
    let (rows, params) = x.dim();
    let mut beta = Array1::zeros(params);
    let mut eta = x.dot(&beta);
    let (mut mu, mut weights, mut z) = update_glm_vectors(y, &eta);
    let mut deviance = calculate_deviance(y, &mu);
    let mut last_change = f64::INFINITY;
    let mut converged_at = None;

    for iter in 1..=MAX_IRLS_ITERATIONS {
        let xw = &x * &weights.view().insert_axis(Axis(1));
        let gram_inv = scaled_inverse(&xw.t().dot(&x))?;
        beta = gram_inv.dot(&xw.t().dot(&z));

        eta = x.dot(&beta);
        (mu, weights, z) = update_glm_vectors(y, &eta);
        let next_deviance = calculate_deviance(y, &mu);
        last_change = (next_deviance - deviance).abs();
        deviance = next_deviance;

        if last_change < IRLS_TOLERANCE * (deviance.abs() + 0.1) {
            converged_at = Some(iter);
            break;
        }
    }

    let Some(iterations) = converged_at else {
        return Err(FitError::DidNotConverge {
            max_iterations: MAX_IRLS_ITERATIONS,
            last_change,
        });
    };

    // Fitted probabilities pinned to the observed labels mean the likelihood
    // has no finite maximiser.
    if y.iter().zip(mu.iter()).all(|(&yi, &mi)| (yi - mi).abs() < 1e-6) {
        return Err(FitError::PerfectSeparation);
    }

    let xw = &x * &weights.view().insert_axis(Axis(1));
    let covariance = scaled_inverse(&xw.t().dot(&x))?;
    let std_errors = covariance.diag().mapv(|v| v.max(0.0).sqrt());
    let p_values = beta
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| two_sided_normal_p(b / se))
        .collect::<Array1<f64>>();

    let prevalence = y.mean().unwrap_or(0.0);
    let null_log_likelihood = if prevalence > 0.0 && prevalence < 1.0 {
        rows as f64 * (prevalence * prevalence.ln() + (1.0 - prevalence) * (1.0 - prevalence).ln())
    } else {
        0.0
    };
    let r_squared = if null_log_likelihood < 0.0 {
        1.0 - (-0.5 * deviance) / null_log_likelihood
    } else {
        0.0
    };

    log::debug!(
        "Logit fit converged in {iterations} IRLS iterations: deviance={deviance:.4e}, pseudo-r2={r_squared:.4}"
    );

    Ok(RegressionFit {
        link: LinkFunction::Logit,
        coefficients: beta,
        std_errors,
        p_values,
        r_squared,
        iterations,
    })
}

/// Mean, IRLS weights and working response for the logit link.
fn update_glm_vectors(
    y: ArrayView1<f64>,
    eta: &Array1<f64>,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    const MIN_WEIGHT: f64 = 1e-6;
    const PROB_EPS: f64 = 1e-8;

    let eta_clamped = eta.mapv(|e| e.clamp(-700.0, 700.0));
    let mut mu = eta_clamped.mapv(|e| 1.0 / (1.0 + (-e).exp()));
    mu.mapv_inplace(|v| v.clamp(PROB_EPS, 1.0 - PROB_EPS));
    let weights = (&mu * (1.0 - &mu)).mapv(|v| v.max(MIN_WEIGHT));
    let z = &eta_clamped + &((&y - &mu) / &weights);
    (mu, weights, z)
}

/// Binomial deviance, `-2 * log-likelihood` for 0/1 responses.
fn calculate_deviance(y: ArrayView1<f64>, mu: &Array1<f64>) -> f64 {
    const EPS: f64 = 1e-8;
    let total = ndarray::Zip::from(y).and(mu).fold(0.0, |acc, &yi, &mui| {
        let mui = mui.clamp(EPS, 1.0 - EPS);
        let term1 = if yi > EPS {
            yi * (yi.ln() - mui.ln())
        } else {
            0.0
        };
        let term2 = if yi < 1.0 - EPS {
            (1.0 - yi) * ((1.0 - yi).ln() - (1.0 - mui).ln())
        } else {
            0.0
        };
        acc + term1 + term2
    });
    2.0 * total
}

/// Inverse of a symmetric positive semi-definite Gram matrix, computed on its
/// unit-diagonal rescaling so that the rank test is independent of column units.
fn scaled_inverse(gram: &Array2<f64>) -> Result<Array2<f64>, FitError> {
    let scale = gram.diag().mapv(f64::sqrt);
    if let Some(idx) = scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(FitError::DegenerateColumn(idx));
    }
    let outer = scale
        .view()
        .insert_axis(Axis(1))
        .dot(&scale.view().insert_axis(Axis(0)));
    let scaled = gram / &outer;

    let (eigenvalues, eigenvectors) = scaled.eigh(UPLO::Lower)?;
    let min_eigenvalue = eigenvalues.iter().fold(f64::INFINITY, |acc, &v| acc.min(v));
    if !(min_eigenvalue > RANK_TOLERANCE) {
        return Err(FitError::Singular { min_eigenvalue });
    }

    let inv_scaled =
        (&eigenvectors / &eigenvalues.view().insert_axis(Axis(0))).dot(&eigenvectors.t());
    Ok(inv_scaled / &outer)
}

/// Two-sided p-value of a t statistic. A `NaN` statistic (0/0) carries no
/// evidence; an infinite one is conclusive.
pub(crate) fn two_sided_t_p(t: f64, df: f64) -> Result<f64, FitError> {
    if t.is_nan() {
        return Ok(1.0);
    }
    if t.is_infinite() {
        return Ok(0.0);
    }
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| FitError::Distribution(e.to_string()))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

fn two_sided_normal_p(z: f64) -> f64 {
    if z.is_nan() {
        return 1.0;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn ols_matches_textbook_example() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 5.0, 4.0, 5.0];
        let fit = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Identity).unwrap();

        assert_abs_diff_eq!(fit.coefficients[0], 2.2, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.coefficients[1], 0.6, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.std_errors[1], (0.08_f64).sqrt(), epsilon = 1e-10);
        assert_abs_diff_eq!(fit.p_values[1], 0.124027, epsilon = 1e-5);
        assert_abs_diff_eq!(fit.r_squared, 0.6, epsilon = 1e-10);
    }

    #[test]
    fn ols_is_insensitive_to_column_units() {
        let x = array![[1000.0], [2000.0], [3000.0], [4000.0], [5000.0]];
        let y = array![2.0, 4.0, 5.0, 4.0, 5.0];
        let fit = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Identity).unwrap();
        assert_abs_diff_eq!(fit.coefficients[1], 0.0006, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.p_values[1], 0.124027, epsilon = 1e-5);
    }

    #[test]
    fn collinear_design_is_singular() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let y = array![1.0, 3.0, 2.0, 5.0, 4.0];
        let err = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Identity)
            .unwrap_err();
        assert!(matches!(err, FitError::Singular { .. }), "got {err:?}");
    }

    #[test]
    fn constant_predictor_is_collinear_with_intercept() {
        let x = array![[3.0], [3.0], [3.0], [3.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let err = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Identity)
            .unwrap_err();
        assert!(matches!(err, FitError::Singular { .. }), "got {err:?}");
    }

    #[test]
    fn zero_column_is_degenerate() {
        let x = array![[0.0], [0.0], [0.0], [0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let err = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Identity)
            .unwrap_err();
        assert!(matches!(err, FitError::DegenerateColumn(1)), "got {err:?}");
    }

    #[test]
    fn too_few_rows_is_rejected_before_fitting() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        let err = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Identity)
            .unwrap_err();
        assert!(matches!(err, FitError::NotEnoughRows { rows: 2, params: 2 }));
    }

    #[test]
    fn logit_matches_reference_fit() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [9.0], [10.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
        let fit = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Logit).unwrap();

        assert_eq!(fit.link, LinkFunction::Logit);
        assert_abs_diff_eq!(fit.coefficients[0], -3.721882, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.coefficients[1], 0.676706, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.std_errors[1], 0.397905, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.p_values[1], 0.089005, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.r_squared, 0.374576, epsilon = 1e-4);
    }

    #[test]
    fn logit_detects_perfect_separation() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let result = fit(with_intercept(x.view()).view(), y.view(), LinkFunction::Logit);
        assert!(
            matches!(
                result,
                Err(FitError::PerfectSeparation)
                    | Err(FitError::DidNotConverge { .. })
                    | Err(FitError::Singular { .. })
            ),
            "separated data must not produce a fit, got {result:?}"
        );
    }

    #[test]
    fn p_value_edge_cases() {
        assert_eq!(two_sided_t_p(f64::NAN, 5.0).unwrap(), 1.0);
        assert_eq!(two_sided_t_p(f64::INFINITY, 5.0).unwrap(), 0.0);
        assert_abs_diff_eq!(two_sided_t_p(0.0, 5.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(two_sided_normal_p(1.959964), 0.05, epsilon = 1e-6);
    }
}
