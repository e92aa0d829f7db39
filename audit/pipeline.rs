//! End-to-end audit: validation, bias quantification, ranking and suggestions.

use crate::bias::{estimate_bias, naive_effect};
use crate::config::AuditConfig;
use crate::correction::{CorrectionStrategy, suggest_corrections};
use crate::data::Study;
use crate::ranking::{RankedConfounder, rank_confounders};
use crate::types::{AssessedConfounder, AuditError, ConfounderCandidate, ValidatedConfounder};
use crate::validator::validate_candidates;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything one audit run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditOutcome {
    pub validated: Vec<ValidatedConfounder>,
    pub assessed: Vec<AssessedConfounder>,
    pub ranked: Vec<RankedConfounder>,
    pub recommendations: BTreeMap<String, Vec<CorrectionStrategy>>,
    /// `None` when the unadjusted effect could not be estimated.
    pub naive_estimate: Option<f64>,
}

/// Runs the full audit for one study.
///
/// Bias is estimated only for measured confounders that passed both
/// statistical criteria. The call is deterministic: the same inputs always
/// yield the same outcome.
pub fn run_audit(
    candidates: &[ConfounderCandidate],
    study: &Study,
    config: &AuditConfig,
) -> Result<AuditOutcome, AuditError> {
    log::info!(
        "Auditing {} candidates for '{}' -> '{}' (alpha={}, bias threshold={})",
        candidates.len(),
        study.treatment(),
        study.outcome(),
        config.alpha,
        config.bias_threshold
    );

    let validated = validate_candidates(candidates, study, config.alpha)?;

    let naive_estimate = match naive_effect(study) {
        Ok(effect) => {
            log::info!("Naive treatment effect: {effect:.4}");
            Some(effect)
        }
        Err(e) => {
            log::warn!("{e}");
            None
        }
    };

    let assessed = validated
        .par_iter()
        .map(|confounder| {
            let bias = if naive_estimate.is_some() && confounder.is_statistically_significant() {
                Some(estimate_bias(confounder, study, config.bias_threshold)?)
            } else {
                None
            };
            Ok(AssessedConfounder {
                confounder: confounder.clone(),
                bias,
            })
        })
        .collect::<Result<Vec<_>, AuditError>>()?;

    let ranked = rank_confounders(&assessed);
    let recommendations = suggest_corrections(&assessed, study.treatment(), study.outcome());

    log::info!(
        "Audit complete: {} ranked confounders, {} with recommendations",
        ranked.len(),
        recommendations.len()
    );

    Ok(AuditOutcome {
        validated,
        assessed,
        ranked,
        recommendations,
        naive_estimate,
    })
}
