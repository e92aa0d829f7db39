//! Heuristic robustness bounds for confounders the dataset does not contain.

use crate::types::{AuditError, CandidateSeverity, ValidatedConfounder};
use serde::Serialize;

/// A risk ratio below this is considered small enough to plausibly exist
/// undetected, so a confounder needing only this much could overturn the result.
const INVALIDATION_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityResult {
    pub required_strength: f64,
    pub could_invalidate_result: bool,
    pub explanation: String,
}

/// Risk ratio an unmeasured confounder of this severity would need on both
/// paths to explain away the observed effect. Not an E-value.
pub fn required_strength(severity: CandidateSeverity) -> f64 {
    match severity {
        CandidateSeverity::High => 1.5,
        CandidateSeverity::Medium | CandidateSeverity::Unrecognized => 2.5,
        CandidateSeverity::Low => 4.0,
    }
}

/// Bounds how strong an unmeasured confounder must be to invalidate the result.
pub fn bound_unmeasured_confounder(
    confounder: &ValidatedConfounder,
) -> Result<SensitivityResult, AuditError> {
    if confounder.is_measured() {
        return Err(AuditError::MeasuredConfounder(
            confounder.name().to_string(),
        ));
    }

    let strength = required_strength(confounder.candidate.severity);
    let could_invalidate_result = strength < INVALIDATION_THRESHOLD;
    let name = confounder.name();

    let explanation = if could_invalidate_result {
        format!(
            "'{name}' would only need a risk ratio above {strength:.1} with both treatment \
             and outcome to account for the observed effect. Associations of that size are \
             common, so this unmeasured factor could plausibly overturn the conclusion."
        )
    } else {
        format!(
            "'{name}' would need a risk ratio above {strength:.1} with both treatment and \
             outcome to account for the observed effect. The conclusion is moderately robust \
             to this unmeasured factor."
        )
    };

    Ok(SensitivityResult {
        required_strength: strength,
        could_invalidate_result,
        explanation,
    })
}
