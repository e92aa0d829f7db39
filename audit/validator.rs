//! # Confounder Validation
//!
//! Decides, for each proposed candidate, whether the data can speak to it and
//! what it says. A candidate that maps onto a measured covariate `Z` is a
//! statistical confounder only if both of these hold at level `alpha`:
//!
//! 1. `Z` predicts the treatment, adjusting for the other covariates.
//! 2. `Z` predicts the outcome, adjusting for the treatment and the other
//!    covariates.
//!
//! Candidates without a matching column are kept as unmeasured; candidates that
//! resolve to the treatment or outcome themselves are dropped.

use crate::association::test_conditional;
use crate::data::Study;
use crate::matcher::match_candidate;
use crate::types::{AuditError, ConfounderCandidate, ConfoundingEvidence, ValidatedConfounder};
use rayon::prelude::*;

/// Validates every candidate against `study`, preserving input order.
///
/// Candidates are processed on the rayon pool; `collect` on an indexed
/// parallel iterator keeps the original ordering.
pub fn validate_candidates(
    candidates: &[ConfounderCandidate],
    study: &Study,
    alpha: f64,
) -> Result<Vec<ValidatedConfounder>, AuditError> {
    let verdicts: Vec<Option<ValidatedConfounder>> = candidates
        .par_iter()
        .map(|candidate| validate_one(candidate, study, alpha))
        .collect::<Result<_, _>>()?;

    let validated: Vec<ValidatedConfounder> = verdicts.into_iter().flatten().collect();
    log::info!(
        "Validated {} of {} candidates ({} measured)",
        validated.len(),
        candidates.len(),
        validated.iter().filter(|v| v.is_measured()).count()
    );
    Ok(validated)
}

fn validate_one(
    candidate: &ConfounderCandidate,
    study: &Study,
    alpha: f64,
) -> Result<Option<ValidatedConfounder>, AuditError> {
    let Some(column) = match_candidate(candidate, study.data().column_names()) else {
        log::info!("{}: unmeasured (theoretical only)", candidate.name);
        return Ok(Some(ValidatedConfounder::unmeasured(candidate.clone())));
    };

    if column == study.treatment() || column == study.outcome() {
        log::warn!(
            "Discarding candidate '{}': it matched the study variable '{column}'",
            candidate.name
        );
        return Ok(None);
    }

    let evidence = check_confounding_criteria(study, &column, alpha)?;
    log::info!(
        "{}: measured as '{column}', {} (p_T={:.4}, p_Y={:.4})",
        candidate.name,
        if evidence.is_statistical_confounder() {
            "SIGNIFICANT"
        } else {
            "not significant"
        },
        evidence.causes_treatment.p_value,
        evidence.causes_outcome.p_value
    );
    Ok(Some(ValidatedConfounder::measured(
        candidate.clone(),
        column,
        evidence,
    )))
}

/// Runs both conditional tests for a measured column.
pub fn check_confounding_criteria(
    study: &Study,
    column: &str,
    alpha: f64,
) -> Result<ConfoundingEvidence, AuditError> {
    let others = study.covariates_excluding(column);
    let treatment = study.treatment();

    let causes_treatment = test_conditional(treatment, column, &others, study.data(), alpha, None)?;

    let mut outcome_controls = Vec::with_capacity(others.len() + 1);
    outcome_controls.push(treatment.to_string());
    outcome_controls.extend(others);
    let causes_outcome = test_conditional(
        study.outcome(),
        column,
        &outcome_controls,
        study.data(),
        alpha,
        None,
    )?;

    Ok(ConfoundingEvidence {
        causes_treatment,
        causes_outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::types::{CandidateSeverity, ValidationStatus};

    /// `z` drives both `t` and `y`; `noise` is unrelated to either.
    fn confounded_study() -> Study {
        let n = 60;
        let z: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
        let t: Vec<f64> = z.iter().map(|&v| if v >= 5.0 { 1.0 } else { 0.0 }).collect();
        // Small deterministic jitter so t is not a perfect function of z.
        let t: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, &v)| if i % 7 == 0 { 1.0 - v } else { v })
            .collect();
        let noise: Vec<f64> = (0..n).map(|i| ((i * 37) % 11) as f64).collect();
        let y: Vec<f64> = (0..n)
            .map(|i| 3.0 * z[i] + 2.0 * t[i] + ((i * 13) % 5) as f64 * 0.1)
            .collect();
        Study::new(
            Dataset::from_columns(vec![("t", t), ("y", y), ("z", z), ("noise", noise)]).unwrap(),
            "t",
            "y",
            vec!["z".to_string(), "noise".to_string()],
            "Does t affect y?",
            None,
        )
        .unwrap()
    }

    fn candidate(name: &str) -> ConfounderCandidate {
        ConfounderCandidate::new(name, "", "a", "b", CandidateSeverity::High)
    }

    #[test]
    fn order_is_preserved_and_study_variables_discarded() {
        let study = confounded_study();
        let candidates = vec![
            candidate("genetics"),
            candidate("z"),
            candidate("t"),
            candidate("noise"),
        ];
        let validated = validate_candidates(&candidates, &study, 0.05).unwrap();
        let names: Vec<&str> = validated.iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["genetics", "z", "noise"]);
        assert_eq!(
            validated[0].validation_status(),
            ValidationStatus::UnmeasuredTheoretical
        );
        assert_eq!(validated[1].matched_column(), Some("z"));
    }

    #[test]
    fn strong_confounder_is_confirmed() {
        let study = confounded_study();
        let evidence = check_confounding_criteria(&study, "z", 0.05).unwrap();
        assert!(evidence.causes_treatment.is_significant);
        assert!(evidence.causes_outcome.is_significant);
        assert!(evidence.is_statistical_confounder());
    }

    #[test]
    fn empty_candidate_list_is_valid() {
        let study = confounded_study();
        assert!(validate_candidates(&[], &study, 0.05).unwrap().is_empty());
    }
}
