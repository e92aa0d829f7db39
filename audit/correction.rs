//! Concrete next steps for each confounder worth acting on.

use crate::ranking::CRITICAL_BIAS_PERCENT;
use crate::types::AssessedConfounder;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionAction {
    Control,
    Stratify,
    Sensitivity,
    StudyDesign,
}

impl CorrectionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Stratify => "stratify",
            Self::Sensitivity => "sensitivity",
            Self::StudyDesign => "study_design",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionStrategy {
    pub action: CorrectionAction,
    pub description: String,
    /// Model formula illustrating the adjustment, when one applies.
    pub example: Option<String>,
}

/// Suggests corrections keyed by confounder name.
///
/// `outcome` and `treatment` are only used to spell out example formulas.
/// Measured confounders that failed the statistical criteria get no entry.
pub fn suggest_corrections(
    assessed: &[AssessedConfounder],
    treatment: &str,
    outcome: &str,
) -> BTreeMap<String, Vec<CorrectionStrategy>> {
    let mut suggestions = BTreeMap::new();

    for item in assessed {
        let confounder = &item.confounder;
        let name = confounder.name();

        let strategies = match confounder.matched_column() {
            Some(column) => {
                if !confounder.is_statistically_significant() {
                    continue;
                }
                let mut strategies = vec![CorrectionStrategy {
                    action: CorrectionAction::Control,
                    description: format!("Include '{column}' as a covariate in the outcome model."),
                    example: Some(format!("{outcome} ~ {treatment} + {column}")),
                }];
                if item
                    .bias_percentage()
                    .is_some_and(|pct| pct.abs() > CRITICAL_BIAS_PERCENT)
                {
                    strategies.push(CorrectionStrategy {
                        action: CorrectionAction::Stratify,
                        description: format!(
                            "Estimate the treatment effect within strata of '{column}' to check for effect modification."
                        ),
                        example: None,
                    });
                }
                strategies
            }
            None => vec![
                CorrectionStrategy {
                    action: CorrectionAction::Sensitivity,
                    description: format!(
                        "'{name}' is not in the dataset. Report how strong it would have to be to explain away the effect."
                    ),
                    example: None,
                },
                CorrectionStrategy {
                    action: CorrectionAction::StudyDesign,
                    description: format!(
                        "Measure '{name}' in future data collection, or find an instrument or natural experiment that is independent of it."
                    ),
                    example: None,
                },
            ],
        };
        suggestions.insert(name.to_string(), strategies);
    }

    suggestions
}
