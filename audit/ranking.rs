use crate::types::{AssessedConfounder, CandidateSeverity};
use serde::Serialize;
use std::fmt;

/// Bias percentages above this are critical.
pub const CRITICAL_BIAS_PERCENT: f64 = 25.0;
/// Bias percentages above this (and up to the critical bound) are moderate.
pub const MODERATE_BIAS_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfounderSeverity {
    Critical,
    Moderate,
    Minor,
}

impl fmt::Display for ConfounderSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Critical => "CRITICAL",
            Self::Moderate => "MODERATE",
            Self::Minor => "MINOR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedConfounder {
    pub assessed: AssessedConfounder,
    pub severity: ConfounderSeverity,
    /// 1 is the most urgent, 5 the least.
    pub priority: u8,
}

/// Priority and severity for one confounder, or `None` when a measured
/// confounder failed the statistical criteria.
pub fn classify(assessed: &AssessedConfounder) -> Option<(u8, ConfounderSeverity)> {
    let confounder = &assessed.confounder;
    if confounder.is_measured() {
        if !confounder.is_statistically_significant() {
            return None;
        }
        let bias = assessed.bias_percentage().map(f64::abs).unwrap_or(0.0);
        return Some(if bias > CRITICAL_BIAS_PERCENT {
            (1, ConfounderSeverity::Critical)
        } else if bias > MODERATE_BIAS_PERCENT {
            (2, ConfounderSeverity::Moderate)
        } else {
            (4, ConfounderSeverity::Minor)
        });
    }

    Some(match confounder.candidate.severity {
        CandidateSeverity::High => (1, ConfounderSeverity::Critical),
        CandidateSeverity::Medium => (3, ConfounderSeverity::Moderate),
        CandidateSeverity::Low | CandidateSeverity::Unrecognized => (5, ConfounderSeverity::Minor),
    })
}

/// Orders confounders by priority. Ties keep their input order.
pub fn rank_confounders(assessed: &[AssessedConfounder]) -> Vec<RankedConfounder> {
    let mut ranked: Vec<RankedConfounder> = assessed
        .iter()
        .filter_map(|a| {
            classify(a).map(|(priority, severity)| RankedConfounder {
                assessed: a.clone(),
                severity,
                priority,
            })
        })
        .collect();
    // `sort_by_key` is stable.
    ranked.sort_by_key(|r| r.priority);
    ranked
}
