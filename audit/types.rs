//! Shared vocabulary of the audit pipeline: candidates, validation verdicts,
//! bias figures and the errors that abort a call.

use crate::association::AssociationOutcome;
use crate::data::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that indicate a broken usage contract rather than a weak statistical
/// signal. Statistical failures never surface here; they are reported as
/// non-significant outcomes instead.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Cannot quantify precise bias for unmeasured confounder '{0}'.")]
    UnmeasuredConfounder(String),

    #[error("Sensitivity analysis is for unmeasured confounders; '{0}' is matched to a column.")]
    MeasuredConfounder(String),

    #[error("Column '{0}' is not present in the study dataset.")]
    UnknownColumn(String),

    #[error(
        "Naive treatment effect could not be estimated for continuous treatment '{treatment}': {reason}"
    )]
    NaiveEstimateUnavailable { treatment: String, reason: String },

    #[error("Dataset access failed: {0}")]
    Data(#[from] DataError),
}

/// The proposer's own assessment of how dangerous a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CandidateSeverity {
    High,
    Medium,
    Low,
    /// Any label outside `{low, medium, high}`.
    Unrecognized,
}

impl CandidateSeverity {
    /// Case-insensitive parse; unknown labels map to [`CandidateSeverity::Unrecognized`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl From<String> for CandidateSeverity {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl fmt::Display for CandidateSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed confounding variable supplied by an external generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfounderCandidate {
    pub name: String,
    pub description: String,
    pub causes_treatment_because: String,
    pub causes_outcome_because: String,
    pub severity: CandidateSeverity,
}

impl ConfounderCandidate {
    /// Creates a candidate with its name in canonical identifier form.
    pub fn new(
        name: &str,
        description: &str,
        causes_treatment_because: &str,
        causes_outcome_because: &str,
        severity: CandidateSeverity,
    ) -> Self {
        Self {
            name: normalize_name(name),
            description: description.trim().to_string(),
            causes_treatment_because: causes_treatment_because.trim().to_string(),
            causes_outcome_because: causes_outcome_because.trim().to_string(),
            severity,
        }
    }

    /// A candidate is worth validating only if it names a variable and
    /// explains both causal paths.
    pub fn is_plausible(&self) -> bool {
        !self.name.is_empty()
            && !self.causes_treatment_because.is_empty()
            && !self.causes_outcome_because.is_empty()
    }
}

/// Lower-case, trimmed, spaces replaced with underscores.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Evidence from the two-sided confounding test on a matched column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfoundingEvidence {
    /// Z → treatment, controlling for the other covariates.
    pub causes_treatment: AssociationOutcome,
    /// Z → outcome, controlling for treatment and the other covariates.
    pub causes_outcome: AssociationOutcome,
}

impl ConfoundingEvidence {
    /// Both criteria must hold; association with one side alone is not confounding.
    pub fn is_statistical_confounder(&self) -> bool {
        self.causes_treatment.is_significant && self.causes_outcome.is_significant
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    Unmeasured,
    Measured {
        column: String,
        evidence: ConfoundingEvidence,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    UnmeasuredTheoretical,
    MeasuredConfirmed,
    MeasuredRejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnmeasuredTheoretical => "unmeasured_theoretical",
            Self::MeasuredConfirmed => "measured_confirmed",
            Self::MeasuredRejected => "measured_rejected",
        }
    }
}

/// A candidate after matching and statistical testing. Immutable once built;
/// bias figures live in a separate [`BiasEstimationResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedConfounder {
    pub candidate: ConfounderCandidate,
    pub measurement: Measurement,
}

impl ValidatedConfounder {
    pub fn unmeasured(candidate: ConfounderCandidate) -> Self {
        Self {
            candidate,
            measurement: Measurement::Unmeasured,
        }
    }

    pub fn measured(
        candidate: ConfounderCandidate,
        column: impl Into<String>,
        evidence: ConfoundingEvidence,
    ) -> Self {
        Self {
            candidate,
            measurement: Measurement::Measured {
                column: column.into(),
                evidence,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.candidate.name
    }

    pub fn is_measured(&self) -> bool {
        matches!(self.measurement, Measurement::Measured { .. })
    }

    pub fn matched_column(&self) -> Option<&str> {
        match &self.measurement {
            Measurement::Measured { column, .. } => Some(column),
            Measurement::Unmeasured => None,
        }
    }

    pub fn evidence(&self) -> Option<&ConfoundingEvidence> {
        match &self.measurement {
            Measurement::Measured { evidence, .. } => Some(evidence),
            Measurement::Unmeasured => None,
        }
    }

    pub fn causes_treatment_pval(&self) -> Option<f64> {
        self.evidence().map(|e| e.causes_treatment.p_value)
    }

    pub fn causes_outcome_pval(&self) -> Option<f64> {
        self.evidence().map(|e| e.causes_outcome.p_value)
    }

    pub fn is_statistically_significant(&self) -> bool {
        self.evidence()
            .is_some_and(ConfoundingEvidence::is_statistical_confounder)
    }

    pub fn validation_status(&self) -> ValidationStatus {
        match self.evidence() {
            None => ValidationStatus::UnmeasuredTheoretical,
            Some(e) if e.is_statistical_confounder() => ValidationStatus::MeasuredConfirmed,
            Some(_) => ValidationStatus::MeasuredRejected,
        }
    }
}

/// Naive versus confounder-adjusted treatment effect for one measured confounder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiasEstimationResult {
    pub naive_estimate: f64,
    pub adjusted_estimate: f64,
    /// `naive - adjusted`.
    pub bias_magnitude: f64,
    pub bias_percentage: f64,
    pub is_problematic: bool,
}

/// A validated confounder explicitly joined with its bias estimate, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessedConfounder {
    pub confounder: ValidatedConfounder,
    pub bias: Option<BiasEstimationResult>,
}

impl AssessedConfounder {
    pub fn bias_percentage(&self) -> Option<f64> {
        self.bias.map(|b| b.bias_percentage)
    }
}
