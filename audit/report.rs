//! # Audit Report
//!
//! Joins a finished [`AuditOutcome`] with the study it came from into a flat,
//! display-ready structure. Sensitivity bounds for unmeasured confounders are
//! computed here, since nothing upstream needs them.

use crate::correction::CorrectionStrategy;
use crate::data::Study;
use crate::pipeline::AuditOutcome;
use crate::ranking::ConfounderSeverity;
use crate::sensitivity::{SensitivityResult, bound_unmeasured_confounder};
use crate::types::{AuditError, BiasEstimationResult, CandidateSeverity, ValidationStatus};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to serialize report to JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One ranked confounder as it appears in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub status: ValidationStatus,
    pub matched_column: Option<String>,
    pub is_statistically_significant: bool,
    pub severity: ConfounderSeverity,
    pub priority: u8,
    pub proposed_severity: CandidateSeverity,
    pub causes_treatment_because: String,
    pub causes_outcome_because: String,
    pub causes_treatment_pval: Option<f64>,
    pub causes_outcome_pval: Option<f64>,
    pub bias: Option<BiasEstimationResult>,
    pub sensitivity: Option<SensitivityResult>,
    pub recommendations: Vec<CorrectionStrategy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub research_question: String,
    pub treatment: String,
    pub outcome: String,
    pub n_samples: usize,
    pub naive_estimate: Option<f64>,
    pub entries: Vec<ReportEntry>,
}

impl AuditReport {
    /// Builds the report in rank order.
    pub fn assemble(study: &Study, outcome: &AuditOutcome) -> Result<Self, AuditError> {
        let entries = outcome
            .ranked
            .iter()
            .map(|ranked| {
                let confounder = &ranked.assessed.confounder;
                let sensitivity = if confounder.is_measured() {
                    None
                } else {
                    Some(bound_unmeasured_confounder(confounder)?)
                };
                Ok(ReportEntry {
                    name: confounder.name().to_string(),
                    status: confounder.validation_status(),
                    matched_column: confounder.matched_column().map(str::to_string),
                    is_statistically_significant: confounder.is_statistically_significant(),
                    severity: ranked.severity,
                    priority: ranked.priority,
                    proposed_severity: confounder.candidate.severity,
                    causes_treatment_because: confounder.candidate.causes_treatment_because.clone(),
                    causes_outcome_because: confounder.candidate.causes_outcome_because.clone(),
                    causes_treatment_pval: confounder.causes_treatment_pval(),
                    causes_outcome_pval: confounder.causes_outcome_pval(),
                    bias: ranked.assessed.bias,
                    sensitivity,
                    recommendations: outcome
                        .recommendations
                        .get(confounder.name())
                        .cloned()
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, AuditError>>()?;

        log::info!("Generated report with {} relevant confounders", entries.len());

        Ok(Self {
            research_question: study.research_question().to_string(),
            treatment: study.treatment().to_string(),
            outcome: study.outcome().to_string(),
            n_samples: study.n_samples(),
            naive_estimate: outcome.naive_estimate,
            entries,
        })
    }

    pub fn has_critical_confounders(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.severity == ConfounderSeverity::Critical)
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render_text(&self) -> String {
        self.to_string()
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ReportError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}\nConfounder Audit Report\n{rule}")?;
        writeln!(f, "Research question: {}", self.research_question)?;
        writeln!(
            f,
            "Treatment: {}  Outcome: {}  Samples: {}",
            self.treatment, self.outcome, self.n_samples
        )?;
        if let Some(naive) = self.naive_estimate {
            writeln!(f, "Naive estimate: {naive:+.4}")?;
        }

        if self.entries.is_empty() {
            return writeln!(
                f,
                "\nNo relevant confounders detected. The study design appears robust to the proposed candidates."
            );
        }

        writeln!(
            f,
            "\n{}",
            if self.has_critical_confounders() {
                "Critical confounders detected:"
            } else {
                "Confounders detected:"
            }
        )?;

        for (i, entry) in self.entries.iter().enumerate() {
            let label = match entry.status {
                ValidationStatus::UnmeasuredTheoretical => "unmeasured",
                ValidationStatus::MeasuredConfirmed => "measured and confirmed",
                ValidationStatus::MeasuredRejected => "measured but rejected",
            };
            writeln!(
                f,
                "\n{}. {} ({label}) [{} / priority {}]",
                i + 1,
                entry.name,
                entry.severity,
                entry.priority
            )?;
            writeln!(f, "   Mechanism: {}", entry.causes_treatment_because)?;
            writeln!(f, "              {}", entry.causes_outcome_because)?;

            if let Some(bias) = &entry.bias {
                writeln!(
                    f,
                    "   Estimated bias: {:+.4} ({:+.1}% of adjusted effect)",
                    bias.bias_magnitude, bias.bias_percentage
                )?;
            }
            if let (Some(pt), Some(py)) = (entry.causes_treatment_pval, entry.causes_outcome_pval) {
                writeln!(
                    f,
                    "   Evidence: association with treatment (p={pt:.4}), outcome (p={py:.4})"
                )?;
            }
            if let Some(sensitivity) = &entry.sensitivity {
                writeln!(f, "   Sensitivity: {}", sensitivity.explanation)?;
                writeln!(
                    f,
                    "   Evidence: proposed mechanism only (severity: {})",
                    entry.proposed_severity
                )?;
            }
            if !entry.recommendations.is_empty() {
                let text = entry
                    .recommendations
                    .iter()
                    .map(|r| format!("[{}] {}", r.action.as_str(), r.description))
                    .join(" | ");
                writeln!(f, "   Recommendation: {text}")?;
            }
        }
        Ok(())
    }
}
