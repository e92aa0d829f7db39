use crate::data::Study;

/// Role instructions sent alongside every generation request.
pub const SYSTEM_PROMPT: &str = "You review observational study designs as a causal inference specialist. \
Your job is to name hidden common causes of treatment and outcome that the analysts may have overlooked. \
Reason about causal mechanisms, not mere correlation.";

const DEFAULT_CONTEXT: &str =
    "No background context was supplied. Use general knowledge of the domain.";

/// Builds the candidate-generation request for `study`.
pub fn format_generation_prompt(study: &Study) -> String {
    let covariates = if study.measured_covariates().is_empty() {
        "None listed".to_string()
    } else {
        study.measured_covariates().join(", ")
    };
    let context = study.background_context().unwrap_or(DEFAULT_CONTEXT);

    format!(
        r#"Study under review:

Research question: {question}
Treatment variable: {treatment}
Outcome variable: {outcome}
Measured covariates: {covariates}

Background:
{context}

List at most 8 candidate confounders. Each one must
1. plausibly influence both who receives the treatment and the outcome,
2. differ in substance from the measured covariates above, and
3. bias the estimated treatment effect if it were left out entirely.

Respond with a single JSON object whose only key is "candidates", holding a list of objects of this shape:

{{
  "candidates": [
    {{
      "name": "snake_case_variable_name",
      "description": "One sentence saying what the variable measures",
      "causes_treatment_because": "Mechanism by which it affects the treatment",
      "causes_outcome_because": "Mechanism by which it affects the outcome, apart from the treatment",
      "severity": "high | medium | low"
    }}
  ]
}}

Return the JSON only, without markdown fences or commentary."#,
        question = study.research_question(),
        treatment = study.treatment(),
        outcome = study.outcome(),
    )
}
