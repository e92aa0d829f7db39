use ndarray::{Array1, Array2, ArrayView1};
use std::collections::HashSet;
use thiserror::Error;

/// A comprehensive error type for all data loading and study construction failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] polars::prelude::PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error("Column '{column_name}' has {found} rows, but the dataset has {expected}.")]
    RaggedColumn {
        column_name: String,
        found: usize,
        expected: usize,
    },
    #[error("Column '{0}' appears more than once in the dataset.")]
    DuplicateColumn(String),
    #[error("Covariate '{0}' is the treatment or outcome column and cannot be used as a covariate.")]
    CovariateIsStudyVariable(String),
}

/// Column-oriented numeric table. Missing cells are stored as `NaN`; any
/// non-finite cell is treated as missing by [`Dataset::complete_cases`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Array1<f64>>,
    n_rows: usize,
}

impl Dataset {
    /// Builds a dataset from `(name, values)` pairs, preserving their order.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut arrays = Vec::new();
        let mut seen = HashSet::new();
        let mut n_rows = None;

        for (name, values) in columns {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(DataError::DuplicateColumn(name));
            }
            let expected = *n_rows.get_or_insert(values.len());
            if values.len() != expected {
                return Err(DataError::RaggedColumn {
                    column_name: name,
                    found: values.len(),
                    expected,
                });
            }
            names.push(name);
            arrays.push(Array1::from_vec(values));
        }

        Ok(Self {
            names,
            columns: arrays,
            n_rows: n_rows.unwrap_or(0),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].view())
    }

    /// Extracts the requested columns (in the requested order) keeping only the
    /// rows where every one of them is finite.
    pub fn complete_cases(&self, names: &[&str]) -> Result<Array2<f64>, DataError> {
        let views = names
            .iter()
            .map(|&name| {
                self.column(name)
                    .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let keep: Vec<usize> = (0..self.n_rows)
            .filter(|&row| views.iter().all(|col| col[row].is_finite()))
            .collect();

        let mut out = Array2::zeros((keep.len(), views.len()));
        for (out_row, &row) in keep.iter().enumerate() {
            for (j, col) in views.iter().enumerate() {
                out[[out_row, j]] = col[row];
            }
        }
        Ok(out)
    }
}

/// True when the observed (finite) values are a non-empty subset of `{0, 1}`.
pub fn is_binary_coded(values: ArrayView1<f64>) -> bool {
    let mut any = false;
    for &v in values.iter().filter(|v| v.is_finite()) {
        if v != 0.0 && v != 1.0 {
            return false;
        }
        any = true;
    }
    any
}

/// An observational study: the data plus the roles of its columns.
///
/// Constructed once per analysis run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Study {
    data: Dataset,
    treatment: String,
    outcome: String,
    measured_covariates: Vec<String>,
    research_question: String,
    background_context: Option<String>,
}

impl Study {
    pub fn new(
        data: Dataset,
        treatment: impl Into<String>,
        outcome: impl Into<String>,
        measured_covariates: Vec<String>,
        research_question: impl Into<String>,
        background_context: Option<String>,
    ) -> Result<Self, DataError> {
        let treatment = treatment.into();
        let outcome = outcome.into();

        for required in [&treatment, &outcome] {
            if !data.has_column(required) {
                return Err(DataError::ColumnNotFound(required.clone()));
            }
        }
        for covariate in &measured_covariates {
            if covariate == &treatment || covariate == &outcome {
                return Err(DataError::CovariateIsStudyVariable(covariate.clone()));
            }
            if !data.has_column(covariate) {
                return Err(DataError::ColumnNotFound(covariate.clone()));
            }
        }

        Ok(Self {
            data,
            treatment,
            outcome,
            measured_covariates,
            research_question: research_question.into(),
            background_context,
        })
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn treatment(&self) -> &str {
        &self.treatment
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn measured_covariates(&self) -> &[String] {
        &self.measured_covariates
    }

    pub fn research_question(&self) -> &str {
        &self.research_question
    }

    pub fn background_context(&self) -> Option<&str> {
        self.background_context.as_deref()
    }

    pub fn n_samples(&self) -> usize {
        self.data.n_rows()
    }

    /// The measured covariates with `column` removed.
    pub fn covariates_excluding(&self, column: &str) -> Vec<String> {
        self.measured_covariates
            .iter()
            .filter(|c| c.as_str() != column)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_dataset() -> Dataset {
        Dataset::from_columns(vec![
            ("t", vec![0.0, 1.0, 1.0, 0.0]),
            ("y", vec![1.0, f64::NAN, 3.0, 4.0]),
            ("z", vec![0.5, 0.1, f64::INFINITY, 0.7]),
        ])
        .unwrap()
    }

    #[test]
    fn complete_cases_drops_rows_with_any_missing_cell() {
        let data = small_dataset();
        let rows = data.complete_cases(&["y", "t"]).unwrap();
        assert_eq!(rows, array![[1.0, 0.0], [3.0, 1.0], [4.0, 0.0]]);

        let rows = data.complete_cases(&["t", "y", "z"]).unwrap();
        assert_eq!(rows.nrows(), 2);
    }

    #[test]
    fn complete_cases_reports_unknown_columns() {
        let data = small_dataset();
        match data.complete_cases(&["t", "missing"]) {
            Err(DataError::ColumnNotFound(col)) => assert_eq!(col, "missing"),
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn ragged_and_duplicate_columns_are_rejected() {
        let ragged = Dataset::from_columns(vec![("a", vec![1.0, 2.0]), ("b", vec![1.0])]);
        assert!(matches!(ragged, Err(DataError::RaggedColumn { .. })));

        let dup = Dataset::from_columns(vec![("a", vec![1.0]), ("a", vec![2.0])]);
        assert!(matches!(dup, Err(DataError::DuplicateColumn(name)) if name == "a"));
    }

    #[test]
    fn binary_detection_ignores_missing_values() {
        assert!(is_binary_coded(array![0.0, 1.0, f64::NAN, 1.0].view()));
        assert!(!is_binary_coded(array![0.0, 1.0, 2.0].view()));
        assert!(!is_binary_coded(array![f64::NAN].view()));
    }

    #[test]
    fn study_rejects_covariate_that_is_the_treatment() {
        let err = Study::new(
            small_dataset(),
            "t",
            "y",
            vec!["t".to_string()],
            "q",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::CovariateIsStudyVariable(c) if c == "t"));
    }

    #[test]
    fn covariates_excluding_removes_only_the_named_column() {
        let study = Study::new(
            small_dataset(),
            "t",
            "y",
            vec!["z".to_string()],
            "q",
            Some("ctx".to_string()),
        )
        .unwrap();
        assert!(study.covariates_excluding("z").is_empty());
        assert_eq!(study.covariates_excluding("other"), vec!["z".to_string()]);
        assert_eq!(study.background_context(), Some("ctx"));
        assert_eq!(study.n_samples(), 4);
    }
}
