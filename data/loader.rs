//! # Study Loading
//!
//! Reads a delimited text file with `polars`, keeps every column that can be
//! represented as `f64` and assembles a [`Study`]. Boolean columns become 0/1,
//! empty cells become `NaN`. Columns that cannot be cast to a number are
//! dropped with a warning unless they are the treatment or outcome, in which
//! case loading fails.

use super::dataset::{DataError, Dataset, Study};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Metadata column names never offered as covariates (matched case-insensitively).
pub const RESERVED_COLUMNS: [&str; 4] = ["id", "index", "timestamp", "date"];

/// Loads a study from a CSV (or `.tsv`) file.
///
/// All numeric columns other than the treatment, the outcome and
/// [`RESERVED_COLUMNS`] become measured covariates.
pub fn load_study(
    path: &Path,
    treatment: &str,
    outcome: &str,
    research_question: &str,
    context_path: Option<&Path>,
) -> Result<Study, DataError> {
    log::info!("Loading dataset from '{}'", path.display());
    let table = internal::read_numeric_table(path)?;

    for required in [treatment, outcome] {
        if let Some(found_type) = table.non_numeric.iter().find_map(|(name, dtype)| {
            (name == required).then(|| dtype.clone())
        }) {
            return Err(DataError::ColumnWrongType {
                column_name: required.to_string(),
                expected_type: "f64 (numeric)",
                found_type,
            });
        }
        if !table.dataset.has_column(required) {
            return Err(DataError::ColumnNotFound(required.to_string()));
        }
    }

    for (name, dtype) in &table.non_numeric {
        log::warn!("Dropping non-numeric column '{name}' ({dtype}); it cannot be tested as a confounder.");
    }

    let covariates: Vec<String> = table
        .dataset
        .column_names()
        .iter()
        .filter(|c| c.as_str() != treatment && c.as_str() != outcome)
        .filter(|c| {
            !RESERVED_COLUMNS
                .iter()
                .any(|reserved| c.eq_ignore_ascii_case(reserved))
        })
        .cloned()
        .collect();

    log::info!(
        "Loaded dataset: {} rows, {} standard covariates",
        table.dataset.n_rows(),
        covariates.len()
    );

    let background_context = match context_path {
        Some(ctx) if ctx.exists() => {
            log::info!("Loaded background context from '{}'", ctx.display());
            Some(fs::read_to_string(ctx)?)
        }
        Some(ctx) => {
            log::warn!("Context file not found: '{}'", ctx.display());
            None
        }
        None => None,
    };

    Study::new(
        table.dataset,
        treatment,
        outcome,
        covariates,
        research_question,
        background_context,
    )
}

mod internal {
    use super::*;

    pub(super) struct NumericTable {
        pub dataset: Dataset,
        /// Columns that could not be cast, with their inferred dtype.
        pub non_numeric: Vec<(String, String)>,
    }

    pub(super) fn read_numeric_table(path: &Path) -> Result<NumericTable, DataError> {
        let separator = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        };

        let df = CsvReader::new(File::open(path)?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_infer_schema_length(None)
                    .with_parse_options(CsvParseOptions::default().with_separator(separator)),
            )
            .finish()?;

        let mut columns = Vec::with_capacity(df.width());
        let mut non_numeric = Vec::new();

        for name in df.get_column_names() {
            let column = df.column(name.as_str())?;
            let nulls_before = column.null_count();
            let found_type = format!("{:?}", column.dtype());

            // Non-strict casts turn unparsable cells into nulls, so a rise in
            // the null count means the column is not numeric.
            let casted = match column.cast(&DataType::Float64) {
                Ok(casted) if casted.null_count() == nulls_before => casted,
                _ => {
                    non_numeric.push((name.to_string(), found_type));
                    continue;
                }
            };

            let values: Vec<f64> = casted
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            columns.push((name.to_string(), values));
        }

        Ok(NumericTable {
            dataset: Dataset::from_columns(columns)?,
            non_numeric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str, suffix: &str) -> io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_study_assigns_covariates_and_skips_reserved_columns() {
        let content = "ID,age,income,Date,treated,score\n\
                       1,30,100.5,2020-01-01,1,10.0\n\
                       2,40,,2020-01-02,0,12.5\n\
                       3,50,300.0,2020-01-03,1,9.0";
        let file = create_test_file(content, ".csv").unwrap();
        let study = load_study(file.path(), "treated", "score", "Q?", None).unwrap();

        assert_eq!(study.n_samples(), 3);
        assert_eq!(study.measured_covariates(), &["age".to_string(), "income".to_string()]);
        assert!(study.data().has_column("ID"));
        assert!(!study.data().has_column("Date"));

        let income = study.data().column("income").unwrap();
        assert_abs_diff_eq!(income[0], 100.5, epsilon = 1e-12);
        assert!(income[1].is_nan());
    }

    #[test]
    fn test_tsv_extension_uses_tab_separator() {
        let content = "t\ty\tz\n0\t1.0\t2.0\n1\t2.0\t3.0";
        let file = create_test_file(content, ".tsv").unwrap();
        let study = load_study(file.path(), "t", "y", "Q?", None).unwrap();
        assert_eq!(study.measured_covariates(), &["z".to_string()]);
    }

    #[test]
    fn test_boolean_columns_load_as_zero_one() {
        let content = "flag,y\ntrue,1.0\nfalse,2.0\ntrue,3.0";
        let file = create_test_file(content, ".csv").unwrap();
        let study = load_study(file.path(), "flag", "y", "Q?", None).unwrap();
        let flag = study.data().column("flag").unwrap();
        assert_eq!(flag.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_treatment_column() {
        let file = create_test_file("a,y\n1,2\n3,4", ".csv").unwrap();
        match load_study(file.path(), "treated", "y", "Q?", None) {
            Err(DataError::ColumnNotFound(col)) => assert_eq!(col, "treated"),
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_text_outcome_is_rejected_but_text_covariate_is_dropped() {
        let content = "t,y,region\n0,low,north\n1,high,south";
        let file = create_test_file(content, ".csv").unwrap();
        match load_study(file.path(), "t", "y", "Q?", None) {
            Err(DataError::ColumnWrongType { column_name, .. }) => assert_eq!(column_name, "y"),
            other => panic!("Expected ColumnWrongType, got {:?}", other),
        }

        let content = "t,y,region\n0,1.5,north\n1,2.5,south";
        let file = create_test_file(content, ".csv").unwrap();
        let study = load_study(file.path(), "t", "y", "Q?", None).unwrap();
        assert!(study.measured_covariates().is_empty());
    }

    #[test]
    fn test_context_file_is_read_when_present() {
        let data = create_test_file("t,y\n0,1\n1,2", ".csv").unwrap();
        let ctx = create_test_file("Students self-select into tutoring.", ".md").unwrap();
        let study = load_study(data.path(), "t", "y", "Q?", Some(ctx.path())).unwrap();
        assert!(study.background_context().unwrap().contains("self-select"));

        let missing = Path::new("/definitely/not/here.md");
        let study = load_study(data.path(), "t", "y", "Q?", Some(missing)).unwrap();
        assert!(study.background_context().is_none());
    }
}
