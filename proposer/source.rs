use super::parser::{ProposerError, parse_candidates};
use super::prompt::{SYSTEM_PROMPT, format_generation_prompt};
use crate::config::RetryPolicy;
use crate::data::Study;
use crate::types::ConfounderCandidate;
use std::fs;
use std::path::PathBuf;
use std::thread;

/// Anything that can answer a generation request with raw response text.
pub trait CandidateSource {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, ProposerError>;
}

/// Replays a response previously saved to disk.
#[derive(Debug, Clone)]
pub struct ResponseFileSource {
    path: PathBuf,
}

impl ResponseFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CandidateSource for ResponseFileSource {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, ProposerError> {
        log::debug!(
            "Replaying saved response from '{}' ({} + {} bytes of request text ignored)",
            self.path.display(),
            system.len(),
            prompt.len()
        );
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Asks `source` for candidates, retrying failed calls with exponential backoff.
///
/// Only source failures are retried; a response that arrives but cannot be
/// parsed is returned as an error immediately.
pub fn generate_candidates(
    source: &dyn CandidateSource,
    study: &Study,
    retry: &RetryPolicy,
) -> Result<Vec<ConfounderCandidate>, ProposerError> {
    let prompt = format_generation_prompt(study);
    let attempts = retry.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match source.complete(SYSTEM_PROMPT, &prompt) {
            Ok(response) => return parse_candidates(&response),
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    let wait = retry.delay_after(attempt);
                    log::warn!(
                        "Candidate source failed (attempt {attempt}/{attempts}): {e}. Retrying in {wait:?}"
                    );
                    thread::sleep(wait);
                } else {
                    log::warn!("Candidate source failed (attempt {attempt}/{attempts}): {e}");
                }
            }
        }
    }

    Err(ProposerError::Exhausted {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use std::cell::Cell;
    use std::io::Write;

    struct FlakySource {
        failures: u32,
        calls: Cell<u32>,
        response: &'static str,
    }

    impl CandidateSource for FlakySource {
        fn complete(&self, system: &str, prompt: &str) -> Result<String, ProposerError> {
            assert_eq!(system, SYSTEM_PROMPT);
            assert!(prompt.contains("Treatment variable: t"));
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() <= self.failures {
                Err(ProposerError::Source("rate limited".to_string()))
            } else {
                Ok(self.response.to_string())
            }
        }
    }

    fn study() -> Study {
        Study::new(
            Dataset::from_columns(vec![("t", vec![0.0, 1.0]), ("y", vec![1.0, 2.0])]).unwrap(),
            "t",
            "y",
            Vec::new(),
            "q",
            None,
        )
        .unwrap()
    }

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
        }
    }

    const ONE_CANDIDATE: &str = r#"{"candidates": [{"name": "ses",
        "causes_treatment_because": "a", "causes_outcome_because": "b"}]}"#;

    #[test]
    fn retries_until_source_answers() {
        let source = FlakySource {
            failures: 2,
            calls: Cell::new(0),
            response: ONE_CANDIDATE,
        };
        let candidates = generate_candidates(&source, &study(), &no_delay(3)).unwrap();
        assert_eq!(source.calls.get(), 3);
        assert_eq!(candidates[0].name, "ses");
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let source = FlakySource {
            failures: 5,
            calls: Cell::new(0),
            response: ONE_CANDIDATE,
        };
        match generate_candidates(&source, &study(), &no_delay(2)) {
            Err(ProposerError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("rate limited"));
            }
            other => panic!("Expected Exhausted, got {other:?}"),
        }
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn parse_errors_are_not_retried() {
        let source = FlakySource {
            failures: 0,
            calls: Cell::new(0),
            response: "garbage",
        };
        let result = generate_candidates(&source, &study(), &no_delay(3));
        assert!(matches!(result, Err(ProposerError::MalformedJson(_))));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn response_file_source_reads_saved_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{ONE_CANDIDATE}").unwrap();
        let source = ResponseFileSource::new(file.path());
        let candidates = generate_candidates(&source, &study(), &no_delay(1)).unwrap();
        assert_eq!(candidates.len(), 1);
    }
}
