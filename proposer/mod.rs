//! Boundary to the external generator that proposes confounder candidates.
//!
//! The audit itself never talks to a language model. This module builds the
//! request text, parses whatever JSON comes back and retries a flaky source.

pub mod parser;
pub mod prompt;
pub mod source;

pub use parser::{ProposerError, parse_candidates};
pub use prompt::{SYSTEM_PROMPT, format_generation_prompt};
pub use source::{CandidateSource, ResponseFileSource, generate_candidates};
