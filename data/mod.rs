//! Everything that turns user files into a validated [`Study`].
//!
//! The audit core only ever sees a [`Study`]; loading, column typing and
//! data-quality gating live here so the statistical modules can assume the
//! study invariants hold.

pub mod dataset;
pub mod loader;
pub mod quality;

pub use dataset::{DataError, Dataset, Study, is_binary_coded};
pub use loader::{RESERVED_COLUMNS, load_study};
pub use quality::{StudyValidation, validate_study};
