mod collection;
mod context;
mod handle;
mod validate;

pub use collection::{RunCollection, RunOutcome};
pub use context::RunContext;
pub use handle::RunHandle;
pub use validate::{ValidateCollection, ValidationIssue, ValidationReport, EXTRACT_PLACEHOLDER};
