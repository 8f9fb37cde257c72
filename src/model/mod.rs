use std::collections::BTreeMap;

mod request;
mod run;

pub use request::{
    AssertionsSpec, BodyContent, Collection, Environment, ExtractSpec, Headers, JsonPathCheck,
    Method, RequestBody, RequestSpec,
};
pub use run::{
    AssertionResult, ExtractResult, RequestResult, ResponseSnapshot, RunArtifact, RunError,
    RunErrorKind, RunResult,
};

/// Variable name to value. Ordered so serialized output is stable.
pub type Vars = BTreeMap<String, String>;

/// Returns `base` overlaid with `overrides`; neither input is modified.
pub fn merge_vars(base: &Vars, overrides: &Vars) -> Vars {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
