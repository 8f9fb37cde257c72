use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::model::RunResult;

pub const MASK: &str = "********";

static SENSITIVE_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "authorization",
        "proxy-authorization",
        "cookie",
        "set-cookie",
        "x-api-key",
        "x-auth-token",
    ]
    .into_iter()
    .collect()
});

const SENSITIVE_VAR_MARKERS: [&str; 3] = ["token", "secret", "password"];
const SENSITIVE_HEADER_MARKERS: [&str; 5] = ["token", "secret", "password", "api-key", "apikey"];

pub fn is_sensitive_var(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_VAR_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn is_sensitive_header(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(lower.as_str())
        || SENSITIVE_HEADER_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
}

/// Returns a redacted copy; `run` itself is left as it was.
pub fn mask_run(run: &RunResult) -> RunResult {
    let mut masked = run.clone();
    for result in &mut masked.results {
        for (name, value) in result.extracted.iter_mut() {
            if is_sensitive_var(name) {
                *value = MASK.to_string();
            }
        }
        for (name, values) in result.response.headers.iter_mut() {
            if is_sensitive_header(name) {
                values.iter_mut().for_each(|value| *value = MASK.to_string());
            }
        }
    }
    masked
}
