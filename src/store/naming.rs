use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

pub const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Lowercases and collapses every run of non-alphanumeric characters into a
/// single hyphen, without leading or trailing hyphens.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// `<UTC start>_<slug>`; falls back to `run` when the name has no usable
/// characters.
pub fn artifact_stem(started_at: DateTime<Utc>, collection_name: &str) -> String {
    let slug = slugify(collection_name);
    let slug = if slug.is_empty() { "run".to_string() } else { slug };
    format!("{}_{}", started_at.format(STAMP_FORMAT), slug)
}

/// First `<stem>.json`, `<stem>-2.json`, `<stem>-3.json`, ... that does not
/// exist yet in `dir`.
pub fn unique_path(dir: &Path, stem: &str) -> (String, PathBuf) {
    let first = dir.join(format!("{stem}.json"));
    if !first.exists() {
        return (stem.to_string(), first);
    }
    let mut suffix = 2u32;
    loop {
        let candidate_stem = format!("{stem}-{suffix}");
        let candidate = dir.join(format!("{candidate_stem}.json"));
        if !candidate.exists() {
            return (candidate_stem, candidate);
        }
        suffix += 1;
    }
}
