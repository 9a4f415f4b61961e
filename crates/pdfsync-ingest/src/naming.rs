//! Deterministic file names for cached documents and their CSV output

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Anything that is not a word character, dash or dot.
#[allow(clippy::expect_used)]
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-\w.]").expect("static pattern is valid"));

/// Known misspelling in some published report names.
const MISSPELLING: (&str, &str) = ("Expantions", "Expansions");

/// Turn an arbitrary string into a safe file name.
///
/// Leading and trailing whitespace is removed, inner spaces become underscores, and
/// anything that is not alphanumeric, `-`, `_` or `.` is dropped.
pub fn sanitize_filename(raw: &str) -> String {
    let spaced = raw.trim().replace(' ', "_");
    DISALLOWED.replace_all(&spaced, "").into_owned()
}

/// Cache file name for `url`, taken from its last path segment.
///
/// The segment is percent-decoded before sanitizing, so `Report%20(final).pdf`
/// and `Report (final).pdf` both give `Report_final.pdf`. Returns `None` when
/// nothing usable is left.
pub fn cache_filename(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let name = sanitize_filename(&decoded);
    if name.is_empty() || name.chars().all(|c| c == '.') {
        None
    } else {
        Some(name)
    }
}

/// Output file name for a cached document: extension swapped to `.csv` and the
/// known misspelling corrected.
pub fn output_filename(source: &Path) -> Option<String> {
    let stem = source.file_stem()?.to_str()?;
    let name = format!("{}.csv", stem);

    if name.contains(MISSPELLING.0) {
        Some(name.replace(MISSPELLING.0, MISSPELLING.1))
    } else {
        Some(name)
    }
}
