use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches every character that is not allowed in a point name.
static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_.\-~]").unwrap());

/// Replaces every character outside of `[A-Za-z0-9_.\-~]` with an underscore.
///
/// Returns the input unchanged, without allocating, if it contains only valid characters.
///
/// # Example
///
/// ```
/// assert_eq!(tally_reporter::sanitize("my metric/name"), "my_metric_name");
/// ```
pub fn sanitize(name: &str) -> Cow<'_, str> {
    INVALID_CHARS.replace_all(name, "_")
}
