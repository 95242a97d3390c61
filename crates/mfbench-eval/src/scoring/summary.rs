//! Summary extraction from free-form model output

use crate::sanitize::Sanitizer;

/// Strip code fences, heading/comment lines and blank lines, then join the rest with
/// single spaces and sanitize.
pub fn extract_summary(response: &str, sanitizer: &Sanitizer) -> String {
    if response.is_empty() {
        return String::new();
    }

    let joined = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
        .collect::<Vec<_>>()
        .join(" ");

    sanitizer.sanitize(&joined)
}
