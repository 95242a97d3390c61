//! Prompt sanitization
//!
//! Every prompt sent to the model process goes through [`Sanitizer::sanitize`]. The prompt is
//! delivered on stdin and never assembled into a command line, so the length bound is what
//! actually protects the child process; the character filter is a second layer.

use tracing::debug;

/// Default upper bound on prompt length, in characters
pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 2000;

/// Characters that are deleted from every prompt
pub const FORBIDDEN_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>', '"', '\'', '\\', '\n', '\r',
    '\t',
];

/// Strips unsafe characters and bounds prompt length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sanitizer {
    max_length: usize,
}

impl Sanitizer {
    /// Create a sanitizer with the given maximum length in characters
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Maximum output length in characters
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Check whether a character is removed by sanitization
    pub fn is_forbidden(c: char) -> bool {
        FORBIDDEN_CHARS.contains(&c)
    }

    /// Remove forbidden characters, truncate to the bound and trim whitespace.
    ///
    /// Never fails; the result may be empty.
    pub fn sanitize(&self, text: &str) -> String {
        let cleaned: String = text
            .chars()
            .filter(|c| !Self::is_forbidden(*c))
            .take(self.max_length)
            .collect();
        cleaned.trim().to_string()
    }

    /// Sanitize raw bytes. Input that is not valid UTF-8 yields an empty string.
    pub fn sanitize_bytes(&self, bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.sanitize(text),
            Err(e) => {
                debug!(error = %e, "Discarding non UTF-8 prompt input");
                String::new()
            }
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROMPT_LENGTH)
    }
}

/// Sanitize with the default policy
pub fn sanitize(text: &str) -> String {
    Sanitizer::default().sanitize(text)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn mixed_text() -> impl Strategy<Value = String> {
        let forbidden: Vec<char> = FORBIDDEN_CHARS.to_vec();
        prop::collection::vec(
            prop_oneof![
                prop::sample::select(forbidden),
                any::<char>(),
                Just(' '),
            ],
            0..4000,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_output_is_bounded_and_clean(text in mixed_text(), bound in 0usize..2500) {
            let output = Sanitizer::new(bound).sanitize(&text);
            prop_assert!(output.chars().count() <= bound);
            prop_assert!(!output.chars().any(Sanitizer::is_forbidden));
        }

        #[test]
        fn prop_sanitize_is_idempotent(text in mixed_text()) {
            let sanitizer = Sanitizer::default();
            let once = sanitizer.sanitize(&text);
            prop_assert_eq!(sanitizer.sanitize(&once), once.clone());
        }

        #[test]
        fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let output = Sanitizer::default().sanitize_bytes(&bytes);
            prop_assert!(!output.chars().any(Sanitizer::is_forbidden));
        }
    }
}
