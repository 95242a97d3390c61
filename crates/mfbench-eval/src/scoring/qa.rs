//! Heuristic quality score for open-form answers
//!
//! This is a cheap proxy, not a semantic judgement: it rewards vocabulary shared with the
//! reference, answers at least as long as the reference, and answers of reasonable size.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Weights of the QA quality heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaQualityPolicy {
    /// Weight of the reference-vocabulary overlap ratio
    #[serde(default = "default_overlap_weight")]
    pub overlap_weight: f64,

    /// Weight of the (capped) response/reference length ratio
    #[serde(default = "default_length_weight")]
    pub length_weight: f64,

    /// Flat bonus for a sufficiently long response
    #[serde(default = "default_completeness_bonus")]
    pub completeness_bonus: f64,

    /// Word count that earns the bonus
    #[serde(default = "default_completeness_min_words")]
    pub completeness_min_words: usize,
}

fn default_overlap_weight() -> f64 {
    0.6
}

fn default_length_weight() -> f64 {
    0.3
}

fn default_completeness_bonus() -> f64 {
    0.1
}

fn default_completeness_min_words() -> usize {
    20
}

impl Default for QaQualityPolicy {
    fn default() -> Self {
        Self {
            overlap_weight: default_overlap_weight(),
            length_weight: default_length_weight(),
            completeness_bonus: default_completeness_bonus(),
            completeness_min_words: default_completeness_min_words(),
        }
    }
}

impl QaQualityPolicy {
    /// Weights must be finite and non-negative
    pub fn validate(&self) -> BenchResult<()> {
        for (name, value) in [
            ("overlap_weight", self.overlap_weight),
            ("length_weight", self.length_weight),
            ("completeness_bonus", self.completeness_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BenchError::config(format!(
                    "scoring.qa.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Score a response against a reference answer, in [0, 1]
    pub fn score(&self, response: &str, reference: &str) -> f64 {
        if response.is_empty() || reference.is_empty() {
            return 0.0;
        }

        let response_lower = response.to_lowercase();
        let reference_lower = reference.to_lowercase();
        let response_words: HashSet<&str> = response_lower.split_whitespace().collect();
        let reference_words: HashSet<&str> = reference_lower.split_whitespace().collect();

        if reference_words.is_empty() {
            return 0.0;
        }

        let overlap = response_words.intersection(&reference_words).count() as f64
            / reference_words.len() as f64;

        let response_count = response.split_whitespace().count();
        let reference_count = reference.split_whitespace().count();
        let length_ratio = (response_count as f64 / reference_count as f64).min(1.0);

        let bonus = if response_count >= self.completeness_min_words {
            self.completeness_bonus
        } else {
            0.0
        };

        (overlap * self.overlap_weight + length_ratio * self.length_weight + bonus).min(1.0)
    }
}

/// Score with the default weights
pub fn score_qa(response: &str, reference: &str) -> f64 {
    QaQualityPolicy::default().score(response, reference)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn words() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,6}", 0..30)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_score_is_in_unit_interval(response in words(), reference in words()) {
            let score = score_qa(&response.join(" "), &reference.join(" "));
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_appending_a_word_never_lowers_score(
            response in words(),
            reference in words(),
            extra in "[a-z]{1,6}",
        ) {
            let before = score_qa(&response.join(" "), &reference.join(" "));
            let mut longer = response.clone();
            longer.push(extra);
            let after = score_qa(&longer.join(" "), &reference.join(" "));
            prop_assert!(after >= before);
        }

        #[test]
        fn prop_more_overlap_never_lowers_score(reference in prop::collection::vec("[a-z]{1,6}", 1..20), k in 0usize..20) {
            // same word count, increasing number of reference words
            let n = reference.len();
            let k = k.min(n);
            let mut fewer: Vec<String> = reference[..k].to_vec();
            fewer.extend(std::iter::repeat_n("zzzzzzz".to_string(), n - k));
            let all = reference.clone();

            let low = score_qa(&fewer.join(" "), &reference.join(" "));
            let high = score_qa(&all.join(" "), &reference.join(" "));
            prop_assert!(high >= low);
        }
    }
}
