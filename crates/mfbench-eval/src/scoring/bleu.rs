//! Corpus BLEU, computed by two independent algorithms
//!
//! The primary algorithm is classic unsmoothed corpus BLEU (geometric mean of clipped
//! n-gram precisions times the brevity penalty). The validation algorithm works in the log
//! domain with exponential smoothing of zero-match orders, as mteval does. Both share the
//! 13a tokenizer and report on a 0-1 scale. They agree whenever every n-gram order has at
//! least one match and are never averaged.
//!
//! Orders with no candidate n-grams in the whole corpus are left out of the mean (effective
//! order), so a corpus of short outputs identical to its references still scores 1.0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Highest n-gram order
pub const MAX_ORDER: usize = 4;

/// Tokenize like the mteval 13a tokenizer
pub fn tokenize_13a(text: &str) -> Vec<String> {
    let text = text
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    let chars: Vec<char> = text.chars().collect();
    let mut spaced = String::with_capacity(text.len() * 2);

    for (i, &c) in chars.iter().enumerate() {
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());

        let split = match c {
            '.' | ',' => !(prev_digit && next_digit),
            '-' => prev_digit,
            _ => is_13a_symbol(c),
        };

        if split {
            spaced.push(' ');
            spaced.push(c);
            spaced.push(' ');
        } else {
            spaced.push(c);
        }
    }

    spaced.split_whitespace().map(str::to_string).collect()
}

fn is_13a_symbol(c: char) -> bool {
    matches!(c,
        '{'..='~' | '['..='`' | '!'..='&' | '('..='+' | ':'..='@' | '/')
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

/// Sufficient statistics for corpus BLEU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleuStats {
    /// Clipped n-gram matches per order
    pub matches: [usize; MAX_ORDER],
    /// Candidate n-grams per order
    pub possible: [usize; MAX_ORDER],
    pub translation_length: usize,
    pub reference_length: usize,
}

impl BleuStats {
    /// Accumulate one prediction/reference pair
    pub fn add_pair(&mut self, prediction: &str, reference: &str) {
        let hyp = tokenize_13a(prediction);
        let reference = tokenize_13a(reference);

        self.translation_length += hyp.len();
        self.reference_length += reference.len();

        for n in 1..=MAX_ORDER {
            let hyp_counts = ngram_counts(&hyp, n);
            let ref_counts = ngram_counts(&reference, n);
            let clipped: usize = hyp_counts
                .iter()
                .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
                .sum();
            self.matches[n - 1] += clipped;
            self.possible[n - 1] += hyp.len().saturating_sub(n - 1);
        }
    }

    /// Statistics over a whole corpus; pairs beyond the shorter list are ignored
    pub fn from_corpus<P: AsRef<str>, R: AsRef<str>>(predictions: &[P], references: &[R]) -> Self {
        let mut stats = Self::default();
        for (prediction, reference) in predictions.iter().zip(references) {
            stats.add_pair(prediction.as_ref(), reference.as_ref());
        }
        stats
    }

    /// Number of leading orders with at least one candidate n-gram
    pub fn effective_order(&self) -> usize {
        self.possible.iter().take_while(|p| **p > 0).count()
    }

    /// Plain clipped precisions; 0 for orders without candidates
    pub fn precisions(&self) -> Vec<f64> {
        self.matches
            .iter()
            .zip(&self.possible)
            .map(|(m, p)| if *p > 0 { *m as f64 / *p as f64 } else { 0.0 })
            .collect()
    }

    pub fn length_ratio(&self) -> f64 {
        if self.reference_length == 0 {
            0.0
        } else {
            self.translation_length as f64 / self.reference_length as f64
        }
    }

    pub fn brevity_penalty(&self) -> f64 {
        if self.translation_length == 0 {
            return 0.0;
        }
        let ratio = self.length_ratio();
        if ratio > 1.0 || self.reference_length == 0 {
            1.0
        } else {
            (1.0 - 1.0 / ratio).exp()
        }
    }

    /// Classic corpus BLEU without smoothing
    pub fn primary_bleu(&self) -> f64 {
        let order = self.effective_order();
        if order == 0 {
            return 0.0;
        }

        let precisions = self.precisions();
        let used = &precisions[..order];
        if used.iter().any(|p| *p <= 0.0) {
            return 0.0;
        }

        let geo_mean = (used.iter().map(|p| p.ln()).sum::<f64>() / order as f64).exp();
        geo_mean * self.brevity_penalty()
    }

    /// Log-domain BLEU with exponential smoothing of zero-match orders
    pub fn validation_bleu(&self) -> f64 {
        if self.translation_length == 0 {
            return 0.0;
        }

        let mut log_sum = 0.0;
        let mut smooth = 1.0;
        let mut order = 0;

        for n in 0..MAX_ORDER {
            let possible = self.possible[n];
            if possible == 0 {
                break;
            }
            order += 1;

            let log_precision = if self.matches[n] == 0 {
                smooth *= 2.0;
                -(smooth * possible as f64).ln()
            } else {
                (self.matches[n] as f64).ln() - (possible as f64).ln()
            };
            log_sum += log_precision;
        }

        if order == 0 {
            return 0.0;
        }

        let log_bp = if self.translation_length < self.reference_length {
            1.0 - self.reference_length as f64 / self.translation_length as f64
        } else {
            0.0
        };

        (log_bp + log_sum / order as f64).exp()
    }
}

/// Full BLEU result for a corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BleuReport {
    /// Unsmoothed corpus BLEU, the reported score
    pub bleu: f64,

    /// Smoothed log-domain corpus BLEU, for cross-validation only
    pub bleu_validation: f64,

    /// Clipped precision per order (1..=4)
    pub precisions: Vec<f64>,

    pub brevity_penalty: f64,
    pub length_ratio: f64,
    pub translation_length: usize,
    pub reference_length: usize,

    /// Orders that took part in the geometric mean
    #[serde(default)]
    pub effective_order: usize,
}

impl BleuReport {
    /// Compute both algorithms over the same corpus
    pub fn compute<P: AsRef<str>, R: AsRef<str>>(predictions: &[P], references: &[R]) -> Self {
        if predictions.iter().all(|p| p.as_ref().trim().is_empty()) {
            return Self {
                precisions: vec![0.0; MAX_ORDER],
                ..Default::default()
            };
        }
        Self::from_stats(&BleuStats::from_corpus(predictions, references))
    }

    pub fn from_stats(stats: &BleuStats) -> Self {
        Self {
            bleu: stats.primary_bleu(),
            bleu_validation: stats.validation_bleu(),
            precisions: stats.precisions(),
            brevity_penalty: stats.brevity_penalty(),
            length_ratio: stats.length_ratio(),
            translation_length: stats.translation_length,
            reference_length: stats.reference_length,
            effective_order: stats.effective_order(),
        }
    }

    /// Absolute difference between the two algorithms
    pub fn divergence(&self) -> f64 {
        (self.bleu - self.bleu_validation).abs()
    }
}

/// Sentence-level BLEU of one pair, using the smoothed algorithm
pub fn sentence_bleu(prediction: &str, reference: &str) -> f64 {
    if prediction.trim().is_empty() {
        return 0.0;
    }
    let mut stats = BleuStats::default();
    stats.add_pair(prediction, reference);
    stats.validation_bleu()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCES: [&str; 3] = [
        "This program reads customer records and writes a summary report.",
        "The paragraph computes the monthly interest for each account.",
        "It validates the input file and moves valid records to the output file.",
    ];

    #[test]
    fn test_tokenizer_splits_punctuation_but_not_numbers() {
        assert_eq!(
            tokenize_13a("Hello, world. Total is 3.5 (approx)!"),
            vec!["Hello", ",", "world", ".", "Total", "is", "3.5", "(", "approx", ")", "!"]
        );
        assert_eq!(tokenize_13a("WS-TOTAL 10-20"), vec!["WS-TOTAL", "10", "-", "20"]);
        assert!(tokenize_13a("   ").is_empty());
    }

    #[test]
    fn test_identical_corpus_scores_one_on_both() {
        let report = BleuReport::compute(&REFERENCES, &REFERENCES);
        assert!((report.bleu - 1.0).abs() < 1e-12);
        assert!((report.bleu_validation - 1.0).abs() < 1e-12);
        assert_eq!(report.brevity_penalty, 1.0);
        assert_eq!(report.translation_length, report.reference_length);
        assert_eq!(report.precisions, vec![1.0; 4]);
    }

    #[test]
    fn test_short_identical_outputs_use_effective_order() {
        let refs = ["MOVE A", "ADD B"];
        let report = BleuReport::compute(&refs, &refs);
        assert_eq!(report.effective_order, 2);
        assert!((report.bleu - 1.0).abs() < 1e-12);
        assert!((report.bleu_validation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_shared_ngrams_is_near_zero() {
        let predictions = ["zebra quantum violin", "orbit lantern marble", "cactus velvet"];
        let report = BleuReport::compute(&predictions, &REFERENCES);
        assert_eq!(report.bleu, 0.0);
        assert!(report.bleu_validation < 0.05);
    }

    #[test]
    fn test_empty_predictions_score_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(BleuReport::compute(&empty, &empty).bleu, 0.0);

        let blanks = ["", "  ", ""];
        let report = BleuReport::compute(&blanks, &REFERENCES);
        assert_eq!(report.bleu, 0.0);
        assert_eq!(report.bleu_validation, 0.0);
    }

    #[test]
    fn test_algorithms_agree_when_all_orders_match() {
        let predictions = [
            "This program reads customer records and writes a report.",
            "The paragraph computes monthly interest for each account.",
            "It validates the input file and moves records to the output file.",
        ];
        let report = BleuReport::compute(&predictions, &REFERENCES);
        assert!(report.bleu > 0.3 && report.bleu < 1.0);
        assert!(report.brevity_penalty < 1.0);
        assert!(report.divergence() < 1e-9);
    }

    #[test]
    fn test_algorithms_diverge_within_tolerance_with_sparse_matches() {
        let predictions = ["reads customer data", "computes interest", "validates input"];
        let report = BleuReport::compute(&predictions, &REFERENCES);
        // no 3-gram matches: primary collapses to 0, smoothing keeps validation small
        assert_eq!(report.bleu, 0.0);
        assert!(report.divergence() < 0.1);
    }

    #[test]
    fn test_brevity_penalty() {
        let stats = BleuStats::from_corpus(&["a b"], &["a b c d"]);
        assert!((stats.brevity_penalty() - (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(stats.length_ratio(), 0.5);
    }

    #[test]
    fn test_sentence_bleu() {
        assert_eq!(sentence_bleu("", REFERENCES[0]), 0.0);
        assert!((sentence_bleu(REFERENCES[1], REFERENCES[1]) - 1.0).abs() < 1e-12);
    }
}
