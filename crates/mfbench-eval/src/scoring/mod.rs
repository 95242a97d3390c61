//! Scoring engine
//!
//! Task-specific metrics: exact letter match for MCQ, a heuristic quality score for QA, and
//! BLEU for code summaries.

mod bleu;
mod mcq;
mod qa;
mod summary;

pub use bleu::{BleuReport, BleuStats, MAX_ORDER, sentence_bleu, tokenize_13a};
pub use mcq::{McqScore, extract_choice, score_mcq};
pub use qa::{QaQualityPolicy, score_qa};
pub use summary::extract_summary;

use crate::sanitize::Sanitizer;
use crate::tasks::TestItem;

/// Score of one response
#[derive(Debug, Clone, PartialEq)]
pub struct ItemScore {
    /// What was compared against the reference (letter, answer text or extracted summary)
    pub predicted: String,
    pub score: f64,
    /// Set for multiple-choice items only
    pub is_correct: Option<bool>,
}

/// Dispatches a response to the metric for its item kind
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    sanitizer: Sanitizer,
    qa_policy: QaQualityPolicy,
}

impl Scorer {
    pub fn new(sanitizer: Sanitizer, qa_policy: QaQualityPolicy) -> Self {
        Self {
            sanitizer,
            qa_policy,
        }
    }

    pub fn score(&self, item: &TestItem, response: &str) -> ItemScore {
        match item {
            TestItem::Mcq(item) => {
                let result = score_mcq(response, item.answer);
                ItemScore {
                    predicted: result.predicted_text(),
                    score: result.score(),
                    is_correct: Some(result.correct),
                }
            }
            TestItem::Qa(item) => ItemScore {
                predicted: response.to_string(),
                score: self.qa_policy.score(response, &item.answer),
                is_correct: None,
            },
            TestItem::Code(item) => {
                let summary = extract_summary(response, &self.sanitizer);
                let score = sentence_bleu(&summary, &item.summary);
                ItemScore {
                    predicted: summary,
                    score,
                    is_correct: None,
                }
            }
        }
    }
}
