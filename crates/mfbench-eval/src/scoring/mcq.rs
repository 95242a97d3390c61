//! Multiple-choice answer extraction

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tasks::Choice;

static CHOICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([ABCD])\b").expect("valid choice regex"));

/// First standalone A-D letter in the response, case-insensitive
pub fn extract_choice(response: &str) -> Option<Choice> {
    let upper = response.to_uppercase();
    CHOICE_RE
        .captures(&upper)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Choice::from_letter(m.as_str()))
}

/// Result of scoring one multiple-choice response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McqScore {
    pub predicted: Option<Choice>,
    pub correct: bool,
}

impl McqScore {
    pub fn score(&self) -> f64 {
        if self.correct { 1.0 } else { 0.0 }
    }

    /// Predicted letter, or empty when no answer was found
    pub fn predicted_text(&self) -> String {
        self.predicted.map(|c| c.to_string()).unwrap_or_default()
    }
}

/// Score a response against the reference letter
pub fn score_mcq(response: &str, reference: Choice) -> McqScore {
    let predicted = extract_choice(response);
    McqScore {
        predicted,
        correct: predicted == Some(reference),
    }
}
