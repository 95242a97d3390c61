//! Benchmark task types
//!
//! Defines the three task kinds and the immutable test items that belong to them.

use serde::{Deserialize, Serialize};

/// Kind of benchmark task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Multiple-choice questions scored by exact letter match
    Mcq,
    /// Open-form question answering scored by the quality heuristic
    Qa,
    /// COBOL code summarization scored by BLEU
    Code,
}

impl TaskKind {
    /// Short identifier used in file names and CLI flags
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Mcq => "mcq",
            TaskKind::Qa => "qa",
            TaskKind::Code => "code",
        }
    }

    /// Dataset configuration name in MainframeBench
    pub fn dataset_name(&self) -> &'static str {
        match self {
            TaskKind::Mcq => "multiple_choice_question",
            TaskKind::Qa => "question_answering",
            TaskKind::Code => "COBOL_code_summarization",
        }
    }

    /// Get display name for this task
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskKind::Mcq => "Multiple Choice Questions",
            TaskKind::Qa => "Question Answering",
            TaskKind::Code => "Code Summarization",
        }
    }

    /// Name of the aggregate metric reported for this task
    pub fn metric_name(&self) -> &'static str {
        match self {
            TaskKind::Mcq => "accuracy",
            TaskKind::Qa => "average_quality_score",
            TaskKind::Code => "bleu",
        }
    }

    /// Get all task kinds in evaluation order
    pub fn all() -> &'static [TaskKind] {
        &[TaskKind::Mcq, TaskKind::Qa, TaskKind::Code]
    }

    /// Parse from a CLI-style identifier
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mcq" | "multiple_choice_question" => Some(TaskKind::Mcq),
            "qa" | "question_answering" => Some(TaskKind::Qa),
            "code" | "cobol_code_summarization" | "summarization" => Some(TaskKind::Code),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answer letter of a multiple-choice question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    /// Parse a single letter, case-insensitively
    pub fn from_letter(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Choice::A),
            "B" => Some(Choice::B),
            "C" => Some(Choice::C),
            "D" => Some(Choice::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
        }
    }
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqItem {
    pub id: usize,
    pub question: String,
    /// Option texts in A, B, C, D order
    pub options: [String; 4],
    pub answer: Choice,
}

/// An open-form question with a reference answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaItem {
    pub id: usize,
    pub question: String,
    pub answer: String,
}

/// A code snippet with a reference summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeItem {
    pub id: usize,
    pub code: String,
    pub summary: String,
}

/// One benchmark test item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestItem {
    Mcq(McqItem),
    Qa(QaItem),
    Code(CodeItem),
}

impl TestItem {
    /// Stable ordinal of this item within its suite
    pub fn id(&self) -> usize {
        match self {
            TestItem::Mcq(item) => item.id,
            TestItem::Qa(item) => item.id,
            TestItem::Code(item) => item.id,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TestItem::Mcq(_) => TaskKind::Mcq,
            TestItem::Qa(_) => TaskKind::Qa,
            TestItem::Code(_) => TaskKind::Code,
        }
    }

    /// Reference value as text (letter, answer or summary)
    pub fn reference(&self) -> String {
        match self {
            TestItem::Mcq(item) => item.answer.to_string(),
            TestItem::Qa(item) => item.answer.clone(),
            TestItem::Code(item) => item.summary.clone(),
        }
    }

    /// Short human-readable preview of the item
    pub fn preview(&self) -> String {
        let text = match self {
            TestItem::Mcq(item) => &item.question,
            TestItem::Qa(item) => &item.question,
            TestItem::Code(item) => &item.code,
        };
        truncate_preview(text, 100)
    }
}

/// Truncate to `max` characters, appending an ellipsis when cut
pub fn truncate_preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// A position in a suite: either a usable item or a row that was skipped at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum SuiteEntry {
    Item(TestItem),
    Skipped { id: usize, reason: String },
}

impl SuiteEntry {
    pub fn id(&self) -> usize {
        match self {
            SuiteEntry::Item(item) => item.id(),
            SuiteEntry::Skipped { id, .. } => *id,
        }
    }
}

/// Ordered, read-only sequence of entries for one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSuite {
    kind: TaskKind,
    entries: Vec<SuiteEntry>,
}

impl TaskSuite {
    /// Create a suite. Entries keep the order they are given in.
    pub fn new(kind: TaskKind, entries: Vec<SuiteEntry>) -> Self {
        Self { kind, entries }
    }

    /// Build a suite of items, assigning ordinals by position
    pub fn from_items(kind: TaskKind, items: Vec<TestItem>) -> Self {
        Self::new(kind, items.into_iter().map(SuiteEntry::Item).collect())
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn entries(&self) -> &[SuiteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries skipped at load time
    pub fn skipped_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, SuiteEntry::Skipped { .. }))
            .count()
    }

    /// Keep only the first `n` entries
    pub fn take_first(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }
}
