//! Prompt construction for each task kind

use super::{CodeItem, McqItem, QaItem, TestItem};

/// Code longer than this is cut before it is placed in a prompt
pub const MAX_CODE_CHARS: usize = 1000;

/// Build the prompt text for an item. The result still has to be sanitized.
pub fn build_prompt(item: &TestItem) -> String {
    match item {
        TestItem::Mcq(item) => mcq_prompt(item),
        TestItem::Qa(item) => qa_prompt(item),
        TestItem::Code(item) => code_prompt(item),
    }
}

fn mcq_prompt(item: &McqItem) -> String {
    format!(
        "Question: {}\nA) {}\nB) {}\nC) {}\nD) {}\n\nPlease answer with just the letter (A, B, C, or D).",
        item.question, item.options[0], item.options[1], item.options[2], item.options[3]
    )
}

fn qa_prompt(item: &QaItem) -> String {
    format!(
        "Question: {}\n\nPlease provide a comprehensive answer based on mainframe and COBOL knowledge.",
        item.question
    )
}

fn code_prompt(item: &CodeItem) -> String {
    let code: String = item.code.chars().take(MAX_CODE_CHARS).collect();
    format!(
        "Please provide a concise summary of this COBOL code:\n\n```cobol\n{}\n```\n\nProvide only the summary, no additional explanation.",
        code
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::Sanitizer;
    use crate::tasks::Choice;

    #[test]
    fn test_mcq_prompt_lists_options_in_order() {
        let item = TestItem::Mcq(McqItem {
            id: 0,
            question: "What does PIC 9 declare?".to_string(),
            options: [
                "alphanumeric".to_string(),
                "numeric".to_string(),
                "alphabetic".to_string(),
                "edited".to_string(),
            ],
            answer: Choice::B,
        });

        let prompt = build_prompt(&item);
        let a = prompt.find("A) alphanumeric").unwrap();
        let d = prompt.find("D) edited").unwrap();
        assert!(a < d);
        assert!(prompt.ends_with("(A, B, C, or D)."));
    }

    #[test]
    fn test_code_prompt_truncates_code() {
        let item = TestItem::Code(CodeItem {
            id: 0,
            code: "X".repeat(5000),
            summary: "lots of X".to_string(),
        });

        let prompt = build_prompt(&item);
        assert_eq!(prompt.matches('X').count(), MAX_CODE_CHARS);
        assert!(prompt.contains("```cobol"));
    }

    #[test]
    fn test_sanitized_prompt_is_never_empty_for_real_items() {
        let item = TestItem::Qa(QaItem {
            id: 0,
            question: "What is VSAM?".to_string(),
            answer: "Virtual Storage Access Method".to_string(),
        });

        let sanitized = Sanitizer::default().sanitize(&build_prompt(&item));
        assert!(sanitized.starts_with("Question: What is VSAM?"));
        assert!(!sanitized.contains('\n'));
    }
}
