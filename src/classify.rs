//! Prompt classification: coding question or free-form question.
//!
//! The decision drives the whole question flow (voice capture versus
//! code editor), so it has to be deterministic: a case-insensitive
//! substring match against a configurable keyword list. Anything that
//! matches nothing is treated as free-form.

use codesage_types::QuestionKind;

pub fn classify_prompt(question: &str, keywords: &[String]) -> QuestionKind {
    let normalized = question.to_lowercase();
    if keywords
        .iter()
        .any(|keyword| normalized.contains(keyword.as_str()))
    {
        QuestionKind::Coding
    } else {
        QuestionKind::FreeForm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CODING_KEYWORDS;

    fn default_keywords() -> Vec<String> {
        DEFAULT_CODING_KEYWORDS.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn coding_prompts_are_detected() {
        let keywords = default_keywords();
        for prompt in [
            "Write a function that reverses a linked list.",
            "Given an array of integers, return the two that sum to a target.",
            "Implement LRU cache eviction.",
            "What is the time complexity of your approach? Implement it.",
        ] {
            assert_eq!(
                classify_prompt(prompt, &keywords),
                QuestionKind::Coding,
                "expected coding classification for {prompt:?}"
            );
        }
    }

    #[test]
    fn conversational_prompts_stay_free_form() {
        let keywords = default_keywords();
        for prompt in [
            "Can you introduce yourself?",
            "Tell me about a project you are proud of.",
            "How would you explain normalization to a junior engineer?",
        ] {
            assert_eq!(classify_prompt(prompt, &keywords), QuestionKind::FreeForm);
        }
    }

    #[test]
    fn ambiguity_defaults_to_free_form() {
        assert_eq!(classify_prompt("", &default_keywords()), QuestionKind::FreeForm);
        assert_eq!(classify_prompt("Why Rust?", &[]), QuestionKind::FreeForm);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            classify_prompt("IMPLEMENT quicksort.", &default_keywords()),
            QuestionKind::Coding
        );
    }
}
