//! Post-processing for LLM-generated text
//!
//! Generative models occasionally echo prompt scaffolding ("Assistant:",
//! "Here is the translation:") or bullet lists. Replies are spoken aloud, so
//! these are stripped and the number of questions per reply is capped.

use regex::Regex;
use std::sync::OnceLock;

const LEAKED_PREFIXES: &[&str] = &[
    r"(?i)^\s*(assistant|ai|agent|you)\s*:\s*",
    r"(?i)(here\s+is|here's)\s+the\s+translation\s*:?\s*",
    r"(?i)the\s+translation\s+is\s*:?\s*",
    r"(?i)(colloquial\s+)?tamil\s+translation\s*:\s*",
    r"(?i)^\s*translation\s*:\s*",
];

fn leaked_prefixes() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        LEAKED_PREFIXES
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

fn sentence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[^.!?।]+[.!?।]*").ok())
        .as_ref()
}

const TRIM_CHARS: &[char] = &[':', '-', '"', '\'', ' ', '\n', '\t', '*'];

/// Strip leaked prompt fragments and list formatting, joining what remains onto one line
pub fn clean_generated_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in leaked_prefixes() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    let lines: Vec<&str> = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with(['*', '-', '•', '#']))
        .collect();

    if lines.is_empty() {
        return text.trim().to_string();
    }
    lines.join(" ").trim_matches(TRIM_CHARS).to_string()
}

/// Keep statements and the first `max_questions` questions, in order
pub fn limit_questions(text: &str, max_questions: usize) -> String {
    let Some(pattern) = sentence_pattern() else {
        return text.to_string();
    };

    let mut kept = Vec::new();
    let mut questions = 0usize;
    for sentence in pattern.find_iter(text).map(|m| m.as_str().trim()) {
        if sentence.is_empty() {
            continue;
        }
        if sentence.ends_with('?') {
            if questions >= max_questions {
                continue;
            }
            questions += 1;
        }
        kept.push(sentence);
    }

    if kept.is_empty() {
        text.trim().to_string()
    } else {
        kept.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_role_prefixes() {
        assert_eq!(clean_generated_text("Assistant: வணக்கம்!"), "வணக்கம்!");
    }

    #[test]
    fn strips_translation_scaffolding() {
        assert_eq!(
            clean_generated_text("Here is the translation: \"மருந்து சாப்ட்டீங்களா?\""),
            "மருந்து சாப்ட்டீங்களா?"
        );
    }

    #[test]
    fn drops_bullet_lines_and_joins_the_rest() {
        let raw = "சரி.\n* Guidelines: be warm\nPain எங்க இருக்கு?";
        assert_eq!(clean_generated_text(raw), "சரி. Pain எங்க இருக்கு?");
    }

    #[test]
    fn falls_back_to_original_when_everything_is_filtered() {
        assert_eq!(clean_generated_text("- only a bullet"), "- only a bullet");
    }

    #[test]
    fn caps_questions_but_keeps_statements() {
        let text = "Okay. Where does it hurt? Since when? How bad is it? Rest well.";
        assert_eq!(limit_questions(text, 2), "Okay. Where does it hurt? Since when? Rest well.");
    }

    #[test]
    fn handles_tamil_full_stop() {
        let text = "சரி। எப்போ start ஆச்சு? எங்க வலிக்குது? எவ்வளவு severe?";
        assert_eq!(limit_questions(text, 2), "சரி। எப்போ start ஆச்சு? எங்க வலிக்குது?");
    }
}
