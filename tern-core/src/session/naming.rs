//! Display-name derivation for sessions.

const MAX_NAME_WORDS: usize = 10;
const MAX_NAME_CHARS: usize = 100;
const FALLBACK_NAME: &str = "New session";

/// Derive a display name from the first user message: the first ten
/// whitespace-separated words, with an ellipsis when the message was longer,
/// hard-capped at one hundred characters.
pub fn derive_session_name(message: &str) -> String {
    let words: Vec<&str> = message.split_whitespace().collect();
    if words.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    let mut name = words
        .iter()
        .take(MAX_NAME_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > MAX_NAME_WORDS {
        name.push_str("...");
    }
    if name.chars().count() > MAX_NAME_CHARS {
        name = name.chars().take(MAX_NAME_CHARS - 3).collect::<String>() + "...";
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_message_keeps_ten_words_and_marks_the_cut() {
        let name = derive_session_name(
            "Hello build me a small CLI tool for parsing web server logs",
        );
        assert_eq!(name, "Hello build me a small CLI tool for parsing web...");
    }

    #[test]
    fn short_message_is_used_whole() {
        assert_eq!(derive_session_name("Fix the tests"), "Fix the tests");
    }

    #[test]
    fn whitespace_only_gets_the_fallback() {
        assert_eq!(derive_session_name("   \n\t "), FALLBACK_NAME);
    }

    #[test]
    fn very_long_words_are_capped_at_one_hundred_chars() {
        let message = "a".repeat(300);
        let name = derive_session_name(&message);
        assert_eq!(name.chars().count(), 100);
        assert!(name.ends_with("..."));
    }

    #[test]
    fn exactly_ten_words_gets_no_ellipsis() {
        let name = derive_session_name("one two three four five six seven eight nine ten");
        assert_eq!(name, "one two three four five six seven eight nine ten");
    }
}
