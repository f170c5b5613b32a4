//! Word/punctuation tokenizer
//!
//! A maximal run of word characters (Unicode alphanumerics or `_`) is one
//! token; every other non-whitespace character is a token of its own.
//! Offsets are byte offsets into the source string.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(text: &str) -> Vec<Token> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Token texts in order
pub fn token_texts(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(|t| t.text.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tokenize_words_and_punctuation() {
        let tokens = tokenize("Add Jane Doe to MSG_Production_East, please!");
        assert_eq!(
            token_texts(&tokens),
            vec!["Add", "Jane", "Doe", "to", "MSG_Production_East", ",", "please", "!"]
        );
        assert_eq!((tokens[1].start, tokens[1].end), (4, 8));
    }

    #[test]
    fn test_hyphen_splits_tokens() {
        let tokens = tokenize("ACL_EVIN-North");
        assert_eq!(token_texts(&tokens), vec!["ACL_EVIN", "-", "North"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
    }

    #[test]
    fn test_unicode_offsets() {
        let tokens = tokenize("José → Houston");
        assert_eq!(token_texts(&tokens), vec!["José", "→", "Houston"]);
        for token in &tokens {
            assert_eq!(&"José → Houston"[token.start..token.end], token.text);
        }
    }

    proptest! {
        #[test]
        fn test_tokens_cover_all_non_whitespace(text in "\\PC{0,64}") {
            let tokens = tokenize(&text);
            let mut cursor = 0;
            for token in &tokens {
                prop_assert!(token.start >= cursor);
                prop_assert!(token.end > token.start);
                prop_assert!(text[cursor..token.start].chars().all(char::is_whitespace));
                prop_assert_eq!(&text[token.start..token.end], token.text.as_str());
                cursor = token.end;
            }
            prop_assert!(text[cursor..].chars().all(char::is_whitespace));
        }
    }
}
