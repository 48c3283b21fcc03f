//! Fallback bare-word token
//!
//! Free-form property values (residue names, chain ids, atom names) are not
//! declared individually. They lex through one fallback terminal that
//! accepts any word which is not a reserved literal of the grammar and not
//! a numeral. The pattern is written into the grammar text in its
//! lookahead form; since the `regex` crate has no lookaround, the lexer
//! runs [`FallbackPattern::match_len`] in its place.

use super::{string_literals, strip_comments};
use crate::error::GrammarError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TERMINAL_LINE: Regex = Regex::new(r"^\s*([A-Z_][A-Z0-9_]*)\s*:\s*(.+)$").unwrap();
    static ref NUMERAL: Regex = Regex::new(r"^\d+(?:\.\d*)?(?:[eE][+-]?\d+)?\b").unwrap();
    static ref WORD: Regex = Regex::new(r#"^[^()'"\s]+['*]?"#).unwrap();
}

/// The computed fallback token
#[derive(Debug, Clone)]
pub struct FallbackPattern {
    reserved: Vec<String>,
    reserved_re: Option<Regex>,
}

impl FallbackPattern {
    /// Collect reserved literals from every `UPPER : body` line
    pub fn from_grammar(text: &str) -> Result<Self, GrammarError> {
        let mut reserved: Vec<String> = Vec::new();
        for line in strip_comments(text).lines() {
            let Some(caps) = TERMINAL_LINE.captures(line) else {
                continue;
            };
            for literal in string_literals(&caps[2]) {
                if !reserved.contains(&literal) {
                    reserved.push(literal);
                }
            }
        }
        Self::new(reserved)
    }

    pub fn new(reserved: Vec<String>) -> Result<Self, GrammarError> {
        let reserved_re = if reserved.is_empty() {
            None
        } else {
            let pattern = format!(r"^(?:{})\b", alternation(&reserved));
            Some(
                Regex::new(&pattern).map_err(|e| GrammarError::InvalidPattern {
                    terminal: "<fallback>".to_string(),
                    message: e.to_string(),
                })?,
            )
        };
        Ok(Self {
            reserved,
            reserved_re,
        })
    }

    /// Reserved literals, in first-seen order
    pub fn reserved(&self) -> &[String] {
        &self.reserved
    }

    /// Pattern body as it reads after unescaping
    pub fn body(&self) -> String {
        let reserved = if self.reserved.is_empty() {
            String::new()
        } else {
            format!(r"(?!(?:{})\b)", alternation(&self.reserved))
        };
        format!(
            r#"(?!['"()]){}(?!\d+(?:\.\d*)?(?:[eE][+-]?\d+)?\b)(?=[A-Za-z_])[^()'"\s]+['*]?"#,
            reserved
        )
    }

    /// `/body/` with slashes escaped, ready for the grammar text
    pub fn render(&self) -> String {
        format!("/{}/", self.body().replace('/', r"\/"))
    }

    /// Length of the fallback token at the start of `input`
    pub fn match_len(&self, input: &str) -> Option<usize> {
        let first = input.chars().next()?;
        if matches!(first, '\'' | '"' | '(' | ')') {
            return None;
        }
        if self.reserved_re.as_ref().is_some_and(|re| re.is_match(input)) {
            return None;
        }
        if NUMERAL.is_match(input) {
            return None;
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        WORD.find(input).map(|m| m.end())
    }
}

fn alternation(words: &[String]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pattern() -> FallbackPattern {
        FallbackPattern::from_grammar(
            "_AND : \"and\"i | \"&&\"  // logical\nWITHIN : \"within\" | \"exwithin\"\nNAME : \"name\"\nQUOTED : /\"[^\"]*\"/\nrule: NAME \"ignored\"",
        )
        .unwrap()
    }

    #[test]
    fn test_reserved_collection() {
        assert_eq!(pattern().reserved(), ["and", "&&", "within", "exwithin", "name"]);
    }

    #[rstest]
    #[case("CA and", Some(2))]
    #[case("HOH)", Some(3))]
    #[case("C5' x", Some(3))]
    #[case("names", Some(5))]
    #[case("_x1", Some(3))]
    #[case("name CA", None)]
    #[case("and", None)]
    #[case("\"CA\"", None)]
    #[case("12", None)]
    #[case("1A", None)]
    #[case("-1", None)]
    #[case("", None)]
    fn test_match_len(#[case] input: &str, #[case] expected: Option<usize>) {
        assert_eq!(pattern().match_len(input), expected);
    }

    #[test]
    fn test_render_escapes_slashes() {
        let fallback = FallbackPattern::new(vec!["//".to_string(), "or".to_string()]).unwrap();
        let rendered = fallback.render();
        assert!(rendered.starts_with("/(?!['\"()])(?!(?:\\/\\/|or)\\b)"));
        assert!(rendered.ends_with("[^()'\"\\s]+['*]?/"));
        assert_eq!(rendered[1..rendered.len() - 1].replace(r"\/", "/"), fallback.body());
    }
}
