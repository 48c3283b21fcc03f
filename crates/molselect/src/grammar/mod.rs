//! Grammar assembly
//!
//! The grammar template carries five placeholders. The first four receive
//! the macro and keyword token blocks and their category alternations; the
//! fallback token is computed from the text produced by those four and
//! substituted last.

pub mod fallback;
pub mod tokens;

pub use fallback::FallbackPattern;
pub use tokens::{make_token_block, terminal_name, TokenBlock, KEYWORD_PREFIX, MACRO_PREFIX};

use crate::config::TokenTable;
use crate::error::GrammarError;

pub const MACROS_MARKER: &str = "<<MACROS>>";
pub const MACROS_NAMES_MARKER: &str = "<<MACROS_NAMES>>";
pub const KEYWORDS_MARKER: &str = "<<KEYWORDS>>";
pub const KEYWORDS_NAMES_MARKER: &str = "<<KEYWORDS_NAMES>>";
pub const LAST_TOKEN_MARKER: &str = "<<LAST_TOKEN>>";

/// Final grammar text plus the fallback token it embeds
#[derive(Debug, Clone)]
pub struct AssembledGrammar {
    pub text: String,
    pub fallback: FallbackPattern,
}

/// Substitute the token tables into the template
pub fn assemble(
    template: &str,
    macros: &TokenTable,
    keywords: &TokenTable,
) -> Result<AssembledGrammar, GrammarError> {
    for marker in [
        MACROS_MARKER,
        MACROS_NAMES_MARKER,
        KEYWORDS_MARKER,
        KEYWORDS_NAMES_MARKER,
        LAST_TOKEN_MARKER,
    ] {
        let count = template.matches(marker).count();
        if count != 1 {
            return Err(GrammarError::Placeholder { marker, count });
        }
    }

    let macro_block = make_token_block(macros, MACRO_PREFIX);
    let keyword_block = make_token_block(keywords, KEYWORD_PREFIX);

    let interim = template
        .replace(MACROS_MARKER, &macro_block.text)
        .replace(MACROS_NAMES_MARKER, &macro_block.names)
        .replace(KEYWORDS_MARKER, &keyword_block.text)
        .replace(KEYWORDS_NAMES_MARKER, &keyword_block.names);

    let fallback = FallbackPattern::from_grammar(&interim)?;
    let text = interim.replace(LAST_TOKEN_MARKER, &fallback.render());

    Ok(AssembledGrammar { text, fallback })
}

/// Remove `//` comments, leaving string and regex literals intact
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| &line[..comment_start(line).unwrap_or(line.len())])
        .collect::<Vec<_>>()
        .join("\n")
}

fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_delimited(bytes, i, b'"'),
            b'/' if bytes.get(i + 1) == Some(&b'/') => return Some(i),
            b'/' => i = skip_delimited(bytes, i, b'/'),
            _ => i += 1,
        }
    }
    None
}

/// Index just past the closing delimiter of a literal opened at `start`
fn skip_delimited(bytes: &[u8], start: usize, close: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == close => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Unescaped contents of every `"..."` literal, skipping `/regex/` bodies
pub fn string_literals(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = skip_delimited(bytes, i, b'"');
                if end > i + 1 && bytes[end - 1] == b'"' {
                    let literal = unescape_string(&body[i + 1..end - 1]);
                    if !literal.is_empty() {
                        out.push(literal);
                    }
                }
                i = end;
            }
            b'/' => i = skip_delimited(bytes, i, b'/'),
            _ => i += 1,
        }
    }
    out
}

/// Resolve `\"` and `\\` inside a string literal
pub fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionConfig;

    const TEMPLATE: &str = "start: x\nx: bool_keyword | selection_keyword | VALUE\nbool_keyword: <<MACROS_NAMES>>\nselection_keyword: <<KEYWORDS_NAMES>>\n<<MACROS>>\n<<KEYWORDS>>\nVALUE : <<LAST_TOKEN>>\n";

    #[test]
    fn test_assemble_substitutes_every_marker() {
        let macros = TokenTable::from_json_str(
            r#"{"macros": {"bio": {"water": {"synonyms": ["waters"]}}}}"#,
            "macros",
        )
        .unwrap();
        let keywords = TokenTable::from_json_str(
            r#"{"keywords": {"atom": {"name": {}}}}"#,
            "keywords",
        )
        .unwrap();

        let grammar = assemble(TEMPLATE, &macros, &keywords).unwrap();
        assert!(!grammar.text.contains("<<"));
        assert!(grammar.text.contains("bool_keyword: bool_bio\n"));
        assert!(grammar.text.contains("selection_keyword: select_atom\n"));
        assert!(grammar.text.contains("WATER : \"water\" | \"waters\""));
        assert_eq!(grammar.fallback.reserved(), ["water", "waters", "name"]);
        assert!(grammar.text.contains(&format!("VALUE : {}", grammar.fallback.render())));
    }

    #[test]
    fn test_missing_placeholder() {
        let template = TEMPLATE.replace("<<LAST_TOKEN>>", "/x/");
        let err = assemble(&template, &TokenTable::new(), &TokenTable::new()).unwrap_err();
        assert_eq!(
            err,
            GrammarError::Placeholder {
                marker: LAST_TOKEN_MARKER,
                count: 0
            }
        );
    }

    #[test]
    fn test_duplicated_placeholder() {
        let template = format!("{TEMPLATE}<<MACROS>>\n");
        let err = assemble(&template, &TokenTable::new(), &TokenTable::new()).unwrap_err();
        assert!(matches!(err, GrammarError::Placeholder { count: 2, .. }));
    }

    #[test]
    fn test_embedded_grammar_reserves_operator_words() {
        let config = SelectionConfig::embedded().unwrap();
        let grammar = assemble(&config.grammar_template, &config.macros, &config.keywords).unwrap();
        let reserved = grammar.fallback.reserved();
        for word in ["and", "or", "within", "protein", "resname", "//"] {
            assert!(reserved.iter().any(|r| r == word), "{word} should be reserved");
        }
        assert_eq!(grammar.fallback.match_len("HOH"), Some(3));
        assert_eq!(grammar.fallback.match_len("water"), None);
    }

    #[test]
    fn test_strip_comments_respects_literals() {
        let text = "_DSLASH : \"//\" // floor division\nR : /a\\/b/ // regex";
        assert_eq!(strip_comments(text), "_DSLASH : \"//\" \nR : /a\\/b/ ");
    }

    #[test]
    fn test_string_literals_skip_regex() {
        let literals = string_literals(r#""a" | /"[^"]*"/ | "b\"c""#);
        assert_eq!(literals, ["a", "b\"c"]);
    }
}
