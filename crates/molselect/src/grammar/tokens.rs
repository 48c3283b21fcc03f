//! Token table compiler
//!
//! Turns a [`TokenTable`] into grammar text: one terminal per visible entry
//! (`PROTEIN : "protein" | "prot"`), one inline alternation rule per
//! category (`?bool_biomolecule: PROTEIN | NUCLEIC`), and the `|`-joined list
//! of those category rules for the generic "any macro"/"any keyword" rules.

use crate::config::{is_hidden, TokenEntry, TokenTable};

/// Rule-name prefix for macro categories
pub const MACRO_PREFIX: &str = "bool";
/// Rule-name prefix for keyword categories
pub const KEYWORD_PREFIX: &str = "select";

/// Generated grammar fragments for one token table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBlock {
    /// Terminal and category rules, grouped under `// category` headers
    pub text: String,
    /// Category rule names joined with `" | "`
    pub names: String,
    /// Terminal name for every spelling, in emission order
    pub terminals: Vec<(String, String)>,
}

/// Compile a token table into grammar fragments
pub fn make_token_block(table: &TokenTable, prefix: &str) -> TokenBlock {
    let mut lines: Vec<String> = Vec::new();
    let mut category_rules = Vec::new();
    let mut terminals = Vec::new();

    for (category_name, category) in &table.categories {
        lines.push(String::new());
        lines.push(format!("// {}", category_name));

        let mut emitted = Vec::new();
        for (name, entry) in &category.entries {
            if is_hidden(name) {
                continue;
            }
            let terminal = terminal_name(name);
            lines.push(format!("{} : {}", terminal, rule_body(name, entry)));
            terminals.push((name.clone(), terminal.clone()));
            emitted.push(terminal);
        }

        if emitted.is_empty() {
            // Drop the orphaned blank line and header
            lines.truncate(lines.len() - 2);
            continue;
        }

        let rule = format!("{}_{}", prefix, rule_suffix(category_name));
        lines.push(format!("?{}: {}", rule, emitted.join(" | ")));
        category_rules.push(rule);
    }

    TokenBlock {
        text: lines.join("\n"),
        names: category_rules.join(" | "),
        terminals,
    }
}

fn rule_body(name: &str, entry: &TokenEntry) -> String {
    entry
        .spellings(name)
        .map(|spelling| match entry.regex_substitution.get(spelling) {
            Some(pattern) => format!("/{}/", pattern.replace('/', r"\/")),
            None => format!("\"{}\"", escape_literal(spelling)),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Upper-cased terminal name for an entry, restricted to `[A-Z0-9_]`
pub fn terminal_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'K');
    }
    out
}

fn rule_suffix(category: &str) -> String {
    category
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn escape_literal(text: &str) -> String {
    text.replace('\\', r"\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(json: &str) -> TokenTable {
        TokenTable::from_json_str(json, "macros").unwrap()
    }

    #[test]
    fn test_block_with_synonyms() {
        let block = make_token_block(
            &table(r#"{"macros": {"biomolecule": {"protein": {"synonyms": ["prot"]}, "water": {}}}}"#),
            MACRO_PREFIX,
        );
        assert_eq!(
            block.text,
            "\n// biomolecule\nPROTEIN : \"protein\" | \"prot\"\nWATER : \"water\"\n?bool_biomolecule: PROTEIN | WATER"
        );
        assert_eq!(block.names, "bool_biomolecule");
    }

    #[test]
    fn test_regex_substitution_replaces_literal() {
        let block = make_token_block(
            &table(r#"{"macros": {"chain": {"segname": {"synonyms": ["segid"], "regex_substitution": {"segid": "seg[iI][dD]"}}}}}"#),
            KEYWORD_PREFIX,
        );
        assert!(block.text.contains(r#"SEGNAME : "segname" | /seg[iI][dD]/"#));
        assert_eq!(block.names, "select_chain");
    }

    #[test]
    fn test_hidden_only_category_leaves_no_header() {
        let block = make_token_block(
            &table(r#"{"macros": {"internal": {"_ions": {"definition": "resname NA"}}, "solvent": {"solvent": {}}}}"#),
            MACRO_PREFIX,
        );
        assert!(!block.text.contains("internal"));
        assert_eq!(block.names, "bool_solvent");
        assert_eq!(block.terminals, vec![("solvent".to_string(), "SOLVENT".to_string())]);
    }

    #[test]
    fn test_empty_table() {
        let block = make_token_block(&TokenTable::new(), MACRO_PREFIX);
        assert_eq!(block.text, "");
        assert_eq!(block.names, "");
    }

    #[test]
    fn test_terminal_name_sanitized() {
        assert_eq!(terminal_name("res-name"), "RES_NAME");
        assert_eq!(terminal_name("3ten"), "K3TEN");
    }
}
