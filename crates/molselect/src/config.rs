//! Selection configuration
//!
//! A [`SelectionConfig`] is built by the caller and handed to
//! [`crate::Selector`]; nothing here is global. Token tables keep the order
//! in which categories and entries were declared, since that order decides
//! the layout of the generated grammar and the lexer's tie-breaking.

use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default maximum macro recursion depth
pub const DEFAULT_MAX_MACRO_DEPTH: usize = 10;

const DEFAULT_GRAMMAR: &str = include_str!("../data/grammar_template.lark");
const DEFAULT_MACROS: &str = include_str!("../data/macros.json");
const DEFAULT_KEYWORDS: &str = include_str!("../data/keywords.json");

/// One keyword or macro declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Alternative spellings matched by the same token
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    /// Custom lexical pattern for the name or a synonym
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regex_substitution: BTreeMap<String, String>,

    /// Selection text a macro expands to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl TokenEntry {
    /// An entry with a definition and no synonyms
    pub fn macro_definition(definition: impl Into<String>) -> Self {
        Self {
            definition: Some(definition.into()),
            ..Default::default()
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    /// The name followed by every synonym
    pub fn spellings<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        std::iter::once(name).chain(self.synonyms.iter().map(String::as_str))
    }
}

/// Entry names starting with `_` are expandable but never become tokens
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('_')
}

/// A named group of entries, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCategory {
    pub entries: IndexMap<String, TokenEntry>,
}

impl TokenCategory {
    pub fn get(&self, name: &str) -> Option<&TokenEntry> {
        self.entries.get(name)
    }

    /// Insert or replace an entry, keeping its position when replaced
    pub fn insert(&mut self, name: impl Into<String>, entry: TokenEntry) -> Option<TokenEntry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<TokenEntry> {
        self.entries.shift_remove(name)
    }
}

/// Ordered category -> entry-name -> entry table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenTable {
    pub categories: IndexMap<String, TokenCategory>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{"<root>": {category: {name: entry}}}` document
    pub fn from_json_str(json: &str, root: &'static str) -> Result<Self, ConfigError> {
        let mut doc: IndexMap<String, TokenTable> = serde_json::from_str(json)?;
        doc.shift_remove(root).ok_or(ConfigError::MissingRoot(root))
    }

    /// Load a table from an explicit file path
    pub fn from_path(path: impl AsRef<Path>, root: &'static str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json, root)
    }

    pub fn category(&self, name: &str) -> Option<&TokenCategory> {
        self.categories.get(name)
    }

    pub fn category_mut(&mut self, name: &str) -> &mut TokenCategory {
        self.categories.entry(name.to_string()).or_default()
    }

    /// Every (category, name, entry), in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &TokenEntry)> {
        self.categories.iter().flat_map(|(category, c)| {
            c.entries
                .iter()
                .map(move |(n, e)| (category.as_str(), n.as_str(), e))
        })
    }

    /// Find an entry by its name or one of its synonyms
    pub fn find(&self, spelling: &str) -> Option<(&str, &str, &TokenEntry)> {
        self.iter()
            .find(|(_, name, entry)| entry.spellings(name).any(|s| s == spelling))
    }

    pub fn contains(&self, spelling: &str) -> bool {
        self.find(spelling).is_some()
    }

    /// Remove an entry by name from whichever category holds it
    pub fn remove(&mut self, name: &str) -> Option<TokenEntry> {
        self.categories.values_mut().find_map(|c| c.remove(name))
    }

    /// Overlay `other`: later entries win, categories keep first-seen order
    pub fn merge(&mut self, other: TokenTable) {
        for (name, category) in other.categories {
            let target = self.category_mut(&name);
            for (entry_name, entry) in category.entries {
                target.insert(entry_name, entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(|c| c.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Explicit configuration for the grammar, macros and keywords
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Grammar template with the five placeholders
    pub grammar_template: String,
    pub macros: TokenTable,
    pub keywords: TokenTable,
    pub max_macro_depth: usize,
}

impl SelectionConfig {
    pub fn new(grammar_template: impl Into<String>, macros: TokenTable, keywords: TokenTable) -> Self {
        Self {
            grammar_template: grammar_template.into(),
            macros,
            keywords,
            max_macro_depth: DEFAULT_MAX_MACRO_DEPTH,
        }
    }

    /// The embedded grammar template and tables
    pub fn embedded() -> Result<Self, ConfigError> {
        Ok(Self::new(
            DEFAULT_GRAMMAR,
            TokenTable::from_json_str(DEFAULT_MACROS, "macros")?,
            TokenTable::from_json_str(DEFAULT_KEYWORDS, "keywords")?,
        ))
    }

    pub fn with_max_macro_depth(mut self, depth: usize) -> Self {
        self.max_macro_depth = depth;
        self
    }
}
