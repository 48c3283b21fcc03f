//! Macro expansion
//!
//! Every macro name and synonym (hidden `_names` included) maps to its
//! definition text. Expansion works on strings, substituting each
//! whitespace-separated token that names a macro by its parenthesized
//! expansion, and on ASTs, replacing [`Node::Macro`] references by the
//! re-parsed expansion.
//!
//! Recursion is bounded by a maximum depth; a cycle always runs into it.

use crate::ast::Node;
use crate::config::{TokenTable, DEFAULT_MAX_MACRO_DEPTH};
use crate::error::{Error, MacroError};
use std::collections::HashMap;

/// Flattened macro name -> definition map
#[derive(Debug, Clone, PartialEq)]
pub struct MacroMap {
    definitions: HashMap<String, String>,
    max_depth: usize,
}

impl Default for MacroMap {
    fn default() -> Self {
        Self {
            definitions: HashMap::new(),
            max_depth: DEFAULT_MAX_MACRO_DEPTH,
        }
    }
}

impl MacroMap {
    pub fn new(table: &TokenTable, max_depth: usize) -> Self {
        let mut definitions = HashMap::new();
        for (_, name, entry) in table.iter() {
            let definition = entry.definition.clone().unwrap_or_default();
            for spelling in entry.spellings(name) {
                definitions.insert(spelling.to_string(), definition.clone());
            }
        }
        Self {
            definitions,
            max_depth,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Raw, unexpanded definition
    pub fn definition(&self, name: &str) -> Option<&str> {
        self.definitions.get(name).map(String::as_str)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Fully expand a macro's definition text
    ///
    /// `ion` with `ion: "@_ion_names"` and `_ion_names: "resname NA CL"`
    /// expands to `(resname NA CL)`.
    pub fn expand_str(&self, name: &str) -> Result<String, MacroError> {
        let mut chain = Vec::new();
        self.expand_at(name, &mut chain)
    }

    fn expand_at(&self, name: &str, chain: &mut Vec<String>) -> Result<String, MacroError> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| MacroError::Undefined {
                name: name.to_string(),
            })?;
        if chain.len() >= self.max_depth {
            let mut chain = chain.clone();
            chain.push(name.to_string());
            return Err(MacroError::RecursionLimit {
                name: chain[0].clone(),
                depth: self.max_depth,
                chain,
            });
        }
        if definition.trim().is_empty() {
            return Err(MacroError::EmptyDefinition {
                name: name.to_string(),
            });
        }

        chain.push(name.to_string());
        let mut expanded = Vec::new();
        for token in definition.split_whitespace() {
            let key = token.strip_prefix('@').unwrap_or(token);
            if self.definitions.contains_key(key) {
                expanded.push(format!("({})", self.expand_at(key, chain)?));
            } else {
                expanded.push(token.to_string());
            }
        }
        chain.pop();

        Ok(expanded.join(" "))
    }

    /// Replace every macro reference in `node`, post-order
    ///
    /// `parse` turns expansion text into an AST using the bare-expression
    /// entry rule.
    pub fn expand_ast<F>(&self, node: Node, parse: &F) -> Result<Node, MacroError>
    where
        F: Fn(&str) -> Result<Node, Error>,
    {
        let mut chain = Vec::new();
        self.expand_node(node, parse, &mut chain)
    }

    fn expand_node<F>(
        &self,
        node: Node,
        parse: &F,
        chain: &mut Vec<String>,
    ) -> Result<Node, MacroError>
    where
        F: Fn(&str) -> Result<Node, Error>,
    {
        let node = node.try_map_children(|child| self.expand_node(child, parse, chain))?;
        let Node::Macro(name) = node else {
            return Ok(node);
        };

        if chain.len() >= self.max_depth {
            let mut chain = chain.clone();
            chain.push(name.clone());
            return Err(MacroError::RecursionLimit {
                name: chain[0].clone(),
                depth: self.max_depth,
                chain,
            });
        }

        let text = self.expand_str(&name)?;
        let subtree = parse(&text).map_err(|e| MacroError::Expansion {
            name: name.clone(),
            message: e.to_string(),
        })?;

        chain.push(name);
        let expanded = self.expand_node(subtree, parse, chain);
        chain.pop();
        expanded
    }
}
