//! Parse tree produced by [`super::CompiledParser`]

use serde::{Deserialize, Serialize};
use std::fmt;

/// A lexical token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Terminal name, e.g. `VALUE` or `NUMBER`
    pub kind: String,
    /// Matched source text
    pub text: String,
    /// Byte offset in the selection text
    pub offset: usize,
}

/// A tree child: either a sub-tree or a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseNode {
    Tree(ParseTree),
    Token(Token),
}

/// A labeled tree: rule name plus ordered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseTree {
    pub rule: String,
    pub children: Vec<ParseNode>,
}

impl ParseTree {
    pub fn new(rule: impl Into<String>, children: Vec<ParseNode>) -> Self {
        Self {
            rule: rule.into(),
            children,
        }
    }

    /// Indented multi-line rendering, for debugging
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.rule);
        out.push('\n');
        for child in &self.children {
            match child {
                ParseNode::Tree(tree) => tree.write_pretty(out, depth + 1),
                ParseNode::Token(token) => {
                    out.push_str(&"  ".repeat(depth + 1));
                    out.push_str(&format!("{} {:?}\n", token.kind, token.text));
                }
            }
        }
    }
}

impl ParseNode {
    pub fn as_tree(&self) -> Option<&ParseTree> {
        match self {
            ParseNode::Tree(tree) => Some(tree),
            ParseNode::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            ParseNode::Token(token) => Some(token),
            ParseNode::Tree(_) => None,
        }
    }
}

impl fmt::Display for ParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.rule)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for ParseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseNode::Tree(tree) => write!(f, "{tree}"),
            ParseNode::Token(token) => write!(f, "{}:{:?}", token.kind, token.text),
        }
    }
}
