//! Error types for molselect
//!
//! Each stage owns its error enum; [`Error`] wraps them so the pipeline
//! operations on [`crate::Selector`] return a single result type.

use crate::backend::ArrayError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for selection operations
#[derive(Error, Debug)]
pub enum Error {
    /// Grammar assembly or compilation failed
    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),

    /// Selection text could not be tokenized or parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Parse tree could not be turned into an AST
    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),

    /// Macro expansion failed
    #[error("Macro error: {0}")]
    Macro(#[from] MacroError),

    /// Evaluation failed
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Grammar template and grammar compilation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
    #[error("Placeholder {marker} must appear exactly once in the template (found {count})")]
    Placeholder { marker: &'static str, count: usize },

    #[error("Malformed grammar at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Terminal {0} is declared more than once")]
    DuplicateTerminal(String),

    #[error("Rule {0} is declared more than once")]
    DuplicateRule(String),

    #[error("Unknown symbol {symbol} in rule {rule}")]
    UnknownSymbol { rule: String, symbol: String },

    #[error("Unknown start rule: {0}")]
    UnknownStart(String),

    #[error("Invalid pattern for terminal {terminal}: {message}")]
    InvalidPattern { terminal: String, message: String },
}

/// Lexical or syntax failure while parsing a selection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("No terminal matches at offset {offset} in {text:?}")]
    Lexical { text: String, offset: usize },

    #[error("Unexpected token {token:?} at offset {offset} in {text:?} (expected one of: {})", expected.join(", "))]
    UnexpectedToken {
        text: String,
        token: String,
        offset: usize,
        expected: Vec<String>,
    },

    #[error("Unexpected end of input in {text:?} (expected one of: {})", expected.join(", "))]
    UnexpectedEnd { text: String, expected: Vec<String> },
}

impl ParseError {
    /// Character offset of the failure, when known
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Lexical { offset, .. } | ParseError::UnexpectedToken { offset, .. } => {
                Some(*offset)
            }
            ParseError::UnexpectedEnd { .. } => None,
        }
    }

    /// The selection text that failed to parse
    pub fn text(&self) -> &str {
        match self {
            ParseError::Lexical { text, .. }
            | ParseError::UnexpectedToken { text, .. }
            | ParseError::UnexpectedEnd { text, .. } => text,
        }
    }
}

/// AST construction failure on a malformed parse subtree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    #[error("No AST constructor for production '{0}'")]
    UnknownProduction(String),

    #[error("Production '{rule}' has an unexpected shape: {message}")]
    Shape { rule: String, message: String },
}

/// Macro expansion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MacroError {
    #[error("Undefined macro: {name}")]
    Undefined { name: String },

    #[error("Macro recursion limit {depth} exceeded while expanding {name} (chain: {})", chain.join(" -> "))]
    RecursionLimit {
        name: String,
        depth: usize,
        chain: Vec<String>,
    },

    #[error("Macro {name} is already defined")]
    AlreadyDefined { name: String },

    #[error("Macro {name} has an empty definition")]
    EmptyDefinition { name: String },

    #[error("Failed to parse expansion of macro {name}: {message}")]
    Expansion { name: String, message: String },
}

/// Evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown constant: {0}")]
    UnknownConstant(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Unresolved macro reference: {0}")]
    UnresolvedMacro(String),

    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("Invalid regular expression {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid token table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token table is missing the top-level \"{0}\" key")]
    MissingRoot(&'static str),

    #[error("Keyword {0} is already defined")]
    DuplicateKeyword(String),

    #[error("Unknown keyword: {0}")]
    UnknownKeyword(String),
}

/// Result type for selection operations
pub type Result<T> = std::result::Result<T, Error>;
