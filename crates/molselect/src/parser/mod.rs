//! Selection parser
//!
//! A [`CompiledParser`] is built once from assembled grammar text and never
//! changes afterwards. It exposes two entry rules: `start` for a complete
//! selection and `expr` for re-parsing macro expansions.

pub mod bnf;
pub mod definition;
pub mod lexer;
pub mod table;
pub mod tree;

pub use tree::{ParseNode, ParseTree, Token};

use crate::error::{GrammarError, ParseError};
use crate::grammar::FallbackPattern;
use bnf::{Grammar, Shape, END};
use lexer::{char_offset, Lexeme, Lexer};
use table::{Action, ParseTable};
use tracing::debug;

/// Entry productions of the selection grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartRule {
    /// A complete selection, wrapped in a `start` tree
    Selection,
    /// A bare expression, used for macro expansions
    Expression,
}

impl StartRule {
    pub fn rule_name(&self) -> &'static str {
        match self {
            StartRule::Selection => "start",
            StartRule::Expression => "expr",
        }
    }
}

/// An immutable parser for one assembled grammar
#[derive(Debug, Clone)]
pub struct CompiledParser {
    grammar: Grammar,
    table: ParseTable,
    lexer: Lexer,
}

impl CompiledParser {
    /// Compile grammar text with the `start` and `expr` entry rules
    pub fn new(text: &str, fallback: Option<&FallbackPattern>) -> Result<Self, GrammarError> {
        Self::with_entries(
            text,
            fallback,
            &[
                StartRule::Selection.rule_name(),
                StartRule::Expression.rule_name(),
            ],
        )
    }

    /// Compile grammar text with arbitrary entry rules
    pub fn with_entries(
        text: &str,
        fallback: Option<&FallbackPattern>,
        entries: &[&str],
    ) -> Result<Self, GrammarError> {
        let definition = definition::read_grammar(text)?;
        let grammar = Grammar::new(&definition, entries)?;
        let table = ParseTable::build(&grammar);
        let lexer = Lexer::new(&grammar, fallback)?;

        debug!(
            terminals = grammar.terminals.len(),
            productions = grammar.productions.len(),
            states = table.num_states(),
            conflicts = table.conflicts,
            "Compiled selection grammar"
        );

        Ok(Self {
            grammar,
            table,
            lexer,
        })
    }

    /// Parse selection text from one of the two entry rules
    pub fn parse(&self, text: &str, start: StartRule) -> Result<ParseTree, ParseError> {
        self.parse_from(text, start.rule_name())
    }

    /// Parse from a named entry rule
    pub fn parse_from(&self, text: &str, entry: &str) -> Result<ParseTree, ParseError> {
        let start = self.table.starts.get(entry).copied().ok_or_else(|| {
            ParseError::UnexpectedEnd {
                text: text.to_string(),
                expected: vec![format!("entry rule {entry}")],
            }
        })?;

        let mut states: Vec<usize> = vec![start];
        let mut values: Vec<Vec<ParseNode>> = Vec::new();
        let mut pos = 0;
        let mut pending: Option<Option<Lexeme>> = None;

        loop {
            let state = states.last().copied().unwrap_or(start);
            let lexeme = match pending.take() {
                Some(lexeme) => lexeme,
                None => {
                    let allowed: Vec<usize> = self.table.expected(state).collect();
                    self.lexer.next(text, &mut pos, &allowed, &self.grammar)?
                }
            };
            let terminal = lexeme.as_ref().map_or(END, |l| l.terminal);

            match self.table.actions[state].get(&terminal) {
                Some(Action::Shift(next)) => {
                    states.push(*next);
                    values.push(match &lexeme {
                        Some(l) if !self.grammar.terminals[l.terminal].filtered => {
                            vec![ParseNode::Token(Token {
                                kind: self.grammar.terminal_name(l.terminal).to_string(),
                                text: text[l.start..l.end].to_string(),
                                offset: l.start,
                            })]
                        }
                        _ => Vec::new(),
                    });
                }
                Some(Action::Reduce(p)) => {
                    let production = &self.grammar.productions[*p];
                    let keep = states.len() - production.rhs.len();
                    states.truncate(keep);
                    let children: Vec<ParseNode> = values
                        .drain(values.len() - production.rhs.len()..)
                        .flatten()
                        .collect();
                    values.push(reduce(production.shape, &production.label, children));

                    let below = states.last().copied().unwrap_or(start);
                    let goto = self.table.gotos[below].get(&production.lhs).copied();
                    match goto {
                        Some(goto) => states.push(goto),
                        None => return Err(self.unexpected(text, state, lexeme.as_ref())),
                    }
                    pending = Some(lexeme);
                }
                Some(Action::Accept) => {
                    let fragment = values.pop().unwrap_or_default();
                    return Ok(into_tree(entry, fragment));
                }
                None => return Err(self.unexpected(text, state, lexeme.as_ref())),
            }
        }
    }

    /// Terminal names, in declaration order
    pub fn terminal_names(&self) -> impl Iterator<Item = &str> {
        self.grammar.terminals.iter().skip(1).map(|t| t.name.as_str())
    }

    fn unexpected(&self, text: &str, state: usize, lexeme: Option<&Lexeme>) -> ParseError {
        let expected = self
            .table
            .expected(state)
            .map(|t| self.grammar.terminal_name(t).to_string())
            .collect();
        match lexeme {
            Some(l) => ParseError::UnexpectedToken {
                text: text.to_string(),
                token: text[l.start..l.end].to_string(),
                offset: char_offset(text, l.start),
                expected,
            },
            None => ParseError::UnexpectedEnd {
                text: text.to_string(),
                expected,
            },
        }
    }
}

fn reduce(shape: Shape, label: &str, children: Vec<ParseNode>) -> Vec<ParseNode> {
    match shape {
        Shape::Splice => children,
        Shape::Inline if children.len() == 1 => children,
        Shape::Inline | Shape::Tree => vec![ParseNode::Tree(ParseTree::new(label, children))],
    }
}

fn into_tree(entry: &str, mut fragment: Vec<ParseNode>) -> ParseTree {
    if let [ParseNode::Tree(_)] = fragment.as_slice() {
        if let Some(ParseNode::Tree(tree)) = fragment.pop() {
            return tree;
        }
    }
    ParseTree::new(entry, fragment)
}
