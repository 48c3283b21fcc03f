//! Contextual lexer
//!
//! The parser asks for the next token together with the terminals its
//! current state accepts; only those (plus ignored terminals) are tried.
//! The longest match wins, a literal beats a regex of the same length, and
//! declaration order settles the rest.

use super::bnf::Grammar;
use super::definition::Literal;
use crate::error::{GrammarError, ParseError};
use crate::grammar::FallbackPattern;
use regex::Regex;

#[derive(Debug, Clone)]
enum Pattern {
    Literal { text: String, insensitive: bool },
    Regex(Regex),
    Fallback(FallbackPattern),
}

impl Pattern {
    fn match_len(&self, input: &str) -> Option<usize> {
        let len = match self {
            Pattern::Literal { text, insensitive } => {
                let head = input.get(..text.len())?;
                let equal = if *insensitive {
                    head.eq_ignore_ascii_case(text)
                } else {
                    head == text
                };
                equal.then_some(text.len())?
            }
            Pattern::Regex(re) => re.find(input)?.end(),
            Pattern::Fallback(fallback) => fallback.match_len(input)?,
        };
        (len > 0).then_some(len)
    }

    fn is_literal(&self) -> bool {
        matches!(self, Pattern::Literal { .. })
    }
}

/// A matched terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub terminal: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    patterns: Vec<Vec<Pattern>>,
    ignore: Vec<usize>,
}

impl Lexer {
    /// Compile every terminal's patterns; `fallback` replaces the regex
    /// whose text equals its rendered body
    pub fn new(grammar: &Grammar, fallback: Option<&FallbackPattern>) -> Result<Self, GrammarError> {
        let fallback = fallback.map(|f| (f, f.body()));
        let mut patterns = Vec::with_capacity(grammar.terminals.len());

        for terminal in &grammar.terminals {
            let mut compiled = Vec::with_capacity(terminal.patterns.len());
            for literal in &terminal.patterns {
                compiled.push(match (literal, &fallback) {
                    (Literal::String { text, insensitive }, _) => Pattern::Literal {
                        text: text.clone(),
                        insensitive: *insensitive,
                    },
                    (Literal::Regex { pattern, .. }, Some((fallback, body))) if pattern == body => {
                        Pattern::Fallback((*fallback).clone())
                    }
                    (
                        Literal::Regex {
                            pattern,
                            insensitive,
                        },
                        _,
                    ) => {
                        let flags = if *insensitive { "(?i)" } else { "" };
                        let re = Regex::new(&format!("^{flags}(?:{pattern})")).map_err(|e| {
                            GrammarError::InvalidPattern {
                                terminal: terminal.name.clone(),
                                message: e.to_string(),
                            }
                        })?;
                        Pattern::Regex(re)
                    }
                });
            }
            patterns.push(compiled);
        }

        Ok(Self {
            patterns,
            ignore: grammar.ignore.clone(),
        })
    }

    /// Longest match of `terminal` at the start of `input`
    fn match_terminal(&self, terminal: usize, input: &str) -> Option<(usize, bool)> {
        self.patterns[terminal]
            .iter()
            .filter_map(|p| p.match_len(input).map(|len| (len, p.is_literal())))
            .max()
    }

    fn best<I>(&self, candidates: I, input: &str) -> Option<(usize, usize)>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut best: Option<(usize, bool, usize)> = None;
        for terminal in candidates {
            let Some((len, literal)) = self.match_terminal(terminal, input) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_len, best_literal, best_terminal)) => {
                    (len, literal) > (best_len, best_literal)
                        || ((len, literal) == (best_len, best_literal) && terminal < best_terminal)
                }
            };
            if better {
                best = Some((len, literal, terminal));
            }
        }
        best.map(|(len, _, terminal)| (terminal, len))
    }

    /// Next token at `*pos`, or `None` at end of input
    pub fn next(
        &self,
        text: &str,
        pos: &mut usize,
        allowed: &[usize],
        grammar: &Grammar,
    ) -> Result<Option<Lexeme>, ParseError> {
        loop {
            let rest = &text[*pos..];
            if rest.is_empty() {
                return Ok(None);
            }

            let candidates = allowed.iter().chain(self.ignore.iter()).copied();
            if let Some((terminal, len)) = self.best(candidates, rest) {
                let start = *pos;
                *pos += len;
                if self.ignore.contains(&terminal) {
                    continue;
                }
                return Ok(Some(Lexeme {
                    terminal,
                    start,
                    end: *pos,
                }));
            }

            let offset = char_offset(text, *pos);
            // Nothing acceptable here; name what is in the way if possible
            return Err(match self.best(0..self.patterns.len(), rest) {
                Some((_, len)) => ParseError::UnexpectedToken {
                    text: text.to_string(),
                    token: rest[..len].to_string(),
                    offset,
                    expected: allowed
                        .iter()
                        .map(|&t| grammar.terminal_name(t).to_string())
                        .collect(),
                },
                None => ParseError::Lexical {
                    text: text.to_string(),
                    offset,
                },
            });
        }
    }
}

/// Character offset of a byte position
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}
