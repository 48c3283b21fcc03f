//! Grammar normalization
//!
//! Flattens a [`GrammarDefinition`] into plain productions over numbered
//! symbols. Groups and optionals become extra alternatives of the owning
//! rule; repetitions become hidden left-recursive rules whose children are
//! spliced into the parent. Each entry rule gets an augmented start rule.

use super::definition::{is_rule_name, Alternative, GrammarDefinition, Item, Literal};
use crate::error::GrammarError;
use std::collections::HashMap;

/// Terminal index reserved for end of input
pub const END: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    Terminal(usize),
    Rule(usize),
}

/// How a reduction turns its children into a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Wrap the children in a tree named after the label
    Tree,
    /// Pass a single child through, otherwise wrap like `Tree`
    Inline,
    /// Hand the children to the parent unchanged
    Splice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: usize,
    pub rhs: Vec<Symbol>,
    /// Tree name: the alias when one is given, else the rule name
    pub label: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSpec {
    pub name: String,
    pub patterns: Vec<Literal>,
    /// Filtered terminals never appear in the parse tree
    pub filtered: bool,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub terminals: Vec<TerminalSpec>,
    pub rules: Vec<String>,
    pub productions: Vec<Production>,
    /// Productions grouped by left-hand side
    pub by_lhs: Vec<Vec<usize>>,
    pub ignore: Vec<usize>,
    /// Entry rule name -> augmented production
    pub entries: Vec<(String, usize)>,
}

impl Grammar {
    /// Normalize a grammar definition for the given entry rules
    pub fn new(definition: &GrammarDefinition, entries: &[&str]) -> Result<Self, GrammarError> {
        let mut builder = Builder::default();

        builder.terminals.push(TerminalSpec {
            name: "$END".to_string(),
            patterns: Vec::new(),
            filtered: true,
        });
        for terminal in &definition.terminals {
            builder
                .terminal_ids
                .insert(terminal.name.clone(), builder.terminals.len());
            builder.terminals.push(TerminalSpec {
                name: terminal.name.clone(),
                patterns: terminal.patterns.clone(),
                filtered: terminal.name.starts_with('_'),
            });
        }

        for rule in &definition.rules {
            builder.add_rule(&rule.name);
        }

        for rule in &definition.rules {
            let lhs = builder.rule_ids[&rule.name];
            for alternative in &rule.alternatives {
                let sequences = builder.expand_sequence(&alternative.items, &rule.name)?;
                let (label, shape) = match &alternative.alias {
                    Some(alias) => (alias.clone(), Shape::Tree),
                    None if rule.name.starts_with('_') => (rule.name.clone(), Shape::Splice),
                    None if rule.inline => (rule.name.clone(), Shape::Inline),
                    None => (rule.name.clone(), Shape::Tree),
                };
                for rhs in sequences {
                    builder.productions.push(Production {
                        lhs,
                        rhs,
                        label: label.clone(),
                        shape,
                    });
                }
            }
        }

        let ignore = definition
            .ignore
            .iter()
            .map(|name| {
                builder
                    .terminal_ids
                    .get(name)
                    .copied()
                    .ok_or_else(|| GrammarError::UnknownSymbol {
                        rule: "%ignore".to_string(),
                        symbol: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut augmented = Vec::new();
        for entry in entries {
            let target = *builder
                .rule_ids
                .get(*entry)
                .ok_or_else(|| GrammarError::UnknownStart(entry.to_string()))?;
            let lhs = builder.add_rule(&format!("$start_{entry}"));
            augmented.push((entry.to_string(), builder.productions.len()));
            builder.productions.push(Production {
                lhs,
                rhs: vec![Symbol::Rule(target)],
                label: entry.to_string(),
                shape: Shape::Splice,
            });
        }

        let mut by_lhs = vec![Vec::new(); builder.rules.len()];
        for (index, production) in builder.productions.iter().enumerate() {
            by_lhs[production.lhs].push(index);
        }

        Ok(Grammar {
            terminals: builder.terminals,
            rules: builder.rules,
            productions: builder.productions,
            by_lhs,
            ignore,
            entries: augmented,
        })
    }

    pub fn terminal_name(&self, terminal: usize) -> &str {
        &self.terminals[terminal].name
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::Terminal(t) => &self.terminals[t].name,
            Symbol::Rule(r) => &self.rules[r],
        }
    }
}

#[derive(Default)]
struct Builder {
    terminals: Vec<TerminalSpec>,
    terminal_ids: HashMap<String, usize>,
    rules: Vec<String>,
    rule_ids: HashMap<String, usize>,
    productions: Vec<Production>,
    hidden: usize,
    anonymous: usize,
}

impl Builder {
    fn add_rule(&mut self, name: &str) -> usize {
        let id = self.rules.len();
        self.rules.push(name.to_string());
        self.rule_ids.insert(name.to_string(), id);
        id
    }

    /// Every symbol sequence an item sequence can stand for
    fn expand_sequence(&mut self, items: &[Item], owner: &str) -> Result<Vec<Vec<Symbol>>, GrammarError> {
        let mut sequences: Vec<Vec<Symbol>> = vec![Vec::new()];
        for item in items {
            let options = self.expand_item(item, owner)?;
            sequences = sequences
                .iter()
                .flat_map(|prefix| {
                    options.iter().map(move |option| {
                        let mut seq = prefix.clone();
                        seq.extend_from_slice(option);
                        seq
                    })
                })
                .collect();
        }
        Ok(sequences)
    }

    fn expand_alternatives(
        &mut self,
        alternatives: &[Alternative],
        owner: &str,
    ) -> Result<Vec<Vec<Symbol>>, GrammarError> {
        let mut out = Vec::new();
        for alternative in alternatives {
            out.extend(self.expand_sequence(&alternative.items, owner)?);
        }
        Ok(out)
    }

    fn expand_item(&mut self, item: &Item, owner: &str) -> Result<Vec<Vec<Symbol>>, GrammarError> {
        match item {
            Item::Name(name) => {
                let symbol = if is_rule_name(name) {
                    self.rule_ids.get(name).map(|&r| Symbol::Rule(r))
                } else {
                    self.terminal_ids.get(name).map(|&t| Symbol::Terminal(t))
                };
                let symbol = symbol.ok_or_else(|| GrammarError::UnknownSymbol {
                    rule: owner.to_string(),
                    symbol: name.clone(),
                })?;
                Ok(vec![vec![symbol]])
            }
            Item::Literal(literal) => Ok(vec![vec![Symbol::Terminal(self.anonymous_terminal(literal))]]),
            Item::Group(alternatives) => self.expand_alternatives(alternatives, owner),
            Item::Optional(alternatives) => {
                let mut out = self.expand_alternatives(alternatives, owner)?;
                out.push(Vec::new());
                Ok(out)
            }
            Item::Repeat {
                inner,
                at_least_one,
            } => {
                let inner = self.expand_item(inner, owner)?;
                let kind = if *at_least_one { "plus" } else { "star" };
                let name = format!("__{owner}_{kind}_{}", self.hidden);
                self.hidden += 1;
                let id = self.add_rule(&name);

                let label = self.rules[id].clone();
                for seq in &inner {
                    self.productions.push(Production {
                        lhs: id,
                        rhs: seq.clone(),
                        label: label.clone(),
                        shape: Shape::Splice,
                    });
                }
                for seq in &inner {
                    let mut rhs = vec![Symbol::Rule(id)];
                    rhs.extend_from_slice(seq);
                    self.productions.push(Production {
                        lhs: id,
                        rhs,
                        label: label.clone(),
                        shape: Shape::Splice,
                    });
                }

                if *at_least_one {
                    Ok(vec![vec![Symbol::Rule(id)]])
                } else {
                    Ok(vec![vec![Symbol::Rule(id)], Vec::new()])
                }
            }
        }
    }

    /// Reuse a declared terminal with exactly this pattern, or declare one
    fn anonymous_terminal(&mut self, literal: &Literal) -> usize {
        if let Some(existing) = self
            .terminals
            .iter()
            .position(|t| t.patterns.len() == 1 && t.patterns[0] == *literal)
        {
            return existing;
        }
        let name = format!("__ANON_{}", self.anonymous);
        self.anonymous += 1;
        let id = self.terminals.len();
        self.terminal_ids.insert(name.clone(), id);
        self.terminals.push(TerminalSpec {
            name,
            patterns: vec![literal.clone()],
            filtered: literal.is_string(),
        });
        id
    }
}
