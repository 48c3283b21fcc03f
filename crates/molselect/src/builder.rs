//! Parse tree to AST
//!
//! One constructor per production of the selection grammar. Keyword
//! spellings are canonicalized (`resnum` becomes `resid`); macro names are
//! kept as written so synonyms expand through the flattened macro map.

use crate::ast::{CompareOp, Node, WithinMode};
use crate::config::TokenTable;
use crate::error::BuilderError;
use crate::parser::{ParseNode, ParseTree, Token};
use std::collections::{HashMap, HashSet};

/// Builds [`Node`] trees from parse trees
#[derive(Debug, Clone, Default)]
pub struct AstBuilder {
    /// Keyword spelling (and its lower-cased form) -> canonical name
    keywords: HashMap<String, String>,
    /// Every macro name and synonym, hidden ones included
    macros: HashSet<String>,
}

impl AstBuilder {
    pub fn new(macros: &TokenTable, keywords: &TokenTable) -> Self {
        let mut keyword_names = HashMap::new();
        for (_, name, entry) in keywords.iter() {
            for spelling in entry.spellings(name) {
                keyword_names.insert(spelling.to_string(), name.to_string());
            }
        }
        // Case-folded spellings cover custom patterns such as `seg[iI][dD]`
        for (_, name, entry) in keywords.iter() {
            for spelling in entry.spellings(name) {
                keyword_names
                    .entry(spelling.to_lowercase())
                    .or_insert_with(|| name.to_string());
            }
        }

        let macro_names = macros
            .iter()
            .flat_map(|(_, name, entry)| entry.spellings(name).map(str::to_string))
            .collect();

        Self {
            keywords: keyword_names,
            macros: macro_names,
        }
    }

    /// Canonical keyword name for a spelling, or the spelling itself
    pub fn canonical_keyword(&self, spelling: &str) -> String {
        self.keywords
            .get(spelling)
            .or_else(|| self.keywords.get(&spelling.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| spelling.to_string())
    }

    pub fn build(&self, tree: &ParseTree) -> Result<Node, BuilderError> {
        let rule = tree.rule.as_str();
        match rule {
            "start" => Ok(Node::Start(Box::new(self.only_child(tree)?))),
            "expr" => self.only_child(tree),

            "and_" => self.binary(tree).map(|(l, r)| Node::and(l, r)),
            "or_" => self.binary(tree).map(|(l, r)| Node::or(l, r)),
            "xor_" => self.binary(tree).map(|(l, r)| Node::xor(l, r)),
            "not_" => self.only_child(tree).map(Node::not),

            "comparison_selection" => self.comparison_chain(tree),
            "property_selection" => {
                let (field, values) = tree.children.split_first().ok_or_else(|| {
                    shape(tree, "expected a field followed by values")
                })?;
                if values.is_empty() {
                    return Err(shape(tree, "expected at least one value"));
                }
                Ok(Node::PropertySelection {
                    field: Box::new(self.child(tree, field)?),
                    values: values
                        .iter()
                        .map(|v| self.child(tree, v))
                        .collect::<Result<_, _>>()?,
                })
            }
            "range_value" => {
                let parts = tree
                    .children
                    .iter()
                    .map(|c| self.child(tree, c).map(Box::new))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut parts = parts.into_iter();
                match (parts.next(), parts.next(), parts.next(), parts.next()) {
                    (Some(start), Some(end), step, None) => {
                        Ok(Node::RangeValue { start, end, step })
                    }
                    _ => Err(shape(tree, "expected start, end and an optional step")),
                }
            }
            "regex_selection" => self.binary(tree).map(|(field, pattern)| Node::Regex {
                field: Box::new(field),
                pattern: Box::new(pattern),
            }),

            "string_value" => Ok(Node::StringValue(self.only_token(tree)?.text.clone())),
            "quoted_string_value" => Ok(Node::QuotedStringValue(
                self.only_token(tree)?.text.clone(),
            )),
            "regex_value" => {
                let text = &self.only_token(tree)?.text;
                let inner = text
                    .strip_prefix('/')
                    .and_then(|t| t.strip_suffix('/'))
                    .ok_or_else(|| shape(tree, "regex literal must be enclosed in slashes"))?;
                Ok(Node::RegexValue(inner.to_string()))
            }
            "number" => Ok(Node::Number(self.only_token(tree)?.text.clone())),
            "const" => Ok(Node::Const(self.only_token(tree)?.text.clone())),

            "add" => self.binary(tree).map(|(l, r)| Node::Add(l.into(), r.into())),
            "sub" => self.binary(tree).map(|(l, r)| Node::Sub(l.into(), r.into())),
            "mul" => self.binary(tree).map(|(l, r)| Node::Mul(l.into(), r.into())),
            "truediv" => self.binary(tree).map(|(l, r)| Node::Div(l.into(), r.into())),
            "floordiv" => self.binary(tree).map(|(l, r)| Node::FloorDiv(l.into(), r.into())),
            "mod" => self.binary(tree).map(|(l, r)| Node::Mod(l.into(), r.into())),
            "pow" => self.binary(tree).map(|(l, r)| Node::Pow(l.into(), r.into())),
            "neg" => self.only_child(tree).map(|x| Node::Neg(x.into())),
            "func" => match tree.children.as_slice() {
                [ParseNode::Token(name), arg] => Ok(Node::Func {
                    name: name.text.to_lowercase(),
                    arg: Box::new(self.child(tree, arg)?),
                }),
                _ => Err(shape(tree, "expected a function name and one argument")),
            },

            "within_selection" => match tree.children.as_slice() {
                [ParseNode::Token(mode), ParseNode::Token(distance), target] => {
                    let mode = WithinMode::parse(&mode.text)
                        .ok_or_else(|| shape(tree, &format!("unknown mode {:?}", mode.text)))?;
                    Ok(Node::within(
                        Node::Number(distance.text.clone()),
                        self.child(tree, target)?,
                        mode,
                    ))
                }
                _ => Err(shape(tree, "expected mode, distance and target")),
            },
            "bonded_selection" => match tree.children.as_slice() {
                [ParseNode::Token(distance), selection] => Ok(Node::Bonded {
                    distance: Box::new(Node::Number(distance.text.clone())),
                    selection: Box::new(self.child(tree, selection)?),
                }),
                _ => Err(shape(tree, "expected distance and selection")),
            },
            "same_selection" => self.binary(tree).map(|(field, mask)| Node::same(field, mask)),

            "all" => Ok(Node::All),
            "none" => Ok(Node::None),
            "macro" => {
                let text = &self.only_token(tree)?.text;
                Ok(Node::Macro(text.trim_start_matches('@').to_string()))
            }
            "var_sel" => Ok(Node::SelectionKeyword(self.only_token(tree)?.text.clone())),
            "selection_keyword" => {
                let text = &self.only_token(tree)?.text;
                Ok(Node::SelectionKeyword(self.canonical_keyword(text)))
            }
            "bool_keyword" => {
                let text = &self.only_token(tree)?.text;
                if self.macros.contains(text.as_str()) {
                    Ok(Node::Macro(text.clone()))
                } else {
                    Ok(Node::SelectionKeyword(self.canonical_keyword(text)))
                }
            }

            "sequence_selection" => Ok(Node::SequenceSelection(
                self.only_token(tree)?.text.clone(),
            )),
            "sequence_selection_regex" => Ok(Node::SequenceSelectionRegex(
                self.only_token(tree)?.text.clone(),
            )),

            other => Err(BuilderError::UnknownProduction(other.to_string())),
        }
    }

    /// `a < b <= c` folds into `(a < b) & (b <= c)`
    fn comparison_chain(&self, tree: &ParseTree) -> Result<Node, BuilderError> {
        let children = &tree.children;
        if children.len() < 3 || children.len() % 2 == 0 {
            return Err(shape(tree, "expected operands separated by operators"));
        }

        let operands = children
            .iter()
            .step_by(2)
            .map(|c| self.child(tree, c))
            .collect::<Result<Vec<_>, _>>()?;
        let operators = children
            .iter()
            .skip(1)
            .step_by(2)
            .map(|c| match c {
                ParseNode::Token(t) => CompareOp::parse(&t.text)
                    .ok_or_else(|| shape(tree, &format!("unknown operator {:?}", t.text))),
                ParseNode::Tree(_) => Err(shape(tree, "expected an operator token")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut mask: Option<Node> = None;
        for (pair, op) in operands.windows(2).zip(operators) {
            let comparison = Node::comparison(pair[0].clone(), op, pair[1].clone());
            mask = Some(match mask {
                Some(prev) => Node::and(prev, comparison),
                None => comparison,
            });
        }
        mask.ok_or_else(|| shape(tree, "empty comparison chain"))
    }

    fn child(&self, tree: &ParseTree, node: &ParseNode) -> Result<Node, BuilderError> {
        match node {
            ParseNode::Tree(sub) => self.build(sub),
            ParseNode::Token(token) => Err(shape(
                tree,
                &format!("unexpected token {}:{:?}", token.kind, token.text),
            )),
        }
    }

    fn only_child(&self, tree: &ParseTree) -> Result<Node, BuilderError> {
        match tree.children.as_slice() {
            [child] => self.child(tree, child),
            _ => Err(shape(tree, "expected exactly one child")),
        }
    }

    fn only_token<'t>(&self, tree: &'t ParseTree) -> Result<&'t Token, BuilderError> {
        match tree.children.as_slice() {
            [ParseNode::Token(token)] => Ok(token),
            _ => Err(shape(tree, "expected a single token")),
        }
    }

    fn binary(&self, tree: &ParseTree) -> Result<(Node, Node), BuilderError> {
        match tree.children.as_slice() {
            [left, right] => Ok((self.child(tree, left)?, self.child(tree, right)?)),
            _ => Err(shape(tree, "expected two operands")),
        }
    }
}

fn shape(tree: &ParseTree, message: &str) -> BuilderError {
    BuilderError::Shape {
        rule: tree.rule.clone(),
        message: message.to_string(),
    }
}
